use std::borrow::Cow;

/// Strips control characters from user input.
///
/// Tab, newline and carriage return are kept; every other C0 control and DEL
/// is removed. Returns `Cow::Borrowed` when nothing needs stripping.
///
/// # Examples
///
/// ```
/// use feedrelay::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("tech\x07news"), "technews");
/// assert_eq!(strip_control_chars("plain"), "plain");
/// ```
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| c == '\x7f' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'));

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_stripped(c)).collect())
}

/// Collapses runs of whitespace into single spaces and trims the ends.
///
/// Used on text scraped from HTML, where indentation and line breaks from the
/// markup leak into `text()` output.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escapes the five HTML-significant characters for safe insertion into
/// element content and quoted attribute values.
///
/// # Examples
///
/// ```
/// use feedrelay::util::escape_html;
///
/// assert_eq!(escape_html(r#"a "b" & <c>"#), "a &quot;b&quot; &amp; &lt;c&gt;");
/// ```
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
