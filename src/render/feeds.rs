use chrono::{DateTime, NaiveDateTime, Utc};
use url::form_urlencoded;

use super::filter::Filter;
use crate::content::EnrichedContent;
use crate::storage::{Article, Feed, PLACEHOLDER_LINK};
use crate::util::escape_html;

/// Format a stored publish date for display.
///
/// RFC 2822, RFC 3339 and `YYYY-MM-DD HH:MM:SS` (the converter's format) are
/// shown as `YYYY-MM-DD HH:MM` in UTC. Anything else, including the
/// placeholder, is shown as-is.
pub fn format_pub_date(raw: &str) -> String {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"));

    match parsed {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_owned(),
    }
}

/// Percent-encode a value for a query string.
pub(crate) fn query_escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Only http(s) and site-relative links are emitted as `href`s.
pub(crate) fn safe_href(link: &str) -> &str {
    let lower = link.trim_start().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with('/') {
        link
    } else {
        PLACEHOLDER_LINK
    }
}

/// `<option>` list for the category filter, `all` first.
pub fn render_filter_options(categories: &[String], selected: &Filter) -> String {
    let selected_attr = |is_selected: bool| if is_selected { " selected" } else { "" };

    let mut html = format!(
        "<option value=\"{}\"{}>All Categories</option>",
        Filter::ALL_VALUE,
        selected_attr(*selected == Filter::All)
    );
    for category in categories {
        let escaped = escape_html(category);
        html.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            escaped,
            selected_attr(selected.as_value() == category && *selected != Filter::All),
            escaped
        ));
    }
    html
}

/// The feed list: one block per feed with its articles and controls.
///
/// `content` holds enriched article HTML by link; articles without an entry
/// get no content block.
pub fn render_feed_list(feeds: &[Feed], content: Option<&EnrichedContent>) -> String {
    if feeds.is_empty() {
        return "<p class=\"empty\">No feeds yet. Add one above.</p>".to_owned();
    }

    feeds
        .iter()
        .map(|feed| render_feed(feed, content))
        .collect()
}

fn render_feed(feed: &Feed, content: Option<&EnrichedContent>) -> String {
    let items: String = feed
        .items
        .iter()
        .map(|article| render_article(article, content.and_then(|c| c.get(&article.link))))
        .collect();
    let url = escape_html(&feed.url);

    format!(
        r#"<div class="feed">
<h3>{category}</h3>
<ul>{items}</ul>
<div class="feed-controls">
<a class="edit-feed" href="/?edit={edit}">Edit Feed</a>
<form method="post" action="/feeds/refresh"><input type="hidden" name="url" value="{url}"><button class="refresh-feed">Refresh Feed</button></form>
<form method="post" action="/feeds/remove"><input type="hidden" name="url" value="{url}"><button class="remove-feed">Remove Feed</button></form>
</div>
</div>
"#,
        category = escape_html(&feed.category),
        items = items,
        edit = query_escape(&feed.url),
        url = url,
    )
}

fn render_article(article: &Article, content: Option<&String>) -> String {
    let title = escape_html(&article.title);
    let href = escape_html(safe_href(&article.link));

    let image = article
        .image_url
        .as_deref()
        .map(|src| {
            format!(
                "<div><img src=\"{}\" alt=\"{}\" class=\"article-image\"></div>",
                escape_html(safe_href(src)),
                title
            )
        })
        .unwrap_or_default();

    let read_here = if article.has_placeholder_link() {
        String::new()
    } else {
        format!(
            " <a class=\"read-here\" href=\"/article?link={}\">Read Here</a>",
            query_escape(&article.link)
        )
    };

    let content_block = content
        .map(|html| format!("\n<div class=\"article-content\">{}</div>", html))
        .unwrap_or_default();

    format!(
        r#"
<li>
<div class="article-header">
<h4><a href="{href}" target="_blank" rel="noopener">{title}</a></h4>
{image}
</div>
<p>{description}</p>
<a href="{href}" target="_blank" rel="noopener">Read More</a>{read_here}
<time>{date}</time>{content_block}
</li>"#,
        href = href,
        title = title,
        image = image,
        description = article.description,
        read_here = read_here,
        date = escape_html(&format_pub_date(&article.pub_date)),
        content_block = content_block,
    )
}
