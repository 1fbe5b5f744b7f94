use super::feeds::{query_escape, render_feed_list, render_filter_options, safe_href};
use super::filter::Filter;
use crate::content::EnrichedContent;
use crate::storage::Feed;
use crate::util::escape_html;

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 60rem; margin: 0 auto; padding: 1rem; }
.feed { border-bottom: 1px solid #ddd; padding-bottom: 1rem; margin-bottom: 1rem; }
.feed ul { list-style: none; padding: 0; }
.feed li { margin-bottom: 1.5rem; }
.article-image { max-width: 100%; height: auto; }
.feed-controls form { display: inline; }
.notice { background: #fff3cd; border: 1px solid #ffe69c; padding: 0.5rem 1rem; }
.modal { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.4); overflow: auto; }
.modal-content { background: #fff; margin: 5% auto; padding: 1rem; max-width: 50rem; }
.modal-close { float: right; text-decoration: none; font-size: 1.5rem; }
"#;

/// Full article content shown in the reading modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleView {
    pub link: String,
    pub content: String,
}

/// Everything one page render needs.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    /// Feeds after filtering.
    pub feeds: Vec<Feed>,
    /// Every category in the collection, for the filter.
    pub categories: Vec<String>,
    pub filter: Filter,
    pub content: Option<EnrichedContent>,
    /// Feed whose edit modal is open.
    pub edit: Option<Feed>,
    pub article: Option<ArticleView>,
    pub notice: Option<String>,
}

impl PageView {
    /// Render the whole HTML document.
    pub fn render(&self) -> String {
        let notice = self
            .notice
            .as_deref()
            .map(|n| format!("<div class=\"notice\" role=\"alert\">{}</div>\n", escape_html(n)))
            .unwrap_or_default();

        let edit_modal = self
            .edit
            .as_ref()
            .map(|feed| render_edit_modal(feed, self.close_href()))
            .unwrap_or_default();

        let article_modal = self
            .article
            .as_ref()
            .map(|article| render_article_modal(article, self.close_href()))
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>RSS Feed Reader</title>
<style>{style}</style>
</head>
<body>
<h1>RSS Feed Reader</h1>
{notice}<form id="addFeedForm" method="post" action="/feeds">
<input type="url" id="feedUrl" name="feedUrl" placeholder="Feed URL" required>
<input type="text" id="category" name="category" placeholder="Category" required>
<button type="submit">Add Feed</button>
</form>
<form id="filterForm" method="get" action="/">
<label for="filterSelect">Filter:</label>
<select id="filterSelect" name="category" onchange="this.form.submit()">{options}</select>
<noscript><button type="submit">Apply</button></noscript>
</form>
<div id="feedsContainer">
{feeds}</div>
{edit_modal}{article_modal}</body>
</html>
"#,
            style = STYLE,
            notice = notice,
            options = render_filter_options(&self.categories, &self.filter),
            feeds = render_feed_list(&self.feeds, self.content.as_ref()),
            edit_modal = edit_modal,
            article_modal = article_modal,
        )
    }

    /// Where closing a modal goes: the same page with the filter kept.
    fn close_href(&self) -> String {
        match &self.filter {
            Filter::All => "/".to_owned(),
            Filter::Category(category) => format!("/?category={}", query_escape(category)),
        }
    }
}

fn render_edit_modal(feed: &Feed, close_href: String) -> String {
    let url = escape_html(&feed.url);
    format!(
        r#"<div id="editModal" class="modal">
<div class="modal-content">
<a id="modalCloseBtn" class="modal-close" href="{close}">&times;</a>
<h2>Edit Feed</h2>
<form id="editModalForm" method="post" action="/feeds/edit">
<input type="hidden" name="originalUrl" value="{url}">
<input type="url" id="editFeedUrl" name="editFeedUrl" value="{url}" required>
<input type="text" id="editCategory" name="editCategory" value="{category}" required>
<button type="submit">Save Changes</button>
</form>
</div>
</div>
"#,
        close = escape_html(&close_href),
        url = url,
        category = escape_html(&feed.category),
    )
}

fn render_article_modal(article: &ArticleView, close_href: String) -> String {
    format!(
        r#"<div id="articleModal" class="modal">
<div class="modal-content">
<a class="modal-close" href="{close}">&times;</a>
<p><a href="{href}" target="_blank" rel="noopener">{link}</a></p>
<div class="article-content">{content}</div>
</div>
</div>
"#,
        close = escape_html(&close_href),
        href = escape_html(safe_href(&article.link)),
        link = escape_html(&article.link),
        content = article.content,
    )
}
