use feed_rs::model::MediaObject;
use feed_rs::parser;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::storage::Article;
use crate::util::{collapse_whitespace, escape_html};

/// Elements treated as items when a page is HTML rather than a feed.
const HTML_ITEM_SELECTOR: &str = "article, .post, .entry";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid selector '{0}'")]
    Selector(&'static str),
}

/// Parse a fetched body into articles.
///
/// RSS and Atom are tried first. Anything `feed-rs` rejects is read as HTML
/// and each `article`/`.post`/`.entry` element becomes one item; an HTML page
/// with none of those yields an empty list. Relative links and image sources
/// in HTML are resolved against `base` when given.
pub fn parse_feed(bytes: &[u8], base: Option<&Url>) -> Result<Vec<Article>, ParseError> {
    match parser::parse(bytes) {
        Ok(feed) => Ok(from_syndication(feed)),
        Err(e) => {
            tracing::debug!(error = %e, "Body is not RSS/Atom, falling back to HTML extraction");
            parse_html(bytes, base)
        }
    }
}

fn from_syndication(feed: feed_rs::model::Feed) -> Vec<Article> {
    let source = feed.title.map(|t| t.content);

    feed.entries
        .into_iter()
        .map(|entry| {
            let image_url = media_image(&entry.media);
            let category = entry
                .categories
                .first()
                .map(|c| c.label.clone().unwrap_or_else(|| c.term.clone()));
            let author = entry.authors.first().map(|p| p.name.clone());
            let link = entry.links.first().map(|l| l.href.clone());
            let pub_date = entry.published.or(entry.updated).map(|dt| dt.to_rfc2822());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry.title.map(|t| t.content);

            Article::from_parts(title, link, pub_date, description)
                .with_category(category)
                .with_image_url(image_url)
                .with_author(author)
                .with_source(source.clone())
        })
        .collect()
}

/// First thumbnail, else first image-typed (or untyped) media content.
/// RSS `<enclosure>` and `<media:content>` both land in `media`.
fn media_image(media: &[MediaObject]) -> Option<String> {
    media.iter().find_map(|object| {
        object
            .thumbnails
            .first()
            .map(|t| t.image.uri.clone())
            .or_else(|| {
                object
                    .content
                    .iter()
                    .filter(|c| match &c.content_type {
                        Some(mime) => mime.ty().as_str() == "image",
                        None => true,
                    })
                    .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            })
    })
}

fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css))
}

fn parse_html(bytes: &[u8], base: Option<&Url>) -> Result<Vec<Article>, ParseError> {
    let html = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&html);

    let items = selector(HTML_ITEM_SELECTOR)?;
    let title_sel = selector("h1, h2, h3, .title")?;
    let link_sel = selector("a[href]")?;
    let time_sel = selector("time")?;
    let description_sel = selector("p, .summary, .excerpt")?;
    let image_sel = selector("img[src]")?;
    let author_sel = selector(".author, [rel=author]")?;

    let articles = document
        .select(&items)
        // An .entry nested in an <article> is the same item; keep the outermost.
        .filter(|element| {
            !element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| items.matches(&ancestor))
        })
        .map(|element| {
            let text_of = |sel: &Selector| {
                element
                    .select(sel)
                    .next()
                    .map(|e| collapse_whitespace(&e.text().collect::<String>()))
            };
            let attr_of = |sel: &Selector, attr: &str| {
                element
                    .select(sel)
                    .next()
                    .and_then(|e| e.value().attr(attr))
                    .map(|value| resolve(base, value))
            };

            let pub_date = element.select(&time_sel).next().map(|time| {
                time.value()
                    .attr("datetime")
                    .map(str::to_owned)
                    .unwrap_or_else(|| collapse_whitespace(&time.text().collect::<String>()))
            });

            Article::from_parts(
                text_of(&title_sel),
                attr_of(&link_sel, "href"),
                pub_date,
                // Descriptions are rendered as markup; scraped text is not.
                text_of(&description_sel).map(|text| escape_html(&text).into_owned()),
            )
            .with_image_url(attr_of(&image_sel, "src"))
            .with_author(text_of(&author_sel))
        })
        .collect();

    Ok(articles)
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_owned())
}
