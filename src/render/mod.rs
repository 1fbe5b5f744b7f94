//! Server-side HTML rendering.
//!
//! Every request rebuilds the page from the store: the feed list, the
//! category filter options, and whichever modal or notice is open. Text from
//! feeds is escaped; descriptions and extracted content are upstream HTML and
//! are inserted as they are.

mod feeds;
mod filter;
mod page;

pub use feeds::{format_pub_date, render_feed_list, render_filter_options};
pub use filter::Filter;
pub use page::{ArticleView, PageView};
