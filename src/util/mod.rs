//! Utility functions shared by ingestion, storage and rendering.
//!
//! - **URL validation**: scheme and host checks for user-supplied feed URLs
//! - **Text processing**: control-character stripping, whitespace folding and
//!   HTML escaping for the renderer
//!
//! # Examples
//!
//! ```
//! use feedrelay::util::{escape_html, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(escape_html("<b>"), "&lt;b&gt;");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, escape_html, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
