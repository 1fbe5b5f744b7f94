use crate::storage::Feed;

/// Category filter applied before rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Category(String),
}

impl Filter {
    /// Option value that selects every category.
    pub const ALL_VALUE: &'static str = "all";

    /// Read the `category` query value. Missing, blank and `all` select
    /// everything.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some(Self::ALL_VALUE) => Self::All,
            Some(category) => Self::Category(category.to_owned()),
        }
    }

    pub fn as_value(&self) -> &str {
        match self {
            Self::All => Self::ALL_VALUE,
            Self::Category(category) => category,
        }
    }

    pub fn matches(&self, feed: &Feed) -> bool {
        match self {
            Self::All => true,
            Self::Category(category) => feed.category == *category,
        }
    }

    /// Keep the matching feeds, in collection order.
    pub fn apply(&self, feeds: Vec<Feed>) -> Vec<Feed> {
        match self {
            Self::All => feeds,
            Self::Category(_) => feeds.into_iter().filter(|f| self.matches(f)).collect(),
        }
    }
}
