//! Library item records

use serde::{Deserialize, Serialize};

/// Stable item identifier (value object).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single entry in the aggregated library.
///
/// Attributes that a storefront may not report are optional; predicates that
/// need them decide for themselves whether absence means "no match" or an
/// evaluation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier across syncs
    pub id: ItemId,
    /// Display title
    pub title: String,
    /// Storefront slug (e.g. "steam", "gog")
    pub store: String,
    /// Genre tags
    #[serde(default)]
    pub genres: Vec<String>,
    /// Recorded playtime in hours
    #[serde(default)]
    pub playtime_hours: Option<f64>,
    /// Critic score, 0-100
    #[serde(default)]
    pub rating: Option<u8>,
    /// Release year
    #[serde(default)]
    pub release_year: Option<i32>,
    /// Installed locally
    #[serde(default)]
    pub installed: bool,
    /// Marked as finished by the user
    #[serde(default)]
    pub completed: bool,
}

impl Item {
    /// Create an item with only the required attributes set
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, store: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            store: store.into(),
            genres: Vec::new(),
            playtime_hours: None,
            rating: None,
            release_year: None,
            installed: false,
            completed: false,
        }
    }

    pub fn with_playtime(mut self, hours: f64) -> Self {
        self.playtime_hours = Some(hours);
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_release_year(mut self, year: i32) -> Self {
        self.release_year = Some(year);
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn installed(mut self) -> Self {
        self.installed = true;
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Whether the item carries the genre (case-insensitive)
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }
}
