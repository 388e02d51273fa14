//! Domain Ports (Port/Adapter Pattern)
//!
//! The item store is an external collaborator: import and sync adapters
//! populate it, this crate only reads it. [`ItemStore`] is the seam,
//! [`InMemoryItemStore`] the adapter used by the CLI and tests.

use std::path::Path;

use crate::error::Result;

use super::item::Item;

// =============================================================================
// Item Store Port
// =============================================================================

/// Port for enumerating library items.
pub trait ItemStore: Send + Sync {
    /// All items in store order.
    fn items(&self) -> Vec<Item>;

    /// Number of items.
    fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether the store holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Item store backed by a vector.
#[derive(Debug, Clone, Default)]
pub struct InMemoryItemStore {
    items: Vec<Item>,
}

impl InMemoryItemStore {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// Load a JSON array of items.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let items: Vec<Item> = serde_json::from_slice(&raw)?;
        Ok(Self { items })
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }
}

impl ItemStore for InMemoryItemStore {
    fn items(&self) -> Vec<Item> {
        self.items.clone()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

// =============================================================================
// Non-predicate Query Axes
// =============================================================================

/// Store, genre and text-search axes applied before the predicate filters.
///
/// The result of [`BaseQuery::apply`] is the base working set: the input to
/// filter counting and to the compiled predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseQuery {
    /// Storefront slug, matched case-insensitively
    pub store: Option<String>,
    /// Genre tag, matched case-insensitively
    pub genre: Option<String>,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
}

impl BaseQuery {
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Check a single item against every active axis.
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(store) = non_blank(&self.store) {
            if !item.store.eq_ignore_ascii_case(store) {
                return false;
            }
        }

        if let Some(genre) = non_blank(&self.genre) {
            if !item.has_genre(genre) {
                return false;
            }
        }

        if let Some(search) = non_blank(&self.search) {
            let needle = search.to_lowercase();
            if !item.title.to_lowercase().contains(&needle) {
                return false;
            }
        }

        true
    }

    /// Narrow items to the base working set, preserving order.
    pub fn apply(&self, items: Vec<Item>) -> Vec<Item> {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> InMemoryItemStore {
        InMemoryItemStore::new(vec![
            Item::new("1", "Hades", "steam").with_genres(["Roguelike", "Action"]),
            Item::new("2", "Hades II", "epic").with_genres(["Roguelike"]),
            Item::new("3", "Celeste", "steam").with_genres(["Platformer"]),
        ])
    }

    #[test]
    fn test_empty_query_keeps_everything() {
        let store = library();
        let base = BaseQuery::default().apply(store.items());
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_store_genre_search_axes() {
        let store = library();

        let steam = BaseQuery::default().with_store("STEAM").apply(store.items());
        assert_eq!(steam.len(), 2);

        let rogue = BaseQuery::default()
            .with_genre("roguelike")
            .with_search("hades ii")
            .apply(store.items());
        assert_eq!(rogue.len(), 1);
        assert_eq!(rogue[0].id.as_str(), "2");
    }

    #[test]
    fn test_blank_axes_are_ignored() {
        let store = library();
        let base = BaseQuery::default().with_search("   ").apply(store.items());
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(
            &path,
            r#"[{"id": "a", "title": "A", "store": "gog"}, {"id": "b", "title": "B", "store": "gog"}]"#,
        )
        .unwrap();

        let store = InMemoryItemStore::from_json_file(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}
