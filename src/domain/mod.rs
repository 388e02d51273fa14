//! Domain Layer
//!
//! Library items and the ports through which the rest of the crate reaches
//! the item store.
//!
//! # Architecture
//!
//! The domain layer is organized into:
//!
//! - **Items** (`item.rs`) - Library item records and their identifiers
//! - **Ports** (`ports.rs`) - Trait abstractions for the item store and the
//!   non-predicate query axes (store, genre, text search)
//!
//! # Usage
//!
//! ```ignore
//! use shelfwise::domain::{BaseQuery, InMemoryItemStore, ItemStore};
//!
//! let store = InMemoryItemStore::from_json_file("library.json")?;
//! let base = BaseQuery::default().with_store("steam").apply(store.items());
//! ```

pub mod item;
pub mod ports;

// Re-export commonly used types
pub use item::{Item, ItemId};
pub use ports::{BaseQuery, InMemoryItemStore, ItemStore};
