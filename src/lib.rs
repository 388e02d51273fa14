//! Shelfwise - Filtered Library Views with Cached Popularity
//!
//! The core of a content-library aggregator: a category-aware filter compiler
//! and a two-tier cache in front of an expensive, rate-limited popularity
//! service.
//!
//! # Architecture
//!
//! ```text
//! Filter Catalog → Predicate Compiler → Working Set → WorkingSetKey
//!        └──────→ Counting Engine                        │
//!                                                        ▼
//!                      Tier1 (RAM) → Tier2 (Durable) → Origin Fetcher
//! ```
//!
//! Filters in one category are alternatives (OR); categories are combined
//! with AND. The cache key is a digest of the working set's membership, so a
//! membership change is the invalidation.
//!
//! # Modules
//!
//! - [`domain`] - Library items, the item store port and base query axes
//! - [`filter`] - Filter catalog, predicate compiler and counting engine
//! - [`cache`] - Working-set keys, Tier1/Tier2 and the cache orchestrator
//! - [`origin`] - Popularity service client and bounded-parallel fetcher
//! - [`library`] - End-to-end query pipeline
//! - [`error`] - Error types

pub mod cache;
pub mod domain;
pub mod error;
pub mod filter;
pub mod library;
pub mod origin;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheOrchestrator, Resolved, Source, WorkingSetKey};
pub use domain::{BaseQuery, InMemoryItemStore, Item, ItemId, ItemStore};
pub use error::{Error, Result};
pub use filter::{compile, count_all, CompiledPredicate, FilterCatalog, FilterCounts};
pub use library::{LibraryQuery, LibraryService, LibraryView};
pub use origin::{HttpPopularitySource, OriginConfig, OriginFetcher, PopularityReport};
