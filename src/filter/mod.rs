//! Category-aware filters
//!
//! ```text
//! FilterCatalog ──▶ compile(selection) ──▶ CompiledPredicate ──▶ working set
//!       │
//!       └────────▶ count_all(base set) ──▶ FilterCounts (picker badges)
//! ```
//!
//! Filters in one category are alternatives, filters across categories must
//! all hold. Counting evaluates each filter on its own.

mod catalog;
mod compiler;
mod counting;
mod proptest;
pub mod standard;

pub use catalog::{
    FilterCatalog, FilterCatalogBuilder, FilterDefinition, PredicateError, PredicateFn,
    PredicateResult,
};
pub use compiler::{compile, CompiledPredicate};
pub use counting::{count_all, FilterCounts};
pub use standard::{standard_catalog, standard_catalog_for_year};
