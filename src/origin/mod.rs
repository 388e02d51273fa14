//! Origin - Popularity Rankings
//!
//! The expensive, rate-limited lookup the cache exists to protect.
//!
//! ```text
//! fetch_all(ids)
//!   ├─ most-played     ┐
//!   ├─ trending        │  at most `workers` at once,
//!   ├─ top-rated       │  each batch call bounded by `call_timeout`,
//!   ├─ ...             │  the whole fan-out bounded by `deadline`
//!   └─ hidden-gems     ┘
//!        ▼
//!   PopularityReport { facets, failed }
//! ```

mod fetcher;
mod report;
mod source;

pub use fetcher::{OriginConfig, OriginFetcher};
pub use report::{Facet, FacetRanking, PopularityReport, RankedItem};
pub use source::{HttpPopularitySource, PopularitySource};
