//! Library query pipeline
//!
//! Glues the pieces together for one request:
//!
//! ```text
//! ItemStore ─▶ BaseQuery ─▶ base set ─┬─▶ count_all ───────────▶ counts
//!                                     └─▶ compiled predicate ─▶ working set
//!                                                                  │
//!                                              WorkingSetKey ◀─────┘
//!                                                    │
//!                                     CacheOrchestrator::resolve ─▶ popularity
//! ```
//!
//! The popularity lookup degrades gracefully: when it fails the rest of the
//! view is still returned, with the failure reported alongside.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::{CacheOrchestrator, Resolved, WorkingSetKey};
use crate::domain::{BaseQuery, Item, ItemId, ItemStore};
use crate::filter::{FilterCatalog, FilterCounts};
use crate::origin::{OriginFetcher, PopularityReport, PopularitySource};

/// One request against the library
#[derive(Debug, Clone, Default)]
pub struct LibraryQuery {
    pub base: BaseQuery,
    /// Selected filter ids; unknown ids are ignored
    pub filters: Vec<String>,
}

impl LibraryQuery {
    pub fn new(base: BaseQuery) -> Self {
        Self {
            base,
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, id: impl Into<String>) -> Self {
        self.filters.push(id.into());
        self
    }
}

/// Everything a library page needs
#[derive(Debug, Clone)]
pub struct LibraryView {
    pub working_set: Vec<Item>,
    /// Per-filter counts over the base set (picker badges)
    pub counts: FilterCounts,
    /// Known filters that were applied, sorted
    pub applied_filters: Vec<String>,
    pub key: WorkingSetKey,
    pub popularity: Option<Resolved<PopularityReport>>,
    pub popularity_error: Option<String>,
}

impl LibraryView {
    pub fn summary(&self) -> ViewSummary<'_> {
        ViewSummary {
            items: self.working_set.iter().map(|item| &item.id).collect(),
            total: self.working_set.len(),
            applied_filters: &self.applied_filters,
            counts: &self.counts,
            key: &self.key,
            popularity: self.popularity.as_ref(),
            popularity_error: self.popularity_error.as_deref(),
        }
    }
}

/// Serializable digest of a [`LibraryView`]
#[derive(Debug, Serialize)]
pub struct ViewSummary<'a> {
    pub items: Vec<&'a ItemId>,
    pub total: usize,
    pub applied_filters: &'a [String],
    pub counts: &'a FilterCounts,
    pub key: &'a WorkingSetKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<&'a Resolved<PopularityReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity_error: Option<&'a str>,
}

/// Catalog entry as shown in a filter picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub id: String,
    pub category: String,
    pub display_name: String,
}

/// Filtering, counting and cached popularity for a library
pub struct LibraryService<S> {
    catalog: Arc<FilterCatalog>,
    cache: Arc<CacheOrchestrator<PopularityReport>>,
    fetcher: Option<Arc<OriginFetcher<S>>>,
}

impl<S: PopularitySource + 'static> LibraryService<S> {
    pub fn new(
        catalog: Arc<FilterCatalog>,
        cache: Arc<CacheOrchestrator<PopularityReport>>,
        fetcher: Arc<OriginFetcher<S>>,
    ) -> Self {
        Self {
            catalog,
            cache,
            fetcher: Some(fetcher),
        }
    }

    /// Filtering and counting only; no popularity lookups
    pub fn offline(catalog: Arc<FilterCatalog>, cache: Arc<CacheOrchestrator<PopularityReport>>) -> Self {
        Self {
            catalog,
            cache,
            fetcher: None,
        }
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &CacheOrchestrator<PopularityReport> {
        &self.cache
    }

    /// Catalog in registration order
    pub fn list_filters(&self) -> Vec<FilterSummary> {
        self.catalog
            .iter()
            .map(|def| FilterSummary {
                id: def.id().to_string(),
                category: def.category().to_string(),
                display_name: def.display_name().to_string(),
            })
            .collect()
    }

    #[instrument(skip(self, store, query), fields(filters = query.filters.len()))]
    pub async fn query(&self, store: &dyn ItemStore, query: &LibraryQuery) -> LibraryView {
        let base = query.base.apply(store.items());
        let counts = self.catalog.count_all(&base);

        let predicate = self.catalog.compile(&query.filters);
        let applied_filters = predicate.selected_ids().to_vec();
        let working_set: Vec<Item> = predicate.filter(base).collect();
        let key = WorkingSetKey::from_items(&working_set);

        info!(
            base = counts.total(),
            working = working_set.len(),
            key = %key.short(),
            "Working set computed"
        );

        let (popularity, popularity_error) = match &self.fetcher {
            Some(fetcher) => {
                let ids: Vec<ItemId> = working_set.iter().map(|item| item.id.clone()).collect();
                let resolved = self
                    .cache
                    .resolve(&key, || async move { fetcher.fetch_all(&ids).await })
                    .await;
                match resolved {
                    Ok(resolved) => (Some(resolved), None),
                    Err(e) => {
                        warn!(error = %e, "Popularity unavailable for working set");
                        (None, Some(e.to_string()))
                    }
                }
            }
            None => (None, None),
        };

        LibraryView {
            working_set,
            counts,
            applied_filters,
            key,
            popularity,
            popularity_error,
        }
    }
}
