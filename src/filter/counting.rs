//! Counting Engine
//!
//! Per-filter match counts over the base working set, computed in a single
//! traversal. Counts are independent per filter: they answer "how many items
//! would match if this filter alone were added", which is what a filter picker
//! shows next to each option. The OR/AND composition is deliberately not
//! applied here.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::Item;

use super::catalog::FilterCatalog;

/// Match counts keyed by filter id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    /// Items matching each filter (every catalog filter is present)
    counts: BTreeMap<String, usize>,
    /// Items whose evaluation failed, per filter (only non-zero entries)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    failures: BTreeMap<String, usize>,
    /// Size of the set that was counted
    total: usize,
}

impl FilterCounts {
    /// Count for a filter, `None` if it is not in the catalog
    pub fn get(&self, filter_id: &str) -> Option<usize> {
        self.counts.get(filter_id).copied()
    }

    /// Evaluation failures recorded for a filter
    pub fn failures(&self, filter_id: &str) -> usize {
        self.failures.get(filter_id).copied().unwrap_or(0)
    }

    /// Number of items counted
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(id, n)| (id.as_str(), *n))
    }

    pub fn as_map(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Count every catalog filter against the base working set in one pass.
///
/// A predicate error excludes that item from that filter's count only.
pub fn count_all(catalog: &FilterCatalog, base_working_set: &[Item]) -> FilterCounts {
    let filters: Vec<_> = catalog.iter().collect();
    let mut counts = vec![0usize; filters.len()];
    let mut failures = vec![0usize; filters.len()];

    for item in base_working_set {
        for (slot, def) in filters.iter().enumerate() {
            match def.check(item) {
                Ok(true) => counts[slot] += 1,
                Ok(false) => {}
                Err(e) => {
                    failures[slot] += 1;
                    warn!(error = %e, "Predicate evaluation failed during counting");
                }
            }
        }
    }

    debug!(
        items = base_working_set.len(),
        filters = filters.len(),
        "Counted filter matches"
    );

    let mut result = FilterCounts {
        total: base_working_set.len(),
        ..Default::default()
    };
    for (slot, def) in filters.iter().enumerate() {
        result.counts.insert(def.id().to_string(), counts[slot]);
        if failures[slot] > 0 {
            result.failures.insert(def.id().to_string(), failures[slot]);
        }
    }
    result
}

impl FilterCatalog {
    /// Shorthand for [`count_all`]
    pub fn count_all(&self, base_working_set: &[Item]) -> FilterCounts {
        count_all(self, base_working_set)
    }
}
