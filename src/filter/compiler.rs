//! Predicate Compiler
//!
//! Turns a selection of filter ids into a single predicate. Filters in the
//! same category are alternatives (OR), categories are requirements (AND).
//!
//! ```text
//! selection: [unplayed, started, highly-rated]
//!
//!   gameplay: unplayed OR started ──┐
//!                                   AND ──▶ CompiledPredicate
//!   ratings:  highly-rated ─────────┘
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::Item;

use super::catalog::{FilterCatalog, FilterDefinition};

/// Selected filters of one category, OR-ed together
#[derive(Debug, Clone)]
struct CategoryGroup {
    category: String,
    terms: Vec<FilterDefinition>,
}

impl CategoryGroup {
    fn matches(&self, item: &Item) -> bool {
        self.terms.iter().any(|term| evaluate_or_reject(term, item))
    }
}

/// One evaluable predicate for a whole selection.
///
/// Cheap to clone; the groups are shared.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    groups: Arc<[CategoryGroup]>,
    selected: Vec<String>,
}

impl CompiledPredicate {
    /// Predicate that accepts every item
    pub fn accept_all() -> Self {
        Self {
            groups: Arc::from(Vec::new()),
            selected: Vec::new(),
        }
    }

    /// AND across categories of OR within each category
    pub fn matches(&self, item: &Item) -> bool {
        self.groups.iter().all(|group| group.matches(item))
    }

    /// True when no known filter was selected
    pub fn is_unconstrained(&self) -> bool {
        self.groups.is_empty()
    }

    /// Known, de-duplicated selection, sorted
    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    /// Categories that constrain the predicate, in catalog order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.category.as_str())
    }

    /// Keep the matching items, preserving order
    pub fn filter<'a, I>(&'a self, items: I) -> impl Iterator<Item = I::Item> + 'a
    where
        I: IntoIterator + 'a,
        I::Item: std::borrow::Borrow<Item>,
    {
        use std::borrow::Borrow;
        items
            .into_iter()
            .filter(move |item| self.matches(<I::Item as Borrow<Item>>::borrow(item)))
    }
}

impl Default for CompiledPredicate {
    fn default() -> Self {
        Self::accept_all()
    }
}

/// Compile a selection against the catalog.
///
/// Unknown ids are dropped so stale bookmarked selections keep working.
/// Duplicates collapse. An empty effective selection accepts everything.
pub fn compile<I, S>(catalog: &FilterCatalog, selection: I) -> CompiledPredicate
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected: BTreeSet<String> = BTreeSet::new();
    for id in selection {
        let id = id.as_ref();
        if catalog.contains(id) {
            selected.insert(id.to_string());
        } else {
            debug!(filter_id = %id, "Ignoring unknown filter id");
        }
    }

    if selected.is_empty() {
        return CompiledPredicate::accept_all();
    }

    let groups: Vec<CategoryGroup> = catalog
        .categories()
        .iter()
        .filter_map(|category| {
            let terms: Vec<FilterDefinition> = catalog
                .ids_in_category(category)
                .iter()
                .filter(|id| selected.contains(*id))
                .filter_map(|id| catalog.get(id).cloned())
                .collect();

            (!terms.is_empty()).then(|| CategoryGroup {
                category: category.clone(),
                terms,
            })
        })
        .collect();

    debug!(
        filters = selected.len(),
        categories = groups.len(),
        "Compiled filter selection"
    );

    CompiledPredicate {
        groups: Arc::from(groups),
        selected: selected.into_iter().collect(),
    }
}

impl FilterCatalog {
    /// Shorthand for [`compile`]
    pub fn compile<I, S>(&self, selection: I) -> CompiledPredicate
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        compile(self, selection)
    }
}

/// Failed evaluations count as a non-match for that term
fn evaluate_or_reject(def: &FilterDefinition, item: &Item) -> bool {
    match def.check(item) {
        Ok(matched) => matched,
        Err(e) => {
            warn!(error = %e, "Predicate evaluation failed, treating as non-match");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::catalog::PredicateError;

    fn playtime(item: &Item) -> f64 {
        item.playtime_hours.unwrap_or(0.0)
    }

    fn catalog() -> FilterCatalog {
        let mut builder = FilterCatalog::builder();
        builder
            .register("unplayed", "gameplay", "Unplayed", |i: &Item| Ok(playtime(i) == 0.0))
            .unwrap()
            .register("started", "gameplay", "Started", |i: &Item| {
                Ok(playtime(i) > 0.0 && playtime(i) < 10.0)
            })
            .unwrap()
            .register("highly-rated", "ratings", "Highly rated", |i: &Item| {
                Ok(i.rating.is_some_and(|r| r >= 85))
            })
            .unwrap()
            .register("broken", "diagnostics", "Broken", |_: &Item| {
                Err(PredicateError::new("attribute missing"))
            })
            .unwrap();
        builder.build()
    }

    fn item(id: &str, hours: f64, rating: u8) -> Item {
        Item::new(id, id, "steam")
            .with_playtime(hours)
            .with_rating(rating)
    }

    #[test]
    fn test_scenario_mixed_categories() {
        let catalog = catalog();
        let predicate = compile(&catalog, ["unplayed", "started", "highly-rated"]);

        assert!(predicate.matches(&item("a", 0.0, 95)));
        assert!(!predicate.matches(&item("b", 3.0, 40)));
    }

    #[test]
    fn test_empty_selection_accepts_everything() {
        let catalog = catalog();
        let predicate = compile(&catalog, Vec::<String>::new());

        assert!(predicate.is_unconstrained());
        assert!(predicate.matches(&item("a", 100.0, 10)));
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let catalog = catalog();

        let only_unknown = compile(&catalog, ["legacy-filter", "removed"]);
        assert!(only_unknown.is_unconstrained());

        let mixed = compile(&catalog, ["legacy-filter", "unplayed"]);
        assert_eq!(mixed.selected_ids(), ["unplayed"]);
        assert!(mixed.matches(&item("a", 0.0, 10)));
        assert!(!mixed.matches(&item("b", 1.0, 10)));
    }

    #[test]
    fn test_duplicates_and_order_collapse() {
        let catalog = catalog();
        let a = compile(&catalog, ["highly-rated", "started", "started"]);
        let b = compile(&catalog, ["started", "highly-rated"]);

        assert_eq!(a.selected_ids(), b.selected_ids());
        assert_eq!(a.categories().collect::<Vec<_>>(), ["gameplay", "ratings"]);
        for probe in [item("x", 0.0, 90), item("y", 5.0, 90), item("z", 5.0, 50)] {
            assert_eq!(a.matches(&probe), b.matches(&probe));
        }
    }

    #[test]
    fn test_failing_predicate_is_non_match() {
        let catalog = catalog();

        let broken = compile(&catalog, ["broken"]);
        assert!(!broken.matches(&item("a", 0.0, 90)));

        // A failing alternative does not hide a matching one
        let mut builder = FilterCatalog::builder();
        builder
            .register("ok", "c", "Ok", |_: &Item| Ok(true))
            .unwrap()
            .register("bad", "c", "Bad", |_: &Item| Err(PredicateError::new("boom")))
            .unwrap();
        let same_category = builder.build();
        assert!(compile(&same_category, ["bad", "ok"]).matches(&item("a", 0.0, 0)));
    }

    #[test]
    fn test_filter_preserves_order() {
        let catalog = catalog();
        let predicate = compile(&catalog, ["started"]);
        let items = vec![item("a", 1.0, 0), item("b", 0.0, 0), item("c", 2.0, 0)];

        let ids: Vec<&str> = predicate.filter(&items).map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }
}
