//! Property-Based Tests for the Filter Compiler and Counting Engine
//!
//! # Test Properties
//!
//! 1. **Determinism**: any permutation of a selection, with duplicates,
//!    compiles to the same accept/reject decisions
//! 2. **Same category**: `compile({a, b}) == a OR b`
//! 3. **Across categories**: `compile({a, b}) == a AND b`
//! 4. **Empty selection**: accepts every item
//! 5. **Counts**: equal the brute-force count for every filter

#![cfg(test)]

use proptest::prelude::*;

use super::standard::{
    standard_catalog_for_year, CATEGORY_GAMEPLAY, CATEGORY_INSTALLATION, CATEGORY_RATINGS,
    CATEGORY_RELEASE,
};
use super::{compile, count_all, FilterCatalog};
use crate::domain::Item;

// =============================================================================
// Property Strategies
// =============================================================================

fn catalog() -> FilterCatalog {
    standard_catalog_for_year(2026).expect("standard catalog builds")
}

/// Strategy for items covering every band, including invalid attributes.
fn item_strategy() -> impl Strategy<Value = Item> {
    (
        "[a-z0-9]{1,8}",
        prop::option::of(prop_oneof![Just(-1.0f64), 0.0f64..200.0]),
        prop::option::of(0u8..=120),
        prop::option::of(1985i32..=2026),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(id, playtime, rating, year, installed, completed)| {
            let mut item = Item::new(id.as_str(), id.as_str(), "steam");
            item.playtime_hours = playtime;
            item.rating = rating;
            item.release_year = year;
            item.installed = installed;
            item.completed = completed;
            item
        })
}

fn items_strategy() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(item_strategy(), 0..40)
}

/// Strategy for selections drawn from catalog ids plus stale unknown ids.
fn selection_strategy() -> impl Strategy<Value = Vec<String>> {
    let catalog = catalog();
    let mut pool: Vec<String> = catalog.iter().map(|d| d.id().to_string()).collect();
    pool.push("stale-bookmark".to_string());
    pool.push("removed-filter".to_string());
    prop::collection::vec(prop::sample::select(pool), 0..8)
}

fn single(catalog: &FilterCatalog, id: &str, item: &Item) -> bool {
    catalog.get(id).unwrap().evaluate(item).unwrap_or(false)
}

fn pair_in(catalog: &FilterCatalog, category: &str) -> impl Strategy<Value = (String, String)> {
    let ids = catalog.ids_in_category(category).to_vec();
    (prop::sample::select(ids.clone()), prop::sample::select(ids))
}

// =============================================================================
// Compiler Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: permuting and duplicating a selection never changes decisions.
    #[test]
    fn prop_compile_is_deterministic(
        selection in selection_strategy(),
        items in items_strategy(),
        seed in any::<u64>(),
    ) {
        let catalog = catalog();
        let first = compile(&catalog, &selection);

        let mut shuffled = selection.clone();
        shuffled.extend(selection.iter().take(2).cloned());
        let len = shuffled.len().max(1);
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();
        let second = compile(&catalog, &shuffled);

        prop_assert_eq!(first.selected_ids(), second.selected_ids());
        for item in &items {
            prop_assert_eq!(first.matches(item), second.matches(item));
        }
    }

    /// Property: filters of one category combine with OR.
    #[test]
    fn prop_same_category_is_or(
        (a, b) in pair_in(&catalog(), CATEGORY_RATINGS),
        item in item_strategy(),
    ) {
        let catalog = catalog();
        let compiled = compile(&catalog, [&a, &b]);
        let expected = single(&catalog, &a, &item) || single(&catalog, &b, &item);
        prop_assert_eq!(compiled.matches(&item), expected);
    }

    /// Property: filters of different categories combine with AND.
    #[test]
    fn prop_cross_category_is_and(
        a in prop::sample::select(catalog().ids_in_category(CATEGORY_GAMEPLAY).to_vec()),
        b in prop::sample::select(catalog().ids_in_category(CATEGORY_RELEASE).to_vec()),
        item in item_strategy(),
    ) {
        let catalog = catalog();
        let compiled = compile(&catalog, [&a, &b]);
        let expected = single(&catalog, &a, &item) && single(&catalog, &b, &item);
        prop_assert_eq!(compiled.matches(&item), expected);
    }

    /// Property: the empty selection accepts every item.
    #[test]
    fn prop_empty_selection_accepts_all(item in item_strategy()) {
        let catalog = catalog();
        prop_assert!(compile(&catalog, Vec::<String>::new()).matches(&item));
    }

    /// Property: counts equal a brute-force count per filter.
    #[test]
    fn prop_counts_match_brute_force(items in items_strategy()) {
        let catalog = catalog();
        let counts = count_all(&catalog, &items);

        prop_assert_eq!(counts.len(), catalog.len());
        for def in catalog.iter() {
            let brute = items
                .iter()
                .filter(|item| matches!(def.evaluate(item), Ok(true)))
                .count();
            prop_assert_eq!(counts.get(def.id()), Some(brute));
        }
    }

    /// Property: the installation axis is a strict split of the working set.
    #[test]
    fn prop_installation_counts_partition(items in items_strategy()) {
        let catalog = catalog();
        let counts = count_all(&catalog, &items);
        let ids = catalog.ids_in_category(CATEGORY_INSTALLATION);
        let sum: usize = ids.iter().filter_map(|id| counts.get(id)).sum();
        prop_assert_eq!(sum, items.len());
    }
}

#[test]
fn test_gameplay_and_ratings_categories_exist() {
    let catalog = catalog();
    assert!(!catalog.ids_in_category(CATEGORY_GAMEPLAY).is_empty());
    assert!(!catalog.ids_in_category(CATEGORY_RATINGS).is_empty());
}
