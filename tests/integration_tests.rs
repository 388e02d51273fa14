//! Shelfwise Integration Tests
//!
//! End-to-end scenarios:
//! - Feature 1: Category-aware filtering and counting
//! - Feature 2: Two-tier caching with coalesced origin fetches
//! - Feature 3: Library pipeline over a durable cache

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use shelfwise::domain::{Item, ItemId};
use shelfwise::error::{Error, Result};
use shelfwise::origin::{Facet, PopularitySource, RankedItem};

/// Popularity source that counts remote calls and can be switched off
#[derive(Default)]
struct FakePopularity {
    calls: AtomicUsize,
    down: AtomicBool,
    delay: Option<Duration>,
}

#[async_trait]
impl PopularitySource for FakePopularity {
    async fn fetch_rankings(&self, facet: Facet, ids: &[ItemId]) -> Result<Vec<RankedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::OriginQuery(format!("{} unavailable", facet)));
        }
        Ok(ids
            .iter()
            .enumerate()
            .map(|(i, id)| RankedItem {
                id: id.clone(),
                rank: i as u32 + 1,
                score: 100.0 - i as f64,
            })
            .collect())
    }
}

fn library() -> Vec<Item> {
    vec![
        Item::new("steam:1", "Hades", "steam")
            .with_playtime(0.0)
            .with_rating(93)
            .with_release_year(2020)
            .installed(),
        Item::new("steam:2", "Celeste", "steam")
            .with_playtime(4.5)
            .with_rating(91)
            .with_release_year(2018),
        Item::new("steam:3", "Anthem", "steam")
            .with_playtime(6.0)
            .with_rating(55)
            .with_release_year(2019),
        Item::new("gog:1", "Disco Elysium", "gog")
            .with_playtime(70.0)
            .with_rating(97)
            .with_release_year(2019)
            .completed(),
        Item::new("gog:2", "Planescape: Torment", "gog")
            .with_playtime(0.0)
            .with_release_year(1999),
        Item::new("epic:1", "Alan Wake 2", "epic")
            .with_playtime(12.0)
            .with_rating(89)
            .with_release_year(2023)
            .installed(),
    ]
}

// =============================================================================
// Feature 1: Filtering and Counting
// =============================================================================

mod filter_tests {
    use super::*;
    use shelfwise::filter::{compile, count_all, standard_catalog_for_year, FilterCatalog};

    #[test]
    fn test_or_within_and_across_categories() {
        let catalog = standard_catalog_for_year(2024).unwrap();
        let items = library();

        let predicate = compile(&catalog, ["unplayed", "started", "highly-rated"]);
        let ids: Vec<_> = predicate
            .filter(&items)
            .map(|item| item.id.as_str())
            .collect();

        // gog:2 is unplayed but unrated, so it fails the ratings category
        assert_eq!(ids, vec!["steam:1", "steam:2"]);
    }

    #[test]
    fn test_selection_order_and_duplicates_do_not_matter() {
        let catalog = standard_catalog_for_year(2024).unwrap();
        let items = library();

        let a = compile(&catalog, ["installed", "well-rated", "unplayed"]);
        let b = compile(&catalog, ["unplayed", "installed", "unplayed", "well-rated"]);

        assert_eq!(a.selected_ids(), b.selected_ids());
        for item in &items {
            assert_eq!(a.matches(item), b.matches(item));
        }
    }

    #[test]
    fn test_empty_and_unknown_selection_accepts_all() {
        let catalog = standard_catalog_for_year(2024).unwrap();
        let items = library();

        let predicate = compile(&catalog, ["no-such-filter"]);
        assert!(predicate.is_unconstrained());
        assert_eq!(predicate.filter(&items).count(), items.len());
    }

    #[test]
    fn test_counts_ignore_composition() {
        let catalog = standard_catalog_for_year(2024).unwrap();
        let counts = count_all(&catalog, &library());

        assert_eq!(counts.len(), catalog.len());
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.get("unplayed"), Some(2));
        assert_eq!(counts.get("started"), Some(2));
        assert_eq!(counts.get("heavily-played"), Some(1));
        assert_eq!(counts.get("unrated"), Some(1));
        assert_eq!(counts.get("classic"), Some(1));
        assert_eq!(counts.get("installed"), Some(2));
        assert_eq!(counts.get("not-installed"), Some(4));
    }

    #[test]
    fn test_counts_over_empty_set() {
        let catalog = standard_catalog_for_year(2024).unwrap();
        let counts = count_all(&catalog, &[]);

        assert_eq!(counts.len(), catalog.len());
        assert!(counts.iter().all(|(_, n)| n == 0));
    }

    #[test]
    fn test_failing_predicate_is_a_non_match() {
        let mut builder = FilterCatalog::builder();
        builder
            .register("fragile", "custom", "Fragile", |item: &Item| {
                item.rating
                    .map(|r| r > 60)
                    .ok_or_else(|| shelfwise::filter::PredicateError::new("no rating"))
            })
            .unwrap();
        let catalog = builder.build();
        let items = library();

        let predicate = compile(&catalog, ["fragile"]);
        assert_eq!(predicate.filter(&items).count(), 4);

        let counts = count_all(&catalog, &items);
        assert_eq!(counts.get("fragile"), Some(4));
        assert_eq!(counts.failures("fragile"), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = FilterCatalog::builder();
        builder
            .register("a", "x", "A", |_: &Item| Ok(true))
            .unwrap();
        let err = builder.register("a", "y", "A again", |_: &Item| Ok(false));
        assert!(matches!(err, Err(Error::DuplicateFilterId(id)) if id == "a"));
    }
}

// =============================================================================
// Feature 2: Two-Tier Caching
// =============================================================================

mod cache_tests {
    use super::*;
    use shelfwise::cache::{
        CacheConfig, CacheOrchestrator, InMemoryTier2Backend, Source, Tier1Config,
        WorkingSetKey,
    };
    use shelfwise::origin::{OriginConfig, OriginFetcher, PopularityReport};

    fn setup(
        config: CacheConfig,
        source: FakePopularity,
    ) -> (
        Arc<CacheOrchestrator<PopularityReport>>,
        Arc<OriginFetcher<FakePopularity>>,
        Arc<FakePopularity>,
        Arc<InMemoryTier2Backend>,
    ) {
        let backend = Arc::new(InMemoryTier2Backend::new());
        let cache = Arc::new(CacheOrchestrator::with_config(config, backend.clone()));
        let source = Arc::new(source);
        let fetcher = Arc::new(OriginFetcher::new(source.clone(), OriginConfig::default()));
        (cache, fetcher, source, backend)
    }

    fn ids() -> Vec<ItemId> {
        library().into_iter().map(|item| item.id).collect()
    }

    #[tokio::test]
    async fn test_full_fetch_then_no_network() {
        let (cache, fetcher, source, _) = setup(CacheConfig::default(), FakePopularity::default());
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        let first = cache
            .resolve(&key, || fetcher.fetch_all(&ids))
            .await
            .unwrap();
        assert_eq!(first.source, Source::Origin);
        assert!(first.value.is_complete());
        assert_eq!(first.value.succeeded(), 7);
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);

        let second = cache
            .resolve(&key, || fetcher.fetch_all(&ids))
            .await
            .unwrap();
        assert_eq!(second.source, Source::Tier1);
        assert_eq!(second.value, first.value);
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_tier2_serves_after_tier1_expiry() {
        let config = CacheConfig {
            tier1: Tier1Config {
                ttl: Duration::from_millis(25),
                ..Default::default()
            },
            ..Default::default()
        };
        let (cache, fetcher, source, _) = setup(config, FakePopularity::default());
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let resolved = cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Tier2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);

        let resolved = cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Tier1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_resolves_fetch_once() {
        let (cache, fetcher, source, _) = setup(
            CacheConfig::default(),
            FakePopularity {
                delay: Some(Duration::from_millis(40)),
                ..Default::default()
            },
        );
        let ids = Arc::new(ids());
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        let mut join_set = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            let ids = ids.clone();
            let key = key.clone();
            join_set.spawn(async move {
                cache
                    .resolve(&key, || async move { fetcher.fetch_all(&ids).await })
                    .await
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            reports.push(joined.unwrap().unwrap());
        }

        // One fetch of seven facets, shared by everyone
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
        assert_eq!(
            reports.iter().filter(|r| r.source == Source::Origin).count(),
            1
        );
        assert!(reports.iter().all(|r| r.value == reports[0].value));
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_interleaved_resolves_on_one_task() {
        let (cache, fetcher, source, _) = setup(
            CacheConfig::default(),
            FakePopularity {
                delay: Some(Duration::from_millis(20)),
                ..Default::default()
            },
        );
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        let resolves = (0..8).map(|_| cache.resolve(&key, || fetcher.fetch_all(&ids)));
        let results = futures::future::join_all(resolves).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
        let sources: Vec<_> = results.into_iter().map(|r| r.unwrap().source).collect();
        assert_eq!(sources.iter().filter(|s| **s == Source::Origin).count(), 1);
        assert_eq!(sources.iter().filter(|s| **s == Source::Coalesced).count(), 7);
    }

    #[tokio::test]
    async fn test_outage_serves_stale_then_recovers() {
        let config = CacheConfig {
            tier1: Tier1Config {
                ttl: Duration::ZERO,
                ..Default::default()
            },
            tier2: shelfwise::cache::Tier2Config {
                ttl: Duration::ZERO,
                stale_grace: Duration::from_secs(3600),
            },
            ..Default::default()
        };
        let (cache, fetcher, source, _) = setup(config, FakePopularity::default());
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        source.down.store(true, Ordering::SeqCst);
        let resolved = cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Stale);
        assert!(resolved.value.is_complete());

        source.down.store(false, Ordering::SeqCst);
        let resolved = cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Origin);
    }

    #[tokio::test]
    async fn test_outage_without_history_is_an_error() {
        let (cache, fetcher, _, backend) = setup(
            CacheConfig::default(),
            FakePopularity {
                down: AtomicBool::new(true),
                ..Default::default()
            },
        );
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        let result = cache.resolve(&key, || fetcher.fetch_all(&ids)).await;
        assert!(matches!(result, Err(Error::OriginUnavailable { attempted: 7 })));
        assert!(backend.is_empty());
        assert_eq!(cache.metrics().origin_failures, 1);
    }

    #[tokio::test]
    async fn test_tier2_outage_is_a_miss() {
        let (cache, fetcher, source, backend) =
            setup(CacheConfig::default(), FakePopularity::default());
        backend.set_unavailable(true);
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        let resolved = cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Origin);
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);

        let resolved = cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Tier1);
    }

    #[tokio::test]
    async fn test_membership_change_is_a_new_key() {
        let (cache, fetcher, source, _) = setup(CacheConfig::default(), FakePopularity::default());
        let mut ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));
        cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();

        ids.pop();
        let smaller = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));
        assert_ne!(key, smaller);

        let resolved = cache.resolve(&smaller, || fetcher.fetch_all(&ids)).await.unwrap();
        assert_eq!(resolved.source, Source::Origin);
        assert_eq!(source.calls.load(Ordering::SeqCst), 14);
    }

    #[tokio::test]
    async fn test_metrics_export() {
        let (cache, fetcher, _, _) = setup(CacheConfig::default(), FakePopularity::default());
        let ids = ids();
        let key = WorkingSetKey::from_ids(ids.iter().map(|id| id.as_str()));

        cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();
        cache.resolve(&key, || fetcher.fetch_all(&ids)).await.unwrap();

        let snapshot = cache.metrics();
        assert_eq!(snapshot.origin_fetches, 1);
        assert_eq!(snapshot.tier1_hits, 1);
        assert_eq!(snapshot.tier1_entries, 1);

        let text = snapshot.to_prometheus().unwrap();
        assert!(text.contains("shelfwise_cache_origin_fetches 1"));
    }
}

// =============================================================================
// Feature 3: Library Pipeline with a Durable Cache
// =============================================================================

mod library_tests {
    use super::*;
    use shelfwise::cache::{CacheConfig, CacheOrchestrator, FileTier2Backend, Source};
    use shelfwise::domain::{BaseQuery, InMemoryItemStore};
    use shelfwise::filter::standard_catalog_for_year;
    use shelfwise::library::{LibraryQuery, LibraryService};
    use shelfwise::origin::{OriginConfig, OriginFetcher};

    fn service(
        cache_dir: &std::path::Path,
        source: Arc<FakePopularity>,
    ) -> LibraryService<FakePopularity> {
        let catalog = Arc::new(standard_catalog_for_year(2024).unwrap());
        let backend = Arc::new(FileTier2Backend::new(cache_dir));
        let cache = Arc::new(CacheOrchestrator::with_config(CacheConfig::default(), backend));
        let fetcher = Arc::new(OriginFetcher::new(source, OriginConfig::default()));
        LibraryService::new(catalog, cache, fetcher)
    }

    #[tokio::test]
    async fn test_durable_tier_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryItemStore::new(library());
        let query = LibraryQuery::new(BaseQuery::default().with_store("steam"))
            .with_filter("highly-rated");

        let source = Arc::new(FakePopularity::default());
        let first = service(dir.path(), source.clone()).query(&store, &query).await;
        assert_eq!(first.working_set.len(), 2);
        assert_eq!(first.popularity.as_ref().unwrap().source, Source::Origin);
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);

        // A fresh process: empty Tier1, same directory
        let restarted = service(dir.path(), source.clone()).query(&store, &query).await;
        assert_eq!(restarted.key, first.key);
        assert_eq!(restarted.popularity.as_ref().unwrap().source, Source::Tier2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
        assert_eq!(
            restarted.popularity.unwrap().value,
            first.popularity.unwrap().value
        );
    }

    #[tokio::test]
    async fn test_view_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryItemStore::new(library());
        let query = LibraryQuery::default()
            .with_filter("installed")
            .with_filter("unplayed");

        let view = service(dir.path(), Arc::new(FakePopularity::default()))
            .query(&store, &query)
            .await;

        let json: serde_json::Value = serde_json::to_value(view.summary()).unwrap();
        assert_eq!(json["items"], serde_json::json!(["steam:1"]));
        assert_eq!(json["total"], 1);
        assert_eq!(json["counts"]["counts"]["installed"], 2);
        assert_eq!(json["popularity"]["source"], "origin");
        assert!(json["popularity"]["value"]["facets"]["most-played"].is_array());
    }
}
