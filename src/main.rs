//! Shelfwise CLI
//!
//! Runs one library query and prints the resulting view as JSON.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          shelfwise                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Library    │───▶│   Filters    │───▶│    Cache     │──▶ popularity
//! │  │   (JSON)     │    │   + counts   │    │  Tier1/Tier2 │    service
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shelfwise::cache::{
    CacheConfig, CacheOrchestrator, FileTier2Backend, InMemoryTier2Backend, Tier1Config,
    Tier2Backend, Tier2Config,
};
use shelfwise::domain::{BaseQuery, InMemoryItemStore, ItemStore};
use shelfwise::error::{Error, Result};
use shelfwise::filter::standard_catalog;
use shelfwise::library::{LibraryQuery, LibraryService};
use shelfwise::origin::{HttpPopularitySource, OriginConfig, OriginFetcher, PopularityReport};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Shelfwise - filtered library views with cached popularity rankings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Library file (JSON array of items)
    #[arg(long, env = "SHELFWISE_LIBRARY", required_unless_present = "list_filters")]
    library: Option<PathBuf>,

    /// Filter id to apply (repeatable)
    #[arg(long = "filter", value_name = "ID")]
    filters: Vec<String>,

    /// Restrict to one storefront
    #[arg(long)]
    store: Option<String>,

    /// Restrict to one genre
    #[arg(long)]
    genre: Option<String>,

    /// Title substring
    #[arg(long)]
    search: Option<String>,

    /// Popularity service URL (omit to skip popularity lookups)
    #[arg(long, env = "POPULARITY_URL")]
    popularity_url: Option<String>,

    /// Directory for the durable cache tier (in-memory when omitted)
    #[arg(long, env = "SHELFWISE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Tier1 TTL in seconds
    #[arg(long, env = "TIER1_TTL_SECS", default_value = "300")]
    tier1_ttl_secs: u64,

    /// Tier2 TTL in seconds
    #[arg(long, env = "TIER2_TTL_SECS", default_value = "86400")]
    tier2_ttl_secs: u64,

    /// Maximum concurrent popularity sub-queries
    #[arg(long, env = "POPULARITY_WORKERS", default_value = "4")]
    workers: usize,

    /// Timeout for each popularity call in seconds
    #[arg(long, env = "CALL_TIMEOUT_SECS", default_value = "10")]
    call_timeout_secs: u64,

    /// Hard cap on one popularity resolution in seconds
    #[arg(long, env = "RESOLVE_TIMEOUT_SECS", default_value = "30")]
    resolve_timeout_secs: u64,

    /// Print the filter catalog and exit
    #[arg(long)]
    list_filters: bool,

    /// Print cache metrics (Prometheus text format) after the view
    #[arg(long)]
    print_metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn cache_config(&self) -> CacheConfig {
        let resolve_timeout = Duration::from_secs(self.resolve_timeout_secs);
        CacheConfig {
            tier1: Tier1Config {
                ttl: Duration::from_secs(self.tier1_ttl_secs),
                ..Default::default()
            },
            tier2: Tier2Config {
                ttl: Duration::from_secs(self.tier2_ttl_secs),
                ..Default::default()
            },
            resolve_timeout,
            ..Default::default()
        }
    }

    fn origin_config(&self, base_url: &str) -> OriginConfig {
        let resolve_timeout = Duration::from_secs(self.resolve_timeout_secs);
        OriginConfig {
            base_url: base_url.to_string(),
            workers: self.workers,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            // Leave the fetcher room to return a partial report before the
            // orchestrator's hard cap fires
            deadline: resolve_timeout.mul_f64(0.8),
            ..Default::default()
        }
    }

    fn base_query(&self) -> BaseQuery {
        BaseQuery {
            store: self.store.clone(),
            genre: self.genre.clone(),
            search: self.search.clone(),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let catalog = Arc::new(standard_catalog()?);

    let backend: Arc<dyn Tier2Backend> = match &args.cache_dir {
        Some(dir) => {
            info!("Durable cache directory: {}", dir.display());
            Arc::new(FileTier2Backend::new(dir))
        }
        None => Arc::new(InMemoryTier2Backend::new()),
    };
    let cache: Arc<CacheOrchestrator<PopularityReport>> =
        Arc::new(CacheOrchestrator::with_config(args.cache_config(), backend));

    let service: LibraryService<HttpPopularitySource> = match &args.popularity_url {
        Some(url) => {
            let config = args.origin_config(url);
            let source = HttpPopularitySource::new(url.as_str(), config.call_timeout)?;
            if let Err(e) = source.health_check().await {
                warn!("Popularity service health check failed: {}", e);
                warn!("Continuing anyway - rankings may not be available");
            } else {
                info!("Popularity service healthy");
            }
            let fetcher = Arc::new(OriginFetcher::new(Arc::new(source), config));
            LibraryService::new(catalog, cache.clone(), fetcher)
        }
        None => LibraryService::offline(catalog, cache.clone()),
    };

    if args.list_filters {
        println!("{}", serde_json::to_string_pretty(&service.list_filters())?);
        return Ok(());
    }

    let path = args
        .library
        .as_ref()
        .ok_or_else(|| Error::Config("--library is required".into()))?;
    let store = InMemoryItemStore::from_json_file(path)?;
    info!("Loaded library: {} ({} items)", path.display(), store.len());

    let mut query = LibraryQuery::new(args.base_query());
    query.filters = args.filters.clone();

    let view = service.query(&store, &query).await;
    println!("{}", serde_json::to_string_pretty(&view.summary())?);

    if args.print_metrics {
        print!("{}", cache.metrics().to_prometheus()?);
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so stdout stays valid JSON
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
