//! Origin Fetcher
//!
//! Splits one popularity lookup into a sub-query per facet and runs them with
//! bounded parallelism. Individual failures degrade the report instead of
//! failing it; only a lookup where every facet fails is an error.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::report::{Facet, FacetRanking, PopularityReport};
use super::source::PopularitySource;
use crate::domain::ItemId;
use crate::error::{Error, Result};

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct OriginConfig {
    /// Popularity service base URL
    pub base_url: String,
    /// Maximum facet sub-queries in flight
    pub workers: usize,
    /// Bound on each remote call
    pub call_timeout: Duration,
    /// Bound on the whole lookup; stragglers count as failed
    pub deadline: Duration,
    /// Identifiers per remote call
    pub batch_size: usize,
    /// Facets to request
    pub facets: Vec<Facet>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            workers: 4,
            call_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(25),
            batch_size: 100,
            facets: Facet::ALL.to_vec(),
        }
    }
}

/// Bounded-parallel popularity fetcher
pub struct OriginFetcher<S> {
    source: Arc<S>,
    config: OriginConfig,
    semaphore: Arc<Semaphore>,
}

impl<S: PopularitySource + 'static> OriginFetcher<S> {
    pub fn new(source: Arc<S>, config: OriginConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
        Self {
            source,
            config,
            semaphore,
        }
    }

    pub fn config(&self) -> &OriginConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Fetch every configured facet for `ids`
    #[instrument(skip(self, ids), fields(items = ids.len()))]
    pub async fn fetch_all(&self, ids: &[ItemId]) -> Result<PopularityReport> {
        if ids.is_empty() || self.config.facets.is_empty() {
            debug!("Nothing to rank");
            return Ok(PopularityReport::new(ids.len()));
        }

        let ids: Arc<[ItemId]> = ids.into();
        let mut pending: BTreeSet<Facet> = self.config.facets.iter().copied().collect();
        let attempted = pending.len();

        let mut tasks = JoinSet::new();
        for &facet in &pending {
            let source = self.source.clone();
            let semaphore = self.semaphore.clone();
            let ids = ids.clone();
            let batch_size = self.config.batch_size.max(1);
            let call_timeout = self.config.call_timeout;

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        fetch_facet(source.as_ref(), facet, &ids, batch_size, call_timeout).await
                    }
                    Err(e) => Err(Error::Internal(format!(
                        "Failed to acquire origin permit: {}",
                        e
                    ))),
                };
                (facet, result)
            });
        }

        let mut report = PopularityReport::new(ids.len());
        let deadline = tokio::time::Instant::now() + self.config.deadline;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((facet, Ok(ranking))))) => {
                    pending.remove(&facet);
                    debug!(%facet, ranked = ranking.len(), "Facet complete");
                    report.facets.insert(facet, ranking);
                }
                Ok(Some(Ok((facet, Err(e))))) => {
                    pending.remove(&facet);
                    warn!(%facet, error = %e, "Facet sub-query failed");
                    report.failed.push(facet);
                }
                Ok(Some(Err(e))) => {
                    // The facet stays pending and is reported as failed below
                    warn!(error = %e, "Facet task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = pending.len(),
                        deadline_ms = self.config.deadline.as_millis() as u64,
                        "Origin deadline reached, abandoning outstanding facets"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        report.failed.extend(pending);
        report.failed.sort();
        report.failed.dedup();

        if report.facets.is_empty() {
            return Err(Error::OriginUnavailable { attempted });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed.len(),
            "Popularity fetch complete"
        );
        Ok(report)
    }
}

/// One facet: batches run in order, each bounded by `call_timeout`
async fn fetch_facet<S: PopularitySource + ?Sized>(
    source: &S,
    facet: Facet,
    ids: &[ItemId],
    batch_size: usize,
    call_timeout: Duration,
) -> Result<FacetRanking> {
    let mut batches = Vec::with_capacity(ids.len().div_ceil(batch_size));

    for chunk in ids.chunks(batch_size) {
        let ranked = tokio::time::timeout(call_timeout, source.fetch_rankings(facet, chunk))
            .await
            .map_err(|_| Error::OriginTimeout {
                facet: facet.to_string(),
                timeout: call_timeout,
            })??;
        batches.push(ranked);
    }

    Ok(FacetRanking::merge(batches))
}

// =============================================================================
// Tests
// =============================================================================
