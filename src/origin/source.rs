//! Popularity Source
//!
//! The seam to the third-party catalog-popularity service, plus the HTTP
//! implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::report::{Facet, RankedItem};
use crate::domain::ItemId;
use crate::error::{Error, Result};

/// Ranks one batch of items for one facet
#[async_trait]
pub trait PopularitySource: Send + Sync {
    async fn fetch_rankings(&self, facet: Facet, ids: &[ItemId]) -> Result<Vec<RankedItem>>;
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct RankingRequest<'a> {
    ids: &'a [ItemId],
}

#[derive(Debug, Deserialize)]
struct RankingResponse {
    status: String,
    #[serde(default)]
    data: Option<RankingData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankingData {
    rankings: Vec<RankedItem>,
}

/// Decode a ranking response body
pub(crate) fn parse_rankings(body: &[u8]) -> Result<Vec<RankedItem>> {
    let response: RankingResponse =
        serde_json::from_slice(body).map_err(|e| Error::OriginResponseParse(e.to_string()))?;

    if response.status != "success" {
        return Err(Error::OriginQuery(format!(
            "Popularity service returned status: {}{}",
            response.status,
            response
                .error
                .map(|e| format!(" ({})", e))
                .unwrap_or_default()
        )));
    }

    let data = response
        .data
        .ok_or_else(|| Error::OriginResponseParse("missing data".into()))?;

    if let Some(bad) = data.rankings.iter().find(|r| !r.score.is_finite()) {
        return Err(Error::OriginResponseParse(format!(
            "non-finite score for {}",
            bad.id
        )));
    }

    Ok(data.rankings)
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

// =============================================================================
// HTTP Source
// =============================================================================

/// Popularity service over HTTP
pub struct HttpPopularitySource {
    base_url: String,
    client: Client,
    healthy: RwLock<bool>,
}

impl HttpPopularitySource {
    /// `request_timeout` is a transport-level backstop; the fetcher applies
    /// its own per-call timeout on top.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            healthy: RwLock::new(true),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rankings_url(&self, facet: Facet) -> String {
        format!(
            "{}/v1/rankings/{}",
            self.base_url,
            urlencoding::encode(facet.as_str())
        )
    }

    /// Check if the popularity service is reachable
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/healthz", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            *self.healthy.write() = false;
            Error::OriginConnection(e)
        })?;

        if response.status().is_success() {
            *self.healthy.write() = true;
            Ok(())
        } else {
            *self.healthy.write() = false;
            Err(Error::OriginQuery(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }

    /// Outcome of the last health check or request
    pub fn is_healthy(&self) -> bool {
        *self.healthy.read()
    }
}

#[async_trait]
impl PopularitySource for HttpPopularitySource {
    #[instrument(skip(self, ids), fields(facet = %facet, batch = ids.len()))]
    async fn fetch_rankings(&self, facet: Facet, ids: &[ItemId]) -> Result<Vec<RankedItem>> {
        let url = self.rankings_url(facet);
        debug!("Querying popularity service: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&RankingRequest { ids })
            .send()
            .await
            .map_err(|e| {
                *self.healthy.write() = false;
                Error::OriginConnection(e)
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after: retry_after(&response),
            });
        }
        if !status.is_success() {
            return Err(Error::OriginQuery(format!(
                "Query failed with status: {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(Error::OriginConnection)?;
        *self.healthy.write() = true;
        parse_rankings(&body)
    }
}

// =============================================================================
// Tests
// =============================================================================
