//! Popularity report - the derived dataset cached per working set

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CachePayload;
use crate::domain::ItemId;
use crate::error::{Error, Result};

/// One ranking sub-query against the popularity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Facet {
    MostPlayed,
    Trending,
    TopRated,
    MostWishlisted,
    PeakPlayers,
    TopSellers,
    HiddenGems,
}

impl Facet {
    pub const ALL: [Facet; 7] = [
        Facet::MostPlayed,
        Facet::Trending,
        Facet::TopRated,
        Facet::MostWishlisted,
        Facet::PeakPlayers,
        Facet::TopSellers,
        Facet::HiddenGems,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::MostPlayed => "most-played",
            Facet::Trending => "trending",
            Facet::TopRated => "top-rated",
            Facet::MostWishlisted => "most-wishlisted",
            Facet::PeakPlayers => "peak-players",
            Facet::TopSellers => "top-sellers",
            Facet::HiddenGems => "hidden-gems",
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Facet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Facet::ALL
            .into_iter()
            .find(|facet| facet.as_str() == s)
            .ok_or_else(|| Error::Config(format!("Unknown facet: {}", s)))
    }
}

/// Position of one item within a facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: ItemId,
    pub rank: u32,
    pub score: f64,
}

/// Ordered ranking for one facet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetRanking(Vec<RankedItem>);

impl FacetRanking {
    /// Combine per-batch answers into one ranking.
    ///
    /// Ordered by score (highest first), then by the service's rank, then by
    /// id; ranks are reassigned over the merged list.
    pub fn merge(batches: impl IntoIterator<Item = Vec<RankedItem>>) -> Self {
        let mut items: Vec<RankedItem> = batches.into_iter().flatten().collect();
        items.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.rank.cmp(&b.rank))
                .then_with(|| a.id.cmp(&b.id))
        });
        for (position, item) in items.iter_mut().enumerate() {
            item.rank = position as u32 + 1;
        }
        Self(items)
    }

    pub fn items(&self) -> &[RankedItem] {
        &self.0
    }

    pub fn rank_of(&self, id: &ItemId) -> Option<u32> {
        self.0.iter().find(|item| &item.id == id).map(|item| item.rank)
    }

    pub fn top(&self, n: usize) -> &[RankedItem] {
        &self.0[..self.0.len().min(n)]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rankings for a working set across every requested facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityReport {
    pub facets: BTreeMap<Facet, FacetRanking>,
    /// Facets whose sub-query failed or was cut off
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<Facet>,
    pub requested_items: usize,
    pub fetched_at: DateTime<Utc>,
}

impl PopularityReport {
    pub fn new(requested_items: usize) -> Self {
        Self {
            facets: BTreeMap::new(),
            failed: Vec::new(),
            requested_items,
            fetched_at: Utc::now(),
        }
    }

    /// No facet failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn ranking(&self, facet: Facet) -> Option<&FacetRanking> {
        self.facets.get(&facet)
    }

    pub fn succeeded(&self) -> usize {
        self.facets.len()
    }
}

impl CachePayload for PopularityReport {
    fn is_complete(&self) -> bool {
        PopularityReport::is_complete(self)
    }
}
