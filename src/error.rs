//! Error types for Shelfwise

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while filtering a library or resolving derived data
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Filter Errors
    // =========================================================================
    /// A filter id was registered twice
    #[error("Duplicate filter id: {0}")]
    DuplicateFilterId(String),

    /// A predicate could not evaluate an item
    #[error("Predicate {filter_id} failed on item {item_id}: {reason}")]
    Predicate {
        filter_id: String,
        item_id: String,
        reason: String,
    },

    // =========================================================================
    // Origin Errors
    // =========================================================================
    /// Popularity service connection error
    #[error("Popularity service connection error: {0}")]
    OriginConnection(#[source] reqwest::Error),

    /// Popularity service query error
    #[error("Popularity service query error: {0}")]
    OriginQuery(String),

    /// Popularity service response parse error
    #[error("Failed to parse popularity service response: {0}")]
    OriginResponseParse(String),

    /// Popularity service rejected the request due to rate limiting
    #[error("Rate limited by popularity service (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// A single origin call exceeded its timeout
    #[error("Origin call for {facet} timed out after {timeout:?}")]
    OriginTimeout { facet: String, timeout: Duration },

    /// Every origin sub-query failed
    #[error("Popularity service unavailable: all {attempted} sub-queries failed")]
    OriginUnavailable { attempted: usize },

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// The whole resolution exceeded its deadline
    #[error("Resolution of key {key} timed out after {timeout:?}")]
    ResolveTimeout { key: String, timeout: Duration },

    /// A fetch this caller joined failed in the caller that led it
    #[error("Shared fetch failed: {0}")]
    Coalesced(String),

    /// Not a well-formed working-set key
    #[error("Invalid working-set key: {0:?}")]
    InvalidKey(String),

    /// Durable tier could not be reached
    #[error("Tier2 store unavailable: {0}")]
    Tier2Unavailable(String),

    /// Payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // General Errors
    // =========================================================================
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error came from the remote popularity service
    pub fn is_origin(&self) -> bool {
        matches!(
            self,
            Error::OriginConnection(_)
                | Error::OriginQuery(_)
                | Error::OriginResponseParse(_)
                | Error::RateLimited { .. }
                | Error::OriginTimeout { .. }
                | Error::OriginUnavailable { .. }
        )
    }
}
