//! Error types for the sync system
//!
//! This module defines all error types used throughout the crate.
//!
//! Only [`Error::Config`] (and store construction failures surfaced at
//! startup) are meant to stop the process. Everything else is caught at the
//! scheduler's per-unit boundary, logged, and retried on the next tick.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the sync system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (startup-fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint source failed to list a service
    #[error("Discovery error for service {service}: {message}")]
    Discovery {
        /// Service being listed
        service: String,
        /// Error message
        message: String,
    },

    /// Record store failed to list or mutate records
    #[error("Store error in zone {zone}: {message}")]
    Store {
        /// Zone the operation targeted
        zone: String,
        /// Error message
        message: String,
    },

    /// An adapter call exceeded the configured timeout
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Configured bound
        after: Duration,
    },

    /// Zone or service not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a discovery error for `service`
    pub fn discovery(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Discovery {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Create a store error for `zone`
    pub fn store(zone: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Store {
            zone: zone.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether retrying on the next tick is likely to help
    ///
    /// Used to pick log levels; control flow never depends on it since every
    /// tick retries everything anyway.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::RateLimited(_)
                | Self::Http(_)
                | Self::Discovery { .. }
                | Self::Store { .. }
        )
    }
}
