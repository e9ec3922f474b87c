/// Unified error handling module
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced by backend clients and the aggregation proxy.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend base URL failed to parse at construction time.
    #[error("error parsing url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Downtime request rejected before any network call.
    #[error("invalid downtime: {0}")]
    InvalidDowntime(String),

    /// Connection-level failure talking to a backend.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Top-level response body was not parseable; carries the raw body.
    #[error("error decoding json: {source} | {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// A downtime call went through but matched nothing. The backend treats
    /// that as success; we do not.
    #[error("error while setting downtime for filter [{filter}]: zero objects returned: [{body}]")]
    NoObjectsMatched { filter: String, body: String },

    #[error("internal error: {0}")]
    Internal(String),

    /// Every configured backend failed; the map holds each backend's error
    /// under its logical name.
    #[error("all backends failed: {0:?}")]
    AllBackendsFailed(HashMap<String, Error>),
}

/// Type alias for results across the crate
pub type Result<T> = std::result::Result<T, Error>;
