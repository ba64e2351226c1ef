//! Error types.
//!
//! One enum per collaborator, plus [`RunError`] which is what a run as a
//! whole fails with.  The binary wraps these in `anyhow` at the top level.

use std::path::PathBuf;

use thiserror::Error;

/// Fetching or normalising a feed failed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Transport-level failure (DNS, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The document is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The document has an `<rss>` root but the channel could not be read.
    #[error("RSS parse error: {0}")]
    Rss(#[from] rss::Error),

    /// The root element is neither `<feed>` nor `<rss>`.
    #[error("unsupported feed format: root element <{0}>")]
    UnsupportedFormat(String),
}

/// The translation service failed.
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translator answered HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The service answered but the payload carried no translation.
    #[error("translator returned no text: {0}")]
    EmptyResponse(String),
}

/// Posting a message to one destination failed.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("HTTP error posting to {destination}: {source}")]
    Http {
        destination: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} posting to {destination}")]
    Status {
        destination: String,
        status: reqwest::StatusCode,
    },
}

/// Reading or appending to the acquired-id store failed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("acquired-id store {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loading the configuration document failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// `abort` was set to something other than `no`, `yes`, or `immediately`.
    #[error("invalid abort policy {0:?}: expected \"no\", \"yes\" or \"immediately\"")]
    InvalidAbortPolicy(String),
}

/// A run failed.
///
/// Under the `immediately` abort policy the first collaborator failure is
/// returned as-is; under `yes` the run ends with [`RunError::Aborted`]
/// carrying every message collected along the way.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FeedError,
    },

    #[error("failed to translate {id}: {source}")]
    Translation {
        id: String,
        #[source]
        source: TranslationError,
    },

    #[error("failed to deliver {id}: {source}")]
    Delivery {
        id: String,
        #[source]
        source: DeliveryError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("run finished with errors:\n{0}")]
    Aborted(String),
}
