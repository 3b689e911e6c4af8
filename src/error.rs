use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting `{0}` is not configured")]
    Missing(&'static str),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// No usable snapshot: the file is missing, empty or unparseable.
    #[error("no stored snapshot yet")]
    NotInitialized,
    #[error("failed accessing state file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed encoding snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("portal rejected the credentials (HTTP {status})")]
    Authentication { status: u16 },
    #[error("portal returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("page did not load within {0}s")]
    Timeout(u64),
    #[error("failed reading page {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected page structure: {0}")]
    UnexpectedStructure(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("relay answered HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetching the marks page failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("reading stored snapshot failed: {0}")]
    Load(#[source] StoreError),
    #[error("persisting snapshot failed, next cycle may repeat notifications: {0}")]
    Persist(#[source] StoreError),
}
