use std::time::Duration;

use thiserror::Error;

/// Hostname rejected before any resolver is contacted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("hostname is empty")]
    Empty,
    #[error("hostname `{0}` exceeds 253 characters")]
    TooLong(String),
    #[error("hostname `{0}` contains an empty label")]
    EmptyLabel(String),
    #[error("hostname `{0}` has a label longer than 63 characters")]
    LabelTooLong(String),
    #[error("hostname `{0}` has a label starting or ending with a hyphen")]
    HyphenEdge(String),
    #[error("hostname `{0}` contains invalid character `{1}`")]
    InvalidChar(String, char),
}

/// A single (resolver, record type) attempt failed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query to {resolver} timed out after {timeout:?}")]
    Timeout { resolver: String, timeout: Duration },
    #[error("query to {resolver} failed: {reason}")]
    Transport { resolver: String, reason: String },
    #[error("{resolver} answered {rcode}")]
    Rejected { resolver: String, rcode: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("timeout must be at least 1 second")]
    ZeroTimeout,
    #[error("resolver address `{0}` is invalid")]
    InvalidResolver(String),
}
