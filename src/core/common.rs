use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use clap::ValueEnum;
use serde_derive::{Deserialize, Serialize};

use crate::core::error::OptionsError;
use crate::core::konst::{
    CURRENT_DIR, FALLBACK_RESOLVERS, LOGFILE_NAME, LOGGING_JSON, LOGGING_QUIET, RESOLVE_CONCURRENCY, RESOLVE_DELAY,
    RESOLVE_DELAY_JITTER, RESOLVE_TIMEOUT,
};
use crate::dns::resolvers::fetch_default_resolvers;
use crate::util::parser::parse_resolver;

#[derive(ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    #[default]
    Udp,
}

impl Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Settings for one resolution round. Read-only once a `Runner` is built.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Max host resolutions in flight at once.
    pub concurrency: usize,
    /// Per-query timeout in seconds.
    pub timeout: u64,
    /// Base delay between dispatches in milliseconds.
    pub delay: u64,
    /// Width of the random jitter added to `delay` in milliseconds.
    pub delay_jitter: u64,
    pub resolvers: Vec<String>,
    pub transport: Transport,
    pub verbose: bool,
    pub log_level: LogLevel,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            concurrency: RESOLVE_CONCURRENCY,
            timeout: RESOLVE_TIMEOUT,
            delay: RESOLVE_DELAY,
            delay_jitter: RESOLVE_DELAY_JITTER,
            resolvers: FALLBACK_RESOLVERS.iter().map(|r| r.to_string()).collect(),
            transport: Transport::default(),
            verbose: false,
            log_level: LogLevel::default(),
        }
    }
}

impl ResolveOptions {
    /// Default options with the resolver list fetched from the trusted
    /// public list. Falls back to the hardcoded resolvers on any failure.
    pub async fn discover() -> Self {
        Self {
            resolvers: fetch_default_resolvers().await,
            ..Default::default()
        }
    }

    /// The level logging should run at. `verbose` always wins.
    pub fn effective_log_level(&self) -> LogLevel {
        match self.verbose {
            true => LogLevel::Debug,
            false => self.log_level,
        }
    }

    /// Check the options and parse the resolver list into socket addresses.
    pub fn validate(&self) -> Result<Vec<SocketAddr>, OptionsError> {
        if self.concurrency == 0 {
            return Err(OptionsError::ZeroConcurrency);
        }
        if self.timeout == 0 {
            return Err(OptionsError::ZeroTimeout);
        }
        self.resolvers.iter().map(|r| parse_resolver(r)).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingOptions {
    pub dir: String,
    pub file: String,
    pub json: bool,
    pub quiet: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            dir: CURRENT_DIR.to_owned(),
            file: LOGFILE_NAME.to_owned(),
            json: LOGGING_JSON,
            quiet: LOGGING_QUIET,
        }
    }
}

/// Outcome of resolving one hostname.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolveResult {
    pub target_domain: String,
    pub ipv4_addresses: Vec<Ipv4Addr>,
    pub ipv6_addresses: Vec<Ipv6Addr>,
    pub resolved_by: Option<SocketAddr>,
}

impl ResolveResult {
    /// A result with no addresses and no attribution.
    pub fn empty(target_domain: &str) -> Self {
        Self {
            target_domain: target_domain.to_owned(),
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_by.is_some()
    }
}
