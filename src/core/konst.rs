pub const APP_NAME: &str = "dnskraken";
pub const CLI_HEADER_MSG: &str = "DNSKraken - Bulk DNS resolution against a pool of resolvers";

pub const CONFIG_FILE: &str = "dk.toml";
pub const CURRENT_DIR: &str = ".";
pub const LOGFILE_NAME: &str = "dk.log";
pub const LOG_ENV_VAR: &str = "DK_LOG";

pub const DNS_PORT: u16 = 53;

pub const RESOLVE_CONCURRENCY: usize = 10;
pub const RESOLVE_TIMEOUT: u64 = 5;
pub const RESOLVE_DELAY: u64 = 0;
pub const RESOLVE_DELAY_JITTER: u64 = 0;

/// Time a streaming worker keeps its slot after handing off a result (ms).
pub const STREAM_SETTLE_MS: u64 = 100;

pub const LOGGING_JSON: bool = false;
pub const LOGGING_QUIET: bool = false;

pub const FALLBACK_RESOLVERS: [&str; 4] = ["8.8.8.8", "8.8.4.4", "208.67.222.222", "208.67.220.220"];
pub const TRUSTED_RESOLVERS_URL: &str = "https://raw.githubusercontent.com/trickest/resolvers/main/resolvers-trusted.txt";
pub const RESOLVER_FETCH_TIMEOUT: u64 = 10;

pub const MAX_HOSTNAME_LEN: usize = 253;
pub const MAX_LABEL_LEN: usize = 63;
