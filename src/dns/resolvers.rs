use std::time::Duration;

use anyhow::{Result, bail};
use reqwest::Client;
use tracing::{debug, warn};

use crate::core::konst::{FALLBACK_RESOLVERS, RESOLVER_FETCH_TIMEOUT, TRUSTED_RESOLVERS_URL};
use crate::util::parser::parse_resolver_list;

/// Download the trusted public resolver list.
pub async fn fetch_trusted_resolvers(url: &str) -> Result<Vec<String>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(RESOLVER_FETCH_TIMEOUT))
        .build()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        bail!("resolver list request failed with status: {status}");
    }

    let resolvers = parse_resolver_list(&response.text().await?);
    if resolvers.is_empty() {
        bail!("resolver list at `{url}` is empty");
    }
    Ok(resolvers)
}

pub fn fallback_resolvers() -> Vec<String> {
    FALLBACK_RESOLVERS.iter().map(|r| r.to_string()).collect()
}

/// Trusted resolvers, or the hardcoded fallback list when they cannot be
/// fetched. Never fails.
pub async fn fetch_default_resolvers() -> Vec<String> {
    match fetch_trusted_resolvers(TRUSTED_RESOLVERS_URL).await {
        Ok(resolvers) => {
            debug!(count = resolvers.len(), "using trusted resolvers");
            resolvers
        }
        Err(e) => {
            warn!(error = %e, "could not fetch trusted resolvers, using fallback");
            fallback_resolvers()
        }
    }
}
