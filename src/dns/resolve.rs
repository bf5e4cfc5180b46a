use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::proto::rr::{RData, RecordType};
use tracing::debug;

use crate::core::common::{ResolveResult, Transport};
use crate::core::error::{HostError, QueryError};
use crate::dns::executor::QueryExecutor;
use crate::util::validate::{normalize_host, validate_hostname};

/// Resolves a single hostname by walking the resolver list in order.
///
/// A resolver only counts when it answers both the A and the AAAA query.
/// Answers are never combined across resolvers.
#[derive(Clone)]
pub struct HostResolver {
    executor: Arc<dyn QueryExecutor>,
    resolvers: Arc<[SocketAddr]>,
    transport: Transport,
    timeout: Duration,
}

impl HostResolver {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        resolvers: Arc<[SocketAddr]>,
        transport: Transport,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            resolvers,
            transport,
            timeout,
        }
    }

    /// Resolve `host`. Invalid hosts and exhausted resolvers give an
    /// empty result.
    pub async fn resolve(&self, host: &str) -> ResolveResult {
        self.resolve_name(&normalize_host(host)).await
    }

    /// Like `resolve`, but reports a malformed hostname as an error.
    pub async fn try_resolve(&self, host: &str) -> Result<ResolveResult, HostError> {
        self.try_resolve_name(&normalize_host(host)).await
    }

    /// Resolve a name that already went through `normalize_host`.
    pub(crate) async fn resolve_name(&self, host: &str) -> ResolveResult {
        match self.try_resolve_name(host).await {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "skipping invalid host");
                ResolveResult::empty(host)
            }
        }
    }

    async fn try_resolve_name(&self, host: &str) -> Result<ResolveResult, HostError> {
        validate_hostname(host)?;
        debug!(%host, "resolving");

        for (position, resolver) in self.resolvers.iter().enumerate() {
            match self.resolve_with(host, *resolver).await {
                Ok(result) => {
                    debug!(
                        %host,
                        %resolver,
                        ipv4 = result.ipv4_addresses.len(),
                        ipv6 = result.ipv6_addresses.len(),
                        "resolved"
                    );
                    return Ok(result);
                }
                Err(e) => debug!(%host, error = %e, position, "failing over"),
            }
        }

        debug!(%host, resolvers = self.resolvers.len(), "all resolvers failed");
        Ok(ResolveResult::empty(host))
    }

    async fn resolve_with(&self, host: &str, resolver: SocketAddr) -> Result<ResolveResult, QueryError> {
        let v4 = self
            .executor
            .query(host, RecordType::A, resolver, self.transport, self.timeout)
            .await?;
        let v6 = self
            .executor
            .query(host, RecordType::AAAA, resolver, self.transport, self.timeout)
            .await?;

        Ok(ResolveResult {
            target_domain: host.to_owned(),
            ipv4_addresses: v4
                .iter()
                .filter_map(|r| match r {
                    RData::A(a) => Some(a.0),
                    _ => None,
                })
                .collect(),
            ipv6_addresses: v6
                .iter()
                .filter_map(|r| match r {
                    RData::AAAA(aaaa) => Some(aaaa.0),
                    _ => None,
                })
                .collect(),
            resolved_by: Some(resolver),
        })
    }
}
