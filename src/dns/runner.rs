use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::core::common::{ResolveOptions, ResolveResult};
use crate::core::error::OptionsError;
use crate::core::konst::{APP_NAME, STREAM_SETTLE_MS};
use crate::dns::executor::{HickoryExecutor, QueryExecutor};
use crate::dns::pacing::next_delay;
use crate::dns::resolve::HostResolver;
use crate::util::validate::normalize_host;

/// Where finished results go.
enum Delivery {
    Collect,
    Stream(mpsc::Sender<ResolveResult>),
}

impl Delivery {
    fn sender(&self) -> Option<mpsc::Sender<ResolveResult>> {
        match self {
            Delivery::Collect => None,
            Delivery::Stream(tx) => Some(tx.clone()),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Delivery::Collect => false,
            Delivery::Stream(tx) => tx.is_closed(),
        }
    }
}

/// Resolves batches of hostnames with bounded concurrency.
///
/// Each unique host gets exactly one `ResolveResult`. At most
/// `min(concurrency, hosts)` hosts resolve at once, and new work is
/// admitted at the pace set by `delay`/`delay_jitter`. Result order is
/// not defined in either delivery mode.
///
/// Once dispatched, a host runs until it resolves or every resolver has
/// failed. Dropping the future returned by `resolve_all` aborts all
/// in-flight hosts; dropping the stream from `resolve_all_stream` stops
/// new hosts from being admitted.
#[derive(Clone)]
pub struct Runner {
    options: Arc<ResolveOptions>,
    host_resolver: HostResolver,
    span: Span,
}

impl Runner {
    /// Runner backed by hickory.
    pub fn new(options: ResolveOptions) -> Result<Runner, OptionsError> {
        Runner::with_executor(options, Arc::new(HickoryExecutor))
    }

    pub fn with_executor(options: ResolveOptions, executor: Arc<dyn QueryExecutor>) -> Result<Runner, OptionsError> {
        let resolvers = options.validate()?;
        let span = info_span!(
            target: APP_NAME,
            "runner",
            transport = %options.transport,
            resolvers = resolvers.len()
        );
        let host_resolver = HostResolver::new(
            executor,
            resolvers.into(),
            options.transport,
            Duration::from_secs(options.timeout),
        );
        Ok(Runner {
            options: Arc::new(options),
            host_resolver,
            span,
        })
    }

    /// Replace the span every resolution is logged under.
    pub fn with_span(mut self, span: Span) -> Runner {
        self.span = span;
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub async fn resolve_one(&self, host: &str) -> ResolveResult {
        self.host_resolver.resolve(host).instrument(self.span.clone()).await
    }

    /// Resolve every unique host and return once all are done.
    pub async fn resolve_all<S: AsRef<str>>(&self, hosts: &[S]) -> Vec<ResolveResult> {
        let hosts = unique_hosts(hosts);
        self.dispatch(hosts, Delivery::Collect)
            .instrument(self.span.clone())
            .await
    }

    /// Resolve every unique host, yielding results as they finish.
    ///
    /// The stream ends after the last host has been delivered. Must be
    /// called from within a tokio runtime.
    pub fn resolve_all_stream<S: AsRef<str>>(&self, hosts: &[S]) -> ReceiverStream<ResolveResult> {
        let hosts = unique_hosts(hosts);
        let capacity = self.options.concurrency.clamp(1, hosts.len().max(1));
        let (tx, rx) = mpsc::channel(capacity);

        let runner = self.clone();
        tokio::spawn(
            async move {
                // `tx` lives in the delivery and is dropped once every
                // worker has finished, which ends the stream.
                runner.dispatch(hosts, Delivery::Stream(tx)).await;
            }
            .instrument(self.span.clone()),
        );

        ReceiverStream::new(rx)
    }

    async fn dispatch(&self, hosts: Vec<String>, delivery: Delivery) -> Vec<ResolveResult> {
        if hosts.is_empty() {
            return Vec::new();
        }

        let total = hosts.len();
        let concurrency = self.options.concurrency.min(total);
        let gate = Arc::new(Semaphore::new(concurrency));
        let mut workers = JoinSet::new();
        let started = Instant::now();
        info!(hosts = total, concurrency, "dispatching");

        for (index, host) in hosts.into_iter().enumerate() {
            if index > 0 {
                let delay = next_delay(&self.options);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }

            let Ok(permit) = gate.clone().acquire_owned().await else {
                break;
            };
            if delivery.is_closed() {
                debug!(dispatched = index, "stream receiver dropped, stopping");
                break;
            }

            let host_resolver = self.host_resolver.clone();
            let sender = delivery.sender();
            workers.spawn(
                async move {
                    let result = resolve_isolated(&host_resolver, &host).await;
                    match sender {
                        None => {
                            drop(permit);
                            Some(result)
                        }
                        Some(tx) => {
                            if tx.send(result).await.is_err() {
                                debug!(%host, "stream receiver dropped");
                            }
                            // Give the consumer room to drain before the
                            // next host is admitted.
                            sleep(Duration::from_millis(STREAM_SETTLE_MS)).await;
                            drop(permit);
                            None
                        }
                    }
                }
                .in_current_span(),
            );
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => error!(error = %e, "worker did not complete"),
            }
        }

        info!(
            hosts = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "round complete"
        );
        results
    }
}

/// Resolve `host`, turning a panic anywhere below into an empty result
/// so one host cannot take the round down with it.
async fn resolve_isolated(host_resolver: &HostResolver, host: &str) -> ResolveResult {
    match AssertUnwindSafe(host_resolver.resolve_name(host)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            error!(host, "resolution panicked");
            ResolveResult::empty(host)
        }
    }
}

/// Normalize and de-duplicate, keeping first-seen order.
fn unique_hosts<S: AsRef<str>>(hosts: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    hosts
        .iter()
        .map(|h| normalize_host(h.as_ref()))
        .filter(|h| seen.insert(h.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio_stream::StreamExt;

    use super::*;
    use crate::dns::testing::{Behavior, MockExecutor, answer};

    fn options(resolvers: &[&str], concurrency: usize) -> ResolveOptions {
        ResolveOptions {
            concurrency,
            resolvers: resolvers.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn domains(results: &[ResolveResult]) -> HashSet<String> {
        results.iter().map(|r| r.target_domain.to_owned()).collect()
    }

    #[test]
    fn unique_hosts_normalizes_and_keeps_order() {
        let hosts = unique_hosts(&["b.com", "A.com", "a.com:443", "b.com.", "c.com"]);
        assert_eq!(hosts, vec!["b.com", "a.com", "c.com"]);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let result = Runner::new(options(&["8.8.8.8"], 0));
        assert!(matches!(result, Err(OptionsError::ZeroConcurrency)));
    }

    #[tokio::test]
    async fn batch_returns_one_result_per_unique_host() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", answer()));
        let runner = Runner::with_executor(options(&["8.8.8.8"], 2), executor).unwrap();

        let results = runner
            .resolve_all(&["example.com", "example.com", "bad..host"])
            .await;

        assert_eq!(results.len(), 2);
        let example = results.iter().find(|r| r.target_domain == "example.com").unwrap();
        assert_eq!(example.resolved_by, Some("8.8.8.8:53".parse().unwrap()));
        let bad = results.iter().find(|r| r.target_domain == "bad..host").unwrap();
        assert_eq!(bad, &ResolveResult::empty("bad..host"));
    }

    #[tokio::test]
    async fn repeated_trailing_dots_do_not_duplicate_a_host() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", answer()));
        let runner = Runner::with_executor(options(&["8.8.8.8"], 2), executor.clone()).unwrap();

        let results = runner.resolve_all(&["example.com", "example.com.."]).await;

        let example: Vec<_> = results.iter().filter(|r| r.target_domain == "example.com").collect();
        assert_eq!(example.len(), 1);
        assert!(example[0].is_resolved());
        let dotted = results.iter().find(|r| r.target_domain != "example.com").unwrap();
        assert!(!dotted.is_resolved());
        assert_eq!(executor.queried_hosts(), vec!["example.com", "example.com"]);
    }

    #[tokio::test]
    async fn batch_dedup_is_case_insensitive() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", answer()));
        let runner = Runner::with_executor(options(&["8.8.8.8"], 4), executor.clone()).unwrap();

        let results = runner
            .resolve_all(&["GitHub.com", "github.com", "github.com:443", "example.com"])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(
            domains(&results),
            HashSet::from(["github.com".to_owned(), "example.com".to_owned()])
        );
        // One A and one AAAA per unique host.
        assert_eq!(executor.calls().len(), 4);
    }

    #[tokio::test]
    async fn empty_resolver_list_resolves_nothing() {
        let executor = Arc::new(MockExecutor::new());
        let runner = Runner::with_executor(options(&[], 3), executor.clone()).unwrap();

        let results = runner.resolve_all(&["a.com", "b.com", "c.com"]).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.is_resolved() && r.ipv4_addresses.is_empty() && r.ipv6_addresses.is_empty()));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn every_host_fails_over_to_the_working_resolver() {
        let executor = Arc::new(
            MockExecutor::new()
                .with("10.0.0.1:53", Behavior::Fail)
                .with("10.0.0.2:53", Behavior::FailAaaa)
                .with("10.0.0.3:53", answer()),
        );
        let runner = Runner::with_executor(options(&["10.0.0.1", "10.0.0.2", "10.0.0.3"], 4), executor).unwrap();

        let hosts: Vec<String> = (0..8).map(|i| format!("host{i}.example.com")).collect();
        let results = runner.resolve_all(&hosts).await;

        assert_eq!(results.len(), 8);
        for result in results {
            assert_eq!(result.resolved_by, Some("10.0.0.3:53".parse().unwrap()));
        }
    }

    #[tokio::test]
    async fn concurrency_bound_is_respected() {
        let executor = Arc::new(
            MockExecutor::new()
                .with("8.8.8.8:53", answer())
                .with_latency(Duration::from_millis(20)),
        );
        let runner = Runner::with_executor(options(&["8.8.8.8"], 3), executor.clone()).unwrap();

        let hosts: Vec<String> = (0..12).map(|i| format!("host{i}.example.com")).collect();
        let results = runner.resolve_all(&hosts).await;

        assert_eq!(results.len(), 12);
        assert!(executor.max_in_flight() <= 3, "max in flight {}", executor.max_in_flight());
        assert!(executor.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn single_worker_is_serial() {
        let executor = Arc::new(
            MockExecutor::new()
                .with("8.8.8.8:53", answer())
                .with_latency(Duration::from_millis(5)),
        );
        let runner = Runner::with_executor(options(&["8.8.8.8"], 1), executor.clone()).unwrap();

        runner.resolve_all(&["a.com", "b.com", "c.com", "d.com"]).await;

        assert_eq!(executor.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn pacing_delays_dispatch_starts() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", answer()));
        let runner = Runner::with_executor(
            ResolveOptions {
                delay: 50,
                ..options(&["8.8.8.8"], 3)
            },
            executor,
        )
        .unwrap();

        let started = Instant::now();
        runner.resolve_all(&["a.com", "b.com", "c.com"]).await;

        // No delay before the first dispatch, one before each of the others.
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn panicking_host_still_yields_a_result() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", Behavior::Panic));
        let runner = Runner::with_executor(options(&["8.8.8.8"], 2), executor).unwrap();

        let results = runner.resolve_all(&["a.com", "b.com", "c.com"]).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.is_resolved()));
    }

    #[tokio::test]
    async fn resolve_one_uses_failover() {
        let executor = Arc::new(
            MockExecutor::new()
                .with("10.0.0.1:53", Behavior::Fail)
                .with("10.0.0.2:53", answer()),
        );
        let runner = Runner::with_executor(options(&["10.0.0.1", "10.0.0.2"], 1), executor).unwrap();

        let result = runner.resolve_one("github.com").await;

        assert_eq!(result.resolved_by, Some("10.0.0.2:53".parse().unwrap()));
    }

    #[tokio::test]
    async fn stream_delivers_every_unique_host_then_ends() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", answer()));
        let runner = Runner::with_executor(options(&["8.8.8.8"], 3), executor).unwrap();

        let stream = runner.resolve_all_stream(&["a.com", "b.com", "a.com", "c.com", "bad..host", "d.com"]);
        let results: Vec<ResolveResult> = stream.collect().await;

        assert_eq!(results.len(), 5);
        assert_eq!(domains(&results).len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_resolved()).count(), 4);
    }

    #[tokio::test]
    async fn stream_of_nothing_ends_immediately() {
        let executor = Arc::new(MockExecutor::new());
        let runner = Runner::with_executor(options(&["8.8.8.8"], 3), executor).unwrap();

        let hosts: [&str; 0] = [];
        let mut stream = runner.resolve_all_stream(&hosts);

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_stream_stops_admission() {
        let executor = Arc::new(MockExecutor::new().with("8.8.8.8:53", answer()));
        let runner = Runner::with_executor(options(&["8.8.8.8"], 1), executor.clone()).unwrap();

        let hosts: Vec<String> = (0..20).map(|i| format!("host{i}.example.com")).collect();
        let mut stream = runner.resolve_all_stream(&hosts);
        assert!(stream.next().await.is_some());
        drop(stream);

        sleep(Duration::from_millis(500)).await;
        assert!(executor.calls().len() <= 4, "calls {}", executor.calls().len());
    }
}
