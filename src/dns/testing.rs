//! Scripted `QueryExecutor` used by the engine tests.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::proto::rr::rdata::{A, AAAA, CNAME};
use hickory_resolver::proto::rr::{Name, RData, RecordType};

use crate::core::common::Transport;
use crate::core::error::QueryError;
use crate::dns::executor::QueryExecutor;

#[derive(Clone, Debug)]
pub enum Behavior {
    Answer { v4: Vec<Ipv4Addr>, v6: Vec<Ipv6Addr> },
    /// Both record types fail.
    Fail,
    /// A succeeds, AAAA fails.
    FailAaaa,
    Panic,
}

pub struct MockExecutor {
    behaviors: HashMap<SocketAddr, Behavior>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, RecordType, SocketAddr)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, resolver: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(resolver.parse().unwrap(), behavior);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, RecordType, SocketAddr)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queried_hosts(&self) -> Vec<String> {
        self.calls().into_iter().map(|(host, _, _)| host).collect()
    }
}

/// Answer that resolves every host to one address of each family.
pub fn answer() -> Behavior {
    Behavior::Answer {
        v4: vec![Ipv4Addr::new(192, 0, 2, 1)],
        v6: vec!["2001:db8::1".parse().unwrap()],
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn query(
        &self,
        host: &str,
        record_type: RecordType,
        resolver: SocketAddr,
        _transport: Transport,
        timeout: Duration,
    ) -> Result<Vec<RData>, QueryError> {
        self.calls.lock().unwrap().push((host.to_owned(), record_type, resolver));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self.behaviors.get(&resolver).cloned().unwrap_or(Behavior::Fail);
        let timed_out = QueryError::Timeout {
            resolver: resolver.to_string(),
            timeout,
        };
        match (behavior, record_type) {
            (Behavior::Panic, _) => panic!("scripted panic for {host}"),
            (Behavior::Fail, _) => Err(timed_out),
            (Behavior::FailAaaa, RecordType::AAAA) => Err(timed_out),
            (Behavior::FailAaaa, _) => Ok(vec![RData::A(A(Ipv4Addr::new(198, 51, 100, 1)))]),
            (Behavior::Answer { v4, .. }, RecordType::A) => {
                let alias = Name::from_ascii("alias.example.net.").unwrap();
                let mut records = vec![RData::CNAME(CNAME(alias))];
                records.extend(v4.into_iter().map(|ip| RData::A(A(ip))));
                Ok(records)
            }
            (Behavior::Answer { v6, .. }, _) => Ok(v6.into_iter().map(|ip| RData::AAAA(AAAA(ip))).collect()),
        }
    }
}
