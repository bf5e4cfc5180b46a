use std::fmt::Display;

use anyhow::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::core::common::{ResolveOptions, ResolveResult};

const NONE: &str = "None";

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "IPv4")]
    ipv4: String,
    #[tabled(rename = "IPv6")]
    ipv6: String,
    #[tabled(rename = "Resolver")]
    resolver: String,
}

fn join_or_none<T: Display>(items: &[T]) -> String {
    match items.is_empty() {
        true => NONE.to_owned(),
        false => items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", "),
    }
}

fn resolver_or_none(result: &ResolveResult) -> String {
    match result.resolved_by {
        Some(r) => r.to_string(),
        None => NONE.to_owned(),
    }
}

/// Multi-line text block for a single result.
pub fn result_msg(result: &ResolveResult) -> String {
    format!(
        "Domain: {}\nIPv4: {}\nIPv6: {}\nResolver: {}\n",
        result.target_domain,
        join_or_none(&result.ipv4_addresses),
        join_or_none(&result.ipv6_addresses),
        resolver_or_none(result),
    )
}

pub fn result_json_msg(result: &ResolveResult) -> Result<String> {
    Ok(serde_json::to_string(result)?)
}

/// Table of results sorted by domain.
pub fn results_table_msg(results: &[ResolveResult]) -> String {
    let mut rows: Vec<ResultRow> = results
        .iter()
        .map(|r| ResultRow {
            domain: r.target_domain.to_owned(),
            ipv4: join_or_none(&r.ipv4_addresses),
            ipv6: join_or_none(&r.ipv6_addresses),
            resolver: resolver_or_none(r),
        })
        .collect();
    rows.sort_by(|a, b| a.domain.cmp(&b.domain));

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

/// One line describing the round about to start.
pub fn round_msg(options: &ResolveOptions, hosts: usize) -> String {
    format!(
        "Resolving {hosts} hosts against {} resolvers over {} (concurrency {}, timeout {}s)",
        options.resolvers.len(),
        options.transport,
        options.concurrency,
        options.timeout,
    )
}

pub fn summary_msg(results: &[ResolveResult]) -> String {
    let resolved = results.iter().filter(|r| r.is_resolved()).count();
    format!("{resolved}/{} hosts resolved", results.len())
}
