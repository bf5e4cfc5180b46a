use std::io::BufRead;
use std::net::{IpAddr, SocketAddr};

use anyhow::Result;

use crate::core::error::OptionsError;
use crate::core::konst::DNS_PORT;

/// Parse a resolver address. A bare IP gets the standard DNS port.
pub fn parse_resolver(s: &str) -> Result<SocketAddr, OptionsError> {
    let s = s.trim();
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DNS_PORT));
    }
    s.parse::<SocketAddr>()
        .map_err(|_| OptionsError::InvalidResolver(s.to_owned()))
}

/// Parse a newline separated resolver list, skipping blanks, comments
/// and anything that is not an IP address.
pub fn parse_resolver_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| parse_resolver(line).is_ok())
        .map(str::to_owned)
        .collect()
}

/// Read one hostname per line.
pub fn read_hosts<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        hosts.push(line.to_owned());
    }
    Ok(hosts)
}
