use crate::core::error::HostError;
use crate::core::konst::{MAX_HOSTNAME_LEN, MAX_LABEL_LEN};

/// Strip an optional `:port` suffix, one trailing dot and surrounding
/// whitespace, and lowercase the rest. Bare IPv6 literals are left alone.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            name.trim()
        }
        _ => host,
    };
    // Repeated trailing dots stay put so validation sees the empty label.
    let host = match host.strip_suffix('.') {
        Some(name) if !name.ends_with('.') => name,
        _ => host,
    };
    host.to_ascii_lowercase()
}

/// Check that `host` is a syntactically valid hostname.
pub fn validate_hostname(host: &str) -> Result<(), HostError> {
    if host.is_empty() {
        return Err(HostError::Empty);
    }
    let name = host.strip_suffix('.').unwrap_or(host);
    if name.len() > MAX_HOSTNAME_LEN {
        return Err(HostError::TooLong(host.to_owned()));
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err(HostError::EmptyLabel(host.to_owned()));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(HostError::LabelTooLong(host.to_owned()));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(HostError::HyphenEdge(host.to_owned()));
        }
        // Underscores show up in service labels such as `_dmarc`.
        if let Some(c) = label.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
            return Err(HostError::InvalidChar(host.to_owned(), c));
        }
    }

    Ok(())
}
