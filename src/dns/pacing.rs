use std::time::Duration;

use crate::core::common::ResolveOptions;

/// Delay to wait before the next dispatch: `delay` plus a uniform draw
/// from `0..delay_jitter` milliseconds.
pub fn next_delay(options: &ResolveOptions) -> Duration {
    let jitter = match options.delay_jitter {
        0 => 0,
        width => fastrand::u64(0..width),
    };
    Duration::from_millis(options.delay.saturating_add(jitter))
}
