//! Backoff for control-plane retries
//!
//! Exponential backoff with jitter: `initial_backoff * 2^attempt`, capped at
//! `max_backoff`, plus 0-50% random jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryPolicy;

/// Delay before retry number `attempt` (0-based)
pub(crate) fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .initial_backoff
        .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = base.min(policy.max_backoff);

    let jitter_range = capped.as_millis() as u64 / 2;
    if jitter_range > 0 {
        let jitter = rand::rng().random_range(0..=jitter_range);
        capped + Duration::from_millis(jitter)
    } else {
        capped
    }
}
