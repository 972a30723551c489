//! Randomized request pacing
//!
//! Delays are jittered so requests do not arrive at a fixed rate, and every wait is raced
//! against the run's cancellation token so a stop request never sits out a long delay.

use crate::config::DelayConfig;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Draw one delay: `base` plus a uniform offset in `[-jitter_below, +jitter_above]`,
/// clamped to at least `floor`
pub fn jittered(delay: &DelayConfig) -> Duration {
    let below = delay.jitter_below.as_secs_f64();
    let above = delay.jitter_above.as_secs_f64();

    let offset = if below == 0.0 && above == 0.0 {
        0.0
    } else {
        rand::thread_rng().gen_range(-below..=above)
    };

    let secs = (delay.base.as_secs_f64() + offset).max(0.0);
    Duration::from_secs_f64(secs).max(delay.floor)
}

/// Sleep for `delay` unless `cancel` fires first
///
/// Returns `false` if the wait was cut short by cancellation.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
