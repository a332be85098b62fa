//! Open-loop pacing to a target message rate.
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Paces sends with a fixed delay of `1 / rate` seconds between them.
///
/// This is not a token bucket: time spent inside a send is not subtracted
/// from the delay, so when a send takes longer than the delay the achieved
/// throughput falls below the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    /// Creates a limiter for `rate` messages per second. Rates `<= 0` are unlimited.
    pub fn new(rate: f64) -> Self {
        let delay = if rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / rate).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Self { delay }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self { delay: Duration::ZERO }
    }

    /// The delay inserted after each send.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits for the inter-message delay.
    ///
    /// Returns early if `cancel` fires while waiting.
    pub async fn wait(&self, cancel: &CancellationToken) {
        if self.delay.is_zero() {
            return;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => (),
            _ = tokio::time::sleep(self.delay) => (),
        }
    }
}

impl From<u32> for RateLimiter {
    fn from(rate: u32) -> Self {
        Self::new(rate as f64)
    }
}
