//! Inter-item pacing for polite crawling.
//!
//! The permit pool in the orchestrator bounds how many requests are in
//! flight; pacing bounds how fast they go out. Every item task sleeps for
//! `delay + uniform[0, jitter)` after it finishes, whatever the outcome, and
//! keeps its permit while it sleeps. A run of fast failures cannot turn into
//! a request burst.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use trawl_core::pacing::PacingConfig;
//!
//! let pacing = PacingConfig::new(Duration::from_secs(1))
//!     .with_jitter(Duration::from_millis(500));
//! let wait = pacing.effective_delay();
//! assert!(wait >= Duration::from_secs(1));
//! assert!(wait < Duration::from_millis(1500));
//! ```

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Configuration for the post-item pacing delay.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Fixed delay applied after each item.
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter)).
    ///
    /// Set to `Duration::ZERO` to disable.
    pub jitter: Duration,
}

impl PacingConfig {
    /// Create a config with the given delay and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// No pacing at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Add random jitter (uniform [0, jitter)) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the effective delay for a single wait (delay + random jitter).
    pub fn effective_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    }

    /// Sleep for one effective delay, returning early on cancellation.
    pub async fn pause(&self, cancel: &CancellationToken) {
        let wait = self.effective_delay();
        if wait.is_zero() {
            return;
        }
        tracing::trace!(wait_ms = %wait.as_millis(), "Pacing");
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            () = cancel.cancelled() => {}
        }
    }
}

impl Default for PacingConfig {
    /// 1 second delay, up to 1 second of jitter.
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
        }
    }
}
