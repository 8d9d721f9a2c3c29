use std::time::Duration;

use uuid::Uuid;

use crate::pacing::PacingConfig;

/// Configuration for one orchestrated crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Identifier attached to every log line of the run.
    pub run_id: String,
    /// Maximum number of items holding a permit at once.
    pub concurrency: usize,
    /// Attempts per item, including the first. Values below 1 are treated as 1.
    pub max_retries: u32,
    /// Wait between two attempts on the same item.
    pub retry_delay: Duration,
    /// Delay applied after each item finishes.
    pub pacing: PacingConfig,
    /// Acquire a proxy from the broker before every attempt.
    pub use_proxy: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            run_id: format!("run-{}", &Uuid::new_v4().to_string()[..8]),
            concurrency: 5,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            pacing: PacingConfig::default(),
            use_proxy: false,
        }
    }
}

impl CrawlConfig {
    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = id.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Permit pool size, never less than one.
    pub fn permits(&self) -> usize {
        self.concurrency.max(1)
    }
}
