use std::time::Duration;

use reqwest::{Client, Proxy, StatusCode};
use serde::Deserialize;
use trawl_core::error::AppError;
use trawl_core::models::ProxyHandle;
use trawl_core::traits::ProxyBroker;
use url::Url;

pub const DEFAULT_POOL_URL: &str = "http://127.0.0.1:5010";
pub const DEFAULT_CHECK_URL: &str = "https://movie.douban.com/subject/1291543/";

/// Settings for the external proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Base URL of the allocator; proxies are requested from `{pool_url}/get/`.
    pub pool_url: String,
    /// Known-good page fetched through each candidate proxy.
    pub check_url: String,
    /// Acquisition attempts before giving up.
    pub attempts: u32,
    /// Pause after each failed acquisition attempt.
    pub attempt_delay: Duration,
    /// Timeout for both allocation and check requests.
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            pool_url: DEFAULT_POOL_URL.to_string(),
            check_url: DEFAULT_CHECK_URL.to_string(),
            attempts: 5,
            attempt_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

impl ProxyConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PROXY_POOL_URL` (optional, defaults to `http://127.0.0.1:5010`)
    /// - `PROXY_CHECK_URL` (optional, defaults to a Douban subject page)
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();
        if let Ok(pool_url) = std::env::var("PROXY_POOL_URL") {
            config.pool_url = pool_url;
        }
        if let Ok(check_url) = std::env::var("PROXY_CHECK_URL") {
            config.check_url = check_url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_pool_url(mut self, pool_url: impl Into<String>) -> Self {
        self.pool_url = pool_url.into();
        self
    }

    pub fn with_check_url(mut self, check_url: impl Into<String>) -> Self {
        self.check_url = check_url.into();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("PROXY_POOL_URL", &self.pool_url),
            ("PROXY_CHECK_URL", &self.check_url),
        ] {
            Url::parse(value)
                .map_err(|e| AppError::ConfigError(format!("Invalid {name} '{value}': {e}")))?;
        }
        Ok(())
    }

    fn allocate_url(&self) -> String {
        format!("{}/get/", self.pool_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct PoolResponse {
    proxy: Option<String>,
}

/// Proxy broker backed by an HTTP proxy-pool service.
///
/// Each acquisition asks the pool for a candidate and checks it before
/// handing it out. Failures are logged and swallowed; after the configured
/// number of attempts the broker returns `None`.
#[derive(Clone)]
pub struct PoolProxyBroker {
    client: Client,
    config: ProxyConfig,
}

impl PoolProxyBroker {
    pub fn new(config: ProxyConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .no_proxy()
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Ask the pool for one candidate address.
    async fn allocate(&self) -> Result<Option<String>, AppError> {
        let response = self
            .client
            .get(self.config.allocate_url())
            .send()
            .await
            .map_err(|e| AppError::ProxyError(format!("Pool unreachable: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(AppError::ProxyError(format!(
                "Pool returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::ProxyError(format!("Failed to read pool response: {e}")))?;
        parse_pool_response(&body)
    }

    /// Fetch the check URL through the candidate; only HTTP 200 passes.
    async fn check(&self, handle: &ProxyHandle) -> Result<(), AppError> {
        let proxy = Proxy::all(handle.url())
            .map_err(|e| AppError::ProxyError(format!("Invalid proxy {}: {e}", handle.address)))?;
        let client = Client::builder()
            .timeout(self.config.timeout)
            .proxy(proxy)
            .build()
            .map_err(|e| AppError::ProxyError(e.to_string()))?;

        let status = client
            .get(&self.config.check_url)
            .send()
            .await
            .map_err(|e| AppError::ProxyError(format!("Proxy check failed: {e}")))?
            .status();

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(AppError::ProxyError(format!(
                "Proxy check returned HTTP {}",
                status.as_u16()
            )))
        }
    }

    async fn try_acquire(&self) -> Result<Option<ProxyHandle>, AppError> {
        let Some(address) = self.allocate().await? else {
            return Ok(None);
        };
        let handle = ProxyHandle::new(address);
        self.check(&handle).await?;
        Ok(Some(handle))
    }
}

/// The pool answers either with a bare `host:port` or `{"proxy": "host:port", ...}`.
fn parse_pool_response(body: &str) -> Result<Option<String>, AppError> {
    let body = body.trim();
    let address = if body.starts_with('{') {
        let parsed: PoolResponse = serde_json::from_str(body)?;
        parsed.proxy.unwrap_or_default()
    } else {
        body.to_string()
    };
    let address = address.trim();
    Ok((!address.is_empty()).then(|| address.to_string()))
}

impl ProxyBroker for PoolProxyBroker {
    async fn acquire(&self) -> Option<ProxyHandle> {
        let attempts = self.config.attempts.max(1);

        for attempt in 1..=attempts {
            match self.try_acquire().await {
                Ok(Some(handle)) => {
                    tracing::debug!(proxy = %handle.address, %attempt, "Proxy validated");
                    return Some(handle);
                }
                Ok(None) => tracing::debug!(%attempt, "Proxy pool is empty"),
                Err(e) => tracing::debug!(%attempt, error = %e, "Proxy acquisition failed"),
            }
            tokio::time::sleep(self.config.attempt_delay).await;
        }

        tracing::warn!(%attempts, "No usable proxy obtained");
        None
    }
}
