use std::time::Duration;

use reqwest::header::{ACCEPT_LANGUAGE, LOCATION, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, redirect};
use trawl_core::error::AppError;
use trawl_core::models::{BlockReason, FetchOutcome, ProxyHandle, WorkItem};
use trawl_core::traits::Fetcher;
use trawl_core::util::excerpt;
use url::Url;

use crate::user_agent::random_user_agent;

/// Per-request timeout for target pages.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const EXCERPT_CHARS: usize = 500;

/// Site-specific request headers and anti-bot signatures.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub referer: String,
    pub accept_language: String,
    /// Body substrings that identify an anti-bot interstitial.
    pub block_markers: Vec<String>,
    /// Host the site redirects to when it blocks a client.
    pub block_host: Option<String>,
}

impl SiteProfile {
    /// Douban movie pages.
    pub fn douban() -> Self {
        Self {
            referer: "https://movie.douban.com/".to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            block_markers: vec!["有异常请求从你的 IP 发出".to_string()],
            block_host: Some("sec.douban.com".to_string()),
        }
    }

    /// Sina US stock listings.
    pub fn sina() -> Self {
        Self {
            referer: "https://vip.stock.finance.sina.com.cn/".to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            block_markers: Vec::new(),
            block_host: None,
        }
    }

    fn body_is_blocked(&self, body: &str) -> bool {
        self.block_markers.iter().any(|m| body.contains(m.as_str()))
            || self
                .block_host
                .as_deref()
                .is_some_and(|host| body.contains(host))
    }

    fn redirects_to_block_host(&self, location: Option<&str>) -> bool {
        let (Some(host), Some(location)) = (self.block_host.as_deref(), location) else {
            return false;
        };
        match Url::parse(location) {
            Ok(url) => url.host_str() == Some(host),
            Err(_) => location.contains(host),
        }
    }
}

/// Classify a completed HTTP response.
///
/// Block detection runs before success handling: anti-bot pages are
/// usually served with a 200.
pub fn classify(
    status: u16,
    location: Option<&str>,
    body: &str,
    profile: &SiteProfile,
) -> FetchOutcome {
    match status {
        200 if profile.body_is_blocked(body) => FetchOutcome::Blocked(BlockReason::AntiBot),
        200 => FetchOutcome::Ok {
            body: body.to_string(),
            status,
        },
        302 if profile.redirects_to_block_host(location) => {
            FetchOutcome::Blocked(BlockReason::AntiBot)
        }
        302 | 404 => FetchOutcome::NotFound,
        403 | 418 => FetchOutcome::Blocked(BlockReason::Forbidden),
        other => FetchOutcome::FatalError(format!("HTTP {other}")),
    }
}

/// HTTP fetcher using reqwest.
///
/// Sends a random browser User-Agent plus the profile's Referer and
/// Accept-Language on every request. Redirects are not followed so that
/// 302s can be classified. When a proxy is supplied, a dedicated client is
/// built for that attempt.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    profile: SiteProfile,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new(profile: SiteProfile) -> Result<Self, AppError> {
        Self::with_timeout(profile, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(profile: SiteProfile, timeout: Duration) -> Result<Self, AppError> {
        let client = Self::builder(timeout)
            .no_proxy()
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            profile,
            timeout,
        })
    }

    fn builder(timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
    }

    fn client_for(&self, proxy: Option<&ProxyHandle>) -> Result<Client, AppError> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };
        let proxy = Proxy::all(proxy.url())
            .map_err(|e| AppError::ProxyError(format!("Invalid proxy {}: {e}", proxy.address)))?;
        Self::builder(self.timeout)
            .proxy(proxy)
            .build()
            .map_err(|e| AppError::ProxyError(e.to_string()))
    }

    async fn send(
        &self,
        item: &WorkItem,
        proxy: Option<&ProxyHandle>,
    ) -> Result<(u16, Option<String>, String), AppError> {
        let client = self.client_for(proxy)?;
        let response = client
            .get(&item.locator)
            .header(USER_AGENT, random_user_agent())
            .header(REFERER, &self.profile.referer)
            .header(ACCEPT_LANGUAGE, &self.profile.accept_language)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout.as_secs())
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;

        Ok((status, location, body))
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, item: &WorkItem, proxy: Option<&ProxyHandle>) -> FetchOutcome {
        let (status, location, body) = match self.send(item, proxy).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(url = %item.locator, error = %e, "Transport error");
                return FetchOutcome::TransientError(e.to_string());
            }
        };

        let outcome = classify(status, location.as_deref(), &body, &self.profile);
        if let FetchOutcome::FatalError(cause) = &outcome {
            tracing::error!(
                url = %item.locator,
                %cause,
                excerpt = %excerpt(&body, EXCERPT_CHARS),
                "Unexpected HTTP status"
            );
        }
        outcome
    }
}
