use serde::Serialize;

use crate::config::CrawlConfig;
use crate::models::{BatchReport, FetchOutcome, WorkItem};
use crate::traits::{BatchStore, Fetcher, ListingExtractor, ProxyBroker};

/// Outcome of a listing crawl, shaped for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ListingReport {
    Success {
        data_count: usize,
        save_result: BatchReport,
    },
    Failed {
        message: String,
    },
}

impl ListingReport {
    fn failed(message: impl Into<String>) -> Self {
        ListingReport::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ListingReport::Success { .. })
    }
}

/// Crawls a list-shaped page: fetch once → extract many rows → batch upsert.
///
/// Generic over all external dependencies via traits, the same way the
/// per-item orchestrator is.
pub struct ListingService<P, F, X, S>
where
    P: ProxyBroker,
    F: Fetcher,
    X: ListingExtractor,
    S: BatchStore<X::Record>,
{
    broker: P,
    fetcher: F,
    extractor: X,
    store: S,
    config: CrawlConfig,
}

impl<P, F, X, S> ListingService<P, F, X, S>
where
    P: ProxyBroker,
    F: Fetcher,
    X: ListingExtractor,
    S: BatchStore<X::Record>,
{
    pub fn new(broker: P, fetcher: F, extractor: X, store: S, config: CrawlConfig) -> Self {
        Self {
            broker,
            fetcher,
            extractor,
            store,
            config,
        }
    }

    /// Run the listing pipeline for one page.
    ///
    /// 1. Fetch the page (retrying blocked/transient outcomes)
    /// 2. Extract every row
    /// 3. Upsert the rows in one batch
    pub async fn crawl(&self, locator: &str) -> ListingReport {
        tracing::info!(url = %locator, "Crawling listing");

        let body = match self.fetch_body(&WorkItem::new(locator)).await {
            Ok(body) => body,
            Err(message) => {
                tracing::error!(url = %locator, %message, "Failed to fetch listing");
                return ListingReport::failed(message);
            }
        };

        let rows = self.extractor.extract_listing(&body);
        if rows.is_empty() {
            tracing::error!(url = %locator, "No rows parsed from listing");
            return ListingReport::failed("no rows parsed from listing");
        }
        tracing::info!(url = %locator, rows = rows.len(), "Parsed listing");

        match self.store.upsert_batch(&rows).await {
            Ok(report) => {
                tracing::info!(
                    created = report.created,
                    duplicate = report.duplicate,
                    failed = report.failed,
                    "Listing saved"
                );
                ListingReport::Success {
                    data_count: rows.len(),
                    save_result: report,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Batch upsert failed");
                ListingReport::failed(e.to_string())
            }
        }
    }

    async fn fetch_body(&self, item: &WorkItem) -> Result<String, String> {
        let max_attempts = self.config.attempts();
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            let proxy = if self.config.use_proxy {
                self.broker.acquire().await
            } else {
                None
            };

            let outcome = self.fetcher.fetch(item, proxy.as_ref()).await;
            if !outcome.is_retryable() {
                return match outcome {
                    FetchOutcome::Ok { body, .. } => Ok(body),
                    _ => Err("listing page not found".to_string()),
                };
            }
            last_error = match outcome {
                FetchOutcome::Blocked(reason) => format!("blocked ({reason})"),
                FetchOutcome::TransientError(cause) | FetchOutcome::FatalError(cause) => cause,
                other => other.label().to_string(),
            };

            tracing::warn!(url = %item.locator, %attempt, %max_attempts, error = %last_error, "Listing fetch failed");
            if attempt < max_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(last_error)
    }
}
