use std::future::Future;

use crate::error::AppError;
use crate::models::{BatchReport, FetchOutcome, Movie, PersistOutcome, ProxyHandle, Stock, WorkItem};

/// A validated domain entity that can be persisted.
pub trait Record: Clone + Send + Sync + 'static {
    /// Human-readable identity for log lines.
    fn identity(&self) -> String;

    /// Business-unique key enforced by storage.
    fn secondary_key(&self) -> &str;

    /// Primary identity present and all required fields filled.
    fn is_valid(&self) -> bool;
}

impl Record for Movie {
    fn identity(&self) -> String {
        format!("{} {}", self.id, self.title)
    }

    fn secondary_key(&self) -> &str {
        &self.url
    }

    fn is_valid(&self) -> bool {
        Movie::is_valid(self)
    }
}

impl Record for Stock {
    fn identity(&self) -> String {
        format!("{} - {}", self.symbol, self.name)
    }

    fn secondary_key(&self) -> &str {
        &self.symbol
    }

    fn is_valid(&self) -> bool {
        Stock::is_valid(self)
    }
}

/// Hands out freshly validated proxies.
pub trait ProxyBroker: Send + Sync + Clone {
    /// Acquire a live proxy, or `None` once the broker gives up.
    fn acquire(&self) -> impl Future<Output = Option<ProxyHandle>> + Send;
}

/// A broker that never has a proxy to offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl ProxyBroker for NoProxy {
    async fn acquire(&self) -> Option<ProxyHandle> {
        None
    }
}

/// Issues one request for a work item and classifies the response.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        item: &WorkItem,
        proxy: Option<&ProxyHandle>,
    ) -> impl Future<Output = FetchOutcome> + Send;
}

/// Result of running an extractor over a page body.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<R> {
    Complete(R),
    /// Identity or a required field was absent.
    Incomplete { missing: Vec<&'static str> },
}

/// Turns a successfully fetched detail page into one record.
pub trait Extractor: Send + Sync + Clone {
    type Record: Record;

    fn extract(&self, body: &str, item: &WorkItem) -> Extraction<Self::Record>;
}

/// Turns a list-shaped page into many records.
pub trait ListingExtractor: Send + Sync + Clone {
    type Record: Record;

    fn extract_listing(&self, body: &str) -> Vec<Self::Record>;
}

/// Single-record persistence. Conflicts are reported, never raised.
pub trait RecordStore<R>: Send + Sync + Clone {
    fn persist(&self, record: &R) -> impl Future<Output = PersistOutcome> + Send;
}

/// Batched insert-or-update persistence for list-shaped sources.
pub trait BatchStore<R>: Send + Sync + Clone {
    fn upsert_batch(
        &self,
        records: &[R],
    ) -> impl Future<Output = Result<BatchReport, AppError>> + Send;
}
