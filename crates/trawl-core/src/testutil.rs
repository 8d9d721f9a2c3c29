//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` or atomics for interior mutability,
//! allowing test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::batch::PreparedBatch;
use crate::error::AppError;
use crate::models::{BatchReport, FetchOutcome, Movie, PersistOutcome, ProxyHandle, Stock, WorkItem};
use crate::orchestrator::{CrawlEvent, CrawlReporter};
use crate::traits::{
    BatchStore, Extraction, Extractor, Fetcher, ListingExtractor, ProxyBroker, RecordStore,
};

// ---------------------------------------------------------------------------
// MockBroker
// ---------------------------------------------------------------------------

/// Mock broker that hands out queued proxies, then `None`.
#[derive(Clone, Default)]
pub struct MockBroker {
    proxies: Arc<Mutex<Vec<ProxyHandle>>>,
    calls: Arc<AtomicUsize>,
}

impl MockBroker {
    /// Broker whose pool is always exhausted.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_proxies(proxies: Vec<ProxyHandle>) -> Self {
        Self {
            proxies: Arc::new(Mutex::new(proxies)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProxyBroker for MockBroker {
    async fn acquire(&self) -> Option<ProxyHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut proxies = self.proxies.lock().unwrap();
        if proxies.is_empty() {
            None
        } else {
            Some(proxies.remove(0))
        }
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns configurable outcomes.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of outcomes. Each call pops the first element.
    /// If empty, returns `fallback`.
    outcomes: Arc<Mutex<Vec<FetchOutcome>>>,
    fallback: FetchOutcome,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    proxies_seen: Arc<Mutex<Vec<Option<String>>>>,
    call_times: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl MockFetcher {
    /// Every call returns the same outcome.
    pub fn always(outcome: FetchOutcome) -> Self {
        Self::build(Vec::new(), outcome)
    }

    /// Calls return `outcomes` in order, then a transient error.
    pub fn with_outcomes(outcomes: Vec<FetchOutcome>) -> Self {
        Self::build(
            outcomes,
            FetchOutcome::TransientError("no more mock outcomes".into()),
        )
    }

    fn build(outcomes: Vec<FetchOutcome>, fallback: FetchOutcome) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            fallback,
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            proxies_seen: Arc::new(Mutex::new(Vec::new())),
            call_times: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate network latency on every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `fetch` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Proxy address passed to each call, in call order.
    pub fn proxies_seen(&self) -> Vec<Option<String>> {
        self.proxies_seen.lock().unwrap().clone()
    }

    /// When each call started, in call order.
    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _item: &WorkItem, proxy: Option<&ProxyHandle>) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        self.proxies_seen
            .lock()
            .unwrap()
            .push(proxy.map(|p| p.address.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            self.fallback.clone()
        } else {
            outcomes.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that builds a movie from the work item alone.
#[derive(Clone)]
pub struct MockExtractor {
    complete: bool,
    panic_on: Option<i64>,
}

impl MockExtractor {
    /// Every page yields a complete movie keyed by the item's subject id.
    pub fn movies() -> Self {
        Self {
            complete: true,
            panic_on: None,
        }
    }

    /// Every page is missing its title.
    pub fn incomplete() -> Self {
        Self {
            complete: false,
            panic_on: None,
        }
    }

    /// Panic while extracting the item with this subject id.
    pub fn panicking_on(mut self, id: i64) -> Self {
        self.panic_on = Some(id);
        self
    }
}

impl Extractor for MockExtractor {
    type Record = Movie;

    fn extract(&self, _body: &str, item: &WorkItem) -> Extraction<Movie> {
        let Some(id) = item.key else {
            return Extraction::Incomplete { missing: vec!["id"] };
        };
        if self.panic_on == Some(id) {
            panic!("mock extractor panicked on subject {id}");
        }
        if !self.complete {
            return Extraction::Incomplete {
                missing: vec!["title"],
            };
        }
        Extraction::Complete(Movie {
            id,
            title: format!("Movie {id}"),
            year: "2004".to_string(),
            director: "Director".to_string(),
            rating: Some(8.0),
            url: item.locator.clone(),
        })
    }
}

/// Mock listing extractor that returns a fixed set of rows.
#[derive(Clone)]
pub struct MockListingExtractor {
    rows: Vec<Stock>,
}

impl MockListingExtractor {
    pub fn new(rows: Vec<Stock>) -> Self {
        Self { rows }
    }
}

impl ListingExtractor for MockListingExtractor {
    type Record = Stock;

    fn extract_listing(&self, _body: &str) -> Vec<Stock> {
        self.rows.clone()
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory insert-or-reject store keyed by movie id and url.
#[derive(Clone, Default)]
pub struct MockStore {
    rows: Arc<Mutex<HashMap<i64, Movie>>>,
    fail_with: Option<String>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose every insert fails.
    pub fn failing(reason: &str) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            fail_with: Some(reason.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore<Movie> for MockStore {
    async fn persist(&self, record: &Movie) -> PersistOutcome {
        if let Some(reason) = &self.fail_with {
            return PersistOutcome::Failed(reason.clone());
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.id) || rows.values().any(|m| m.url == record.url) {
            return PersistOutcome::Duplicate;
        }
        rows.insert(record.id, record.clone());
        PersistOutcome::Created
    }
}

// ---------------------------------------------------------------------------
// MockBatchStore
// ---------------------------------------------------------------------------

/// In-memory insert-or-update store keyed by stock symbol.
#[derive(Clone, Default)]
pub struct MockBatchStore {
    rows: Arc<Mutex<HashMap<String, Stock>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that returns an error on the next upsert.
    pub fn with_error(error: AppError) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, symbol: &str) -> Option<Stock> {
        self.rows.lock().unwrap().get(symbol).cloned()
    }
}

impl BatchStore<Stock> for MockBatchStore {
    async fn upsert_batch(&self, records: &[Stock]) -> Result<BatchReport, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        let batch = PreparedBatch::prepare(records);
        let mut rows = self.rows.lock().unwrap();
        let existing = batch
            .rows
            .iter()
            .filter(|s| rows.contains_key(&s.symbol))
            .count();
        for stock in &batch.rows {
            rows.insert(stock.symbol.clone(), stock.clone());
        }
        Ok(batch.report(existing))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock crawl reporter that records event labels.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events with the given label.
    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match &event {
            CrawlEvent::RunStarted { .. } => "RunStarted",
            CrawlEvent::ProxyUnavailable { .. } => "ProxyUnavailable",
            CrawlEvent::AttemptStarted { .. } => "AttemptStarted",
            CrawlEvent::Persisted { .. } => "Persisted",
            CrawlEvent::NotFound { .. } => "NotFound",
            CrawlEvent::Blocked { .. } => "Blocked",
            CrawlEvent::Incomplete { .. } => "Incomplete",
            CrawlEvent::AttemptFailed { .. } => "AttemptFailed",
            CrawlEvent::ItemFailed { .. } => "ItemFailed",
            CrawlEvent::ItemAborted { .. } => "ItemAborted",
            CrawlEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
