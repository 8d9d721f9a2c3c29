pub mod batch;
pub mod config;
pub mod error;
pub mod listing;
pub mod models;
pub mod orchestrator;
pub mod pacing;
pub mod traits;
pub mod util;

#[cfg(test)]
pub mod testutil;

pub use config::CrawlConfig;
pub use error::AppError;
pub use listing::{ListingReport, ListingService};
pub use models::{BatchReport, FetchOutcome, Movie, PersistOutcome, ProxyHandle, Stock, WorkItem};
pub use orchestrator::{BatchOrchestrator, CrawlReporter, ItemReport, RunSummary, TracingCrawlReporter};
pub use traits::{BatchStore, Extractor, Fetcher, ListingExtractor, ProxyBroker, RecordStore};
