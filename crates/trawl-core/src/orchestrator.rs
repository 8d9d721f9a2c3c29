//! Batch crawl orchestration.
//!
//! Drives a fixed list of [`WorkItem`]s through fetch → extract → persist
//! with two independent throttles: a permit pool bounding in-flight
//! attempts, and a per-item pacing delay bounding request rate.
//!
//! Each item runs in its own task and owns its result slot. Failures never
//! escape an item: every terminal state resolves to an [`ItemReport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::CrawlConfig;
use crate::models::{BlockReason, FetchOutcome, PersistOutcome, WorkItem};
use crate::traits::{Extraction, Extractor, Fetcher, ProxyBroker, Record, RecordStore};
use crate::util::excerpt;

/// Characters of body logged when an extraction comes back incomplete.
const EXCERPT_CHARS: usize = 500;

/// Events emitted by the orchestrator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    RunStarted {
        run_id: &'a str,
        items: usize,
        concurrency: usize,
    },
    ProxyUnavailable {
        locator: &'a str,
    },
    AttemptStarted {
        locator: &'a str,
        attempt: u32,
        max_attempts: u32,
        proxy: Option<&'a str>,
    },
    Persisted {
        locator: &'a str,
        identity: &'a str,
        outcome: &'a PersistOutcome,
    },
    NotFound {
        locator: &'a str,
    },
    Blocked {
        locator: &'a str,
        reason: BlockReason,
    },
    Incomplete {
        locator: &'a str,
        missing: &'a [&'static str],
        excerpt: &'a str,
    },
    AttemptFailed {
        locator: &'a str,
        attempt: u32,
        max_attempts: u32,
        reason: &'a str,
        will_retry: bool,
    },
    ItemFailed {
        locator: &'a str,
        attempts: u32,
    },
    ItemAborted {
        error: &'a str,
    },
    RunFinished {
        summary: &'a RunSummary,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::RunStarted {
                run_id,
                items,
                concurrency,
            } => {
                tracing::info!(%run_id, %items, %concurrency, "Crawl started");
            }
            CrawlEvent::ProxyUnavailable { locator } => {
                tracing::warn!(url = %locator, "No valid proxy, fetching directly");
            }
            CrawlEvent::AttemptStarted {
                locator,
                attempt,
                max_attempts,
                proxy,
            } => {
                tracing::debug!(url = %locator, %attempt, %max_attempts, ?proxy, "Fetching");
            }
            CrawlEvent::Persisted {
                locator,
                identity,
                outcome,
            } => {
                let label = outcome.as_str();
                match outcome {
                    PersistOutcome::Created => {
                        tracing::info!(url = %locator, %identity, outcome = label, "Inserted");
                    }
                    PersistOutcome::Duplicate => {
                        tracing::info!(url = %locator, %identity, outcome = label, "Already stored");
                    }
                    PersistOutcome::Failed(error) => {
                        tracing::error!(url = %locator, %identity, outcome = label, %error, "Insert failed");
                    }
                }
            }
            CrawlEvent::NotFound { locator } => {
                tracing::warn!(url = %locator, outcome = "not_found", "Page does not exist");
            }
            CrawlEvent::Blocked { locator, reason } => {
                tracing::warn!(url = %locator, outcome = "blocked", %reason, "Blocked by target");
            }
            CrawlEvent::Incomplete {
                locator,
                missing,
                excerpt,
            } => {
                tracing::debug!(url = %locator, ?missing, %excerpt, "Parsed data missing fields");
            }
            CrawlEvent::AttemptFailed {
                locator,
                attempt,
                max_attempts,
                reason,
                will_retry,
            } => {
                tracing::warn!(
                    url = %locator,
                    %attempt,
                    %max_attempts,
                    %reason,
                    %will_retry,
                    "Attempt failed"
                );
            }
            CrawlEvent::ItemFailed { locator, attempts } => {
                tracing::error!(url = %locator, %attempts, outcome = "failed", "Final fail");
            }
            CrawlEvent::ItemAborted { error } => {
                tracing::error!(%error, "Item task aborted");
            }
            CrawlEvent::RunFinished { summary } => {
                tracing::info!(
                    run_id = %summary.run_id,
                    total = %summary.total,
                    created = %summary.created,
                    duplicate = %summary.duplicate,
                    persist_failed = %summary.persist_failed,
                    not_found = %summary.not_found,
                    exhausted = %summary.exhausted,
                    cancelled = %summary.cancelled,
                    aborted = %summary.aborted,
                    elapsed_ms = %summary.elapsed.as_millis(),
                    "Crawl finished"
                );
            }
        }
    }
}

/// Terminal state of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Created,
    Duplicate,
    PersistFailed,
    NotFound,
    /// Every attempt failed (blocked, transient, fatal or incomplete).
    Exhausted,
    /// The run was cancelled before the item resolved.
    Cancelled,
    /// The item task panicked.
    Aborted,
}

impl ItemStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Created | ItemStatus::Duplicate)
    }
}

/// What happened to one work item.
#[derive(Debug, Clone)]
pub struct ItemReport<R> {
    pub index: usize,
    pub locator: String,
    pub status: ItemStatus,
    /// Attempts actually made (0 if the item never got a permit).
    pub attempts: u32,
    pub record: Option<R>,
}

/// Aggregate counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub total: usize,
    pub created: usize,
    pub duplicate: usize,
    pub persist_failed: usize,
    pub not_found: usize,
    pub exhausted: usize,
    pub cancelled: usize,
    pub aborted: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_reports<R>(run_id: &str, reports: &[ItemReport<R>], elapsed: Duration) -> Self {
        let mut summary = RunSummary {
            run_id: run_id.to_string(),
            total: reports.len(),
            elapsed,
            ..Default::default()
        };
        for report in reports {
            match report.status {
                ItemStatus::Created => summary.created += 1,
                ItemStatus::Duplicate => summary.duplicate += 1,
                ItemStatus::PersistFailed => summary.persist_failed += 1,
                ItemStatus::NotFound => summary.not_found += 1,
                ItemStatus::Exhausted => summary.exhausted += 1,
                ItemStatus::Cancelled => summary.cancelled += 1,
                ItemStatus::Aborted => summary.aborted += 1,
            }
        }
        summary
    }

    /// Items that ended with a stored record (new or pre-existing).
    pub fn succeeded(&self) -> usize {
        self.created + self.duplicate
    }
}

/// Outcome of a single attempt.
enum Step<R> {
    Done(ItemStatus, Option<R>),
    Retry(String),
}

/// Components shared by every item task of a run.
struct Pipeline<P, F, E, S> {
    broker: P,
    fetcher: F,
    extractor: E,
    store: S,
    config: CrawlConfig,
}

impl<P, F, E, S> Pipeline<P, F, E, S>
where
    P: ProxyBroker,
    F: Fetcher,
    E: Extractor,
    S: RecordStore<E::Record>,
{
    /// Run the per-item retry loop, then pace.
    async fn process<WR: CrawlReporter>(
        &self,
        index: usize,
        item: WorkItem,
        permits: Arc<Semaphore>,
        cancel: CancellationToken,
        reporter: &WR,
    ) -> ItemReport<E::Record> {
        let max_attempts = self.config.attempts();
        let mut attempts = 0;
        let mut status = ItemStatus::Exhausted;
        let mut record = None;
        // The final attempt's permit is held through pacing.
        let mut held = None;

        for attempt in 1..=max_attempts {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    status = ItemStatus::Cancelled;
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        status = ItemStatus::Cancelled;
                        break;
                    }
                },
            };

            attempts = attempt;
            let step = self.attempt(&item, attempt, max_attempts, reporter).await;

            match step {
                Step::Done(done, value) => {
                    status = done;
                    record = value;
                    held = Some(permit);
                    break;
                }
                Step::Retry(reason) => {
                    let will_retry = attempt < max_attempts && !cancel.is_cancelled();
                    reporter.report(CrawlEvent::AttemptFailed {
                        locator: &item.locator,
                        attempt,
                        max_attempts,
                        reason: &reason,
                        will_retry,
                    });
                    if !will_retry {
                        if cancel.is_cancelled() && attempt < max_attempts {
                            status = ItemStatus::Cancelled;
                        }
                        held = Some(permit);
                        break;
                    }
                    drop(permit);
                    tokio::select! {
                        () = tokio::time::sleep(self.config.retry_delay) => {}
                        () = cancel.cancelled() => {
                            status = ItemStatus::Cancelled;
                            break;
                        }
                    }
                }
            }
        }

        if status == ItemStatus::Exhausted {
            reporter.report(CrawlEvent::ItemFailed {
                locator: &item.locator,
                attempts,
            });
        }

        self.config.pacing.pause(&cancel).await;
        drop(held);

        ItemReport {
            index,
            locator: item.locator,
            status,
            attempts,
            record,
        }
    }

    async fn attempt<WR: CrawlReporter>(
        &self,
        item: &WorkItem,
        attempt: u32,
        max_attempts: u32,
        reporter: &WR,
    ) -> Step<E::Record> {
        let proxy = if self.config.use_proxy {
            let proxy = self.broker.acquire().await;
            if proxy.is_none() {
                reporter.report(CrawlEvent::ProxyUnavailable {
                    locator: &item.locator,
                });
            }
            proxy
        } else {
            None
        };

        reporter.report(CrawlEvent::AttemptStarted {
            locator: &item.locator,
            attempt,
            max_attempts,
            proxy: proxy.as_ref().map(|p| p.address.as_str()),
        });

        match self.fetcher.fetch(item, proxy.as_ref()).await {
            FetchOutcome::Ok { body, .. } => {
                let missing = match self.extractor.extract(&body, item) {
                    Extraction::Complete(record) if record.is_valid() => {
                        return self.persist(item, record, reporter).await;
                    }
                    Extraction::Complete(_) => Vec::new(),
                    Extraction::Incomplete { missing } => missing,
                };
                reporter.report(CrawlEvent::Incomplete {
                    locator: &item.locator,
                    missing: &missing,
                    excerpt: excerpt(&body, EXCERPT_CHARS),
                });
                Step::Retry("incomplete".to_string())
            }
            outcome if outcome.is_retryable() => {
                if let FetchOutcome::Blocked(reason) = &outcome {
                    reporter.report(CrawlEvent::Blocked {
                        locator: &item.locator,
                        reason: *reason,
                    });
                }
                Step::Retry(retry_reason(&outcome))
            }
            _ => {
                reporter.report(CrawlEvent::NotFound {
                    locator: &item.locator,
                });
                Step::Done(ItemStatus::NotFound, None)
            }
        }
    }

    async fn persist<WR: CrawlReporter>(
        &self,
        item: &WorkItem,
        record: E::Record,
        reporter: &WR,
    ) -> Step<E::Record> {
        let outcome = self.store.persist(&record).await;
        reporter.report(CrawlEvent::Persisted {
            locator: &item.locator,
            identity: &record.identity(),
            outcome: &outcome,
        });
        match outcome {
            PersistOutcome::Created => Step::Done(ItemStatus::Created, Some(record)),
            PersistOutcome::Duplicate => Step::Done(ItemStatus::Duplicate, Some(record)),
            PersistOutcome::Failed(_) => Step::Done(ItemStatus::PersistFailed, None),
        }
    }
}

fn retry_reason(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Blocked(reason) => format!("{} ({reason})", outcome.label()),
        FetchOutcome::TransientError(cause) | FetchOutcome::FatalError(cause) => {
            format!("{}: {cause}", outcome.label())
        }
        _ => outcome.label().to_string(),
    }
}

/// Runs a batch of work items under a concurrency cap with per-item retry.
pub struct BatchOrchestrator<P, F, E, S>
where
    P: ProxyBroker,
    F: Fetcher,
    E: Extractor,
    S: RecordStore<E::Record>,
{
    pipeline: Arc<Pipeline<P, F, E, S>>,
}

impl<P, F, E, S> BatchOrchestrator<P, F, E, S>
where
    P: ProxyBroker + 'static,
    F: Fetcher + 'static,
    E: Extractor + 'static,
    S: RecordStore<E::Record> + 'static,
{
    pub fn new(broker: P, fetcher: F, extractor: E, store: S, config: CrawlConfig) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                broker,
                fetcher,
                extractor,
                store,
                config,
            }),
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.pipeline.config
    }

    /// Crawl every item; the result at index `i` belongs to `items[i]`.
    pub async fn run<WR>(
        &self,
        items: Vec<WorkItem>,
        cancel: CancellationToken,
        reporter: WR,
    ) -> Vec<Option<E::Record>>
    where
        WR: CrawlReporter + Clone + 'static,
    {
        self.run_with_reports(items, cancel, reporter)
            .await
            .into_iter()
            .map(|report| report.record)
            .collect()
    }

    /// Crawl every item and return a full report per item, in input order.
    pub async fn run_with_reports<WR>(
        &self,
        items: Vec<WorkItem>,
        cancel: CancellationToken,
        reporter: WR,
    ) -> Vec<ItemReport<E::Record>>
    where
        WR: CrawlReporter + Clone + 'static,
    {
        let started = Instant::now();
        let config = &self.pipeline.config;
        reporter.report(CrawlEvent::RunStarted {
            run_id: &config.run_id,
            items: items.len(),
            concurrency: config.permits(),
        });

        let permits = Arc::new(Semaphore::new(config.permits()));
        let locators: Vec<String> = items.iter().map(|item| item.locator.clone()).collect();
        let mut slots: Vec<Option<ItemReport<E::Record>>> = Vec::with_capacity(items.len());
        slots.resize_with(items.len(), || None);

        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let reporter = reporter.clone();
            tasks.spawn(async move {
                pipeline
                    .process(index, item, permits, cancel, &reporter)
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    let index = report.index;
                    slots[index] = Some(report);
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(CrawlEvent::ItemAborted { error: &error });
                }
            }
        }

        let reports: Vec<ItemReport<E::Record>> = slots
            .into_iter()
            .zip(locators)
            .enumerate()
            .map(|(index, (slot, locator))| {
                slot.unwrap_or(ItemReport {
                    index,
                    locator,
                    status: ItemStatus::Aborted,
                    attempts: 0,
                    record: None,
                })
            })
            .collect();

        let summary = RunSummary::from_reports(&config.run_id, &reports, started.elapsed());
        reporter.report(CrawlEvent::RunFinished { summary: &summary });

        reports
    }
}
