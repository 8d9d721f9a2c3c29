use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::subject_id;

/// One unit of crawl input, tracked through fetch → extract → persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Source locator (page URL).
    pub locator: String,
    /// Numeric identity parsed from the locator, when it carries one.
    pub key: Option<i64>,
}

impl WorkItem {
    /// Build a work item, deriving the identity key from the locator.
    pub fn new(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        let key = subject_id(&locator);
        Self { locator, key }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator)
    }
}

/// Why a target refused to serve content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Anti-bot interstitial, either inline or via redirect to the block host.
    AntiBot,
    /// HTTP 403 / 418.
    Forbidden,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::AntiBot => "anti-bot",
            BlockReason::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ok { body: String, status: u16 },
    NotFound,
    Blocked(BlockReason),
    TransientError(String),
    FatalError(String),
}

impl FetchOutcome {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Ok { .. } => "ok",
            FetchOutcome::NotFound => "not_found",
            FetchOutcome::Blocked(_) => "blocked",
            FetchOutcome::TransientError(_) => "transient_error",
            FetchOutcome::FatalError(_) => "fatal_error",
        }
    }

    /// Returns true if another attempt may produce a different result.
    ///
    /// `NotFound` is a confirmed absence and `Ok` is already a success.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchOutcome::Blocked(_)
                | FetchOutcome::TransientError(_)
                | FetchOutcome::FatalError(_)
        )
    }
}

/// Result of persisting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Created,
    /// The identity or secondary key already existed. For upsert stores
    /// this also covers "existed and was refreshed".
    Duplicate,
    Failed(String),
}

impl PersistOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistOutcome::Created => "created",
            PersistOutcome::Duplicate => "duplicate",
            PersistOutcome::Failed(_) => "failed",
        }
    }
}

/// Counts reported by a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub created: u64,
    pub duplicate: u64,
    pub failed: u64,
}

/// A proxy address handed out by a broker.
///
/// Validity is established once per acquisition; handles are not shared
/// between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHandle {
    pub address: String,
}

impl ProxyHandle {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Proxy URL suitable for an HTTP client (`http://host:port`).
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}", self.address)
        }
    }
}

/// A movie subject page.
///
/// `url` is the secondary key; storage rejects duplicates of it or of `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub year: String,
    pub director: String,
    pub rating: Option<f64>,
    pub url: String,
}

impl Movie {
    /// Identity present and every required field non-empty.
    pub fn is_valid(&self) -> bool {
        self.id > 0
            && !self.title.trim().is_empty()
            && !self.year.trim().is_empty()
            && !self.director.trim().is_empty()
            && !self.url.trim().is_empty()
    }
}

/// A listed stock. `symbol` is the secondary key; storage upserts on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub name: String,
    pub category: String,
}

impl Stock {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            category: category.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.symbol.trim().is_empty()
            && !self.name.trim().is_empty()
            && !self.category.trim().is_empty()
    }
}
