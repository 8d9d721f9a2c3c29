use std::collections::HashMap;

use crate::models::BatchReport;
use crate::traits::Record;

/// A batch ready for a single upsert statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch<R> {
    /// Valid rows, unique by secondary key, in first-seen order.
    pub rows: Vec<R>,
    /// Deduplicated rows dropped for missing required fields.
    pub discarded: usize,
}

impl<R: Record> PreparedBatch<R> {
    /// Deduplicate by secondary key, then drop invalid rows.
    ///
    /// On an intra-batch collision the last occurrence wins, even when it is
    /// the invalid one.
    pub fn prepare(records: &[R]) -> Self {
        let mut latest: Vec<&R> = Vec::with_capacity(records.len());
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(records.len());

        for record in records {
            match positions.get(record.secondary_key()) {
                Some(&pos) => latest[pos] = record,
                None => {
                    positions.insert(record.secondary_key(), latest.len());
                    latest.push(record);
                }
            }
        }

        let unique = latest.len();
        let rows: Vec<R> = latest
            .into_iter()
            .filter(|r| r.is_valid())
            .cloned()
            .collect();
        let discarded = unique - rows.len();

        Self { rows, discarded }
    }

    pub fn keys(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.secondary_key().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Counts for a batch where `existing` keys were already stored.
    pub fn report(&self, existing: usize) -> BatchReport {
        let existing = existing.min(self.rows.len());
        BatchReport {
            created: (self.rows.len() - existing) as u64,
            duplicate: existing as u64,
            failed: self.discarded as u64,
        }
    }
}
