//! In-process staging batch
//!
//! Normalized records accumulate here between the normalize and merge
//! phases. The batch is tied to a single run and a single category, so a
//! merge always reconciles exactly one table.

use chrono::{DateTime, Utc};
use sentivol_common::{CanonicalRecord, Category};
use uuid::Uuid;

#[derive(Debug)]
pub struct StagingBatch {
    run_id: Uuid,
    fetched_at: DateTime<Utc>,
    category: Category,
    records: Vec<CanonicalRecord>,
}

impl StagingBatch {
    pub fn new(run_id: Uuid, category: Category) -> Self {
        Self {
            run_id,
            fetched_at: Utc::now(),
            category,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: CanonicalRecord) {
        debug_assert_eq!(record.category, self.category);
        self.records.push(record);
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Batch fetch time, used as `observed_at` for every record staged in
    /// this run.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sentivol_common::{Payload, Source};

    fn record(key: &str) -> CanonicalRecord {
        CanonicalRecord {
            source: Source::NewsApi,
            category: Category::News,
            identity_key: key.to_string(),
            observed_at: Utc::now(),
            event_time: None,
            payload: Payload::Article {
                title: "t".into(),
                description: String::new(),
                url: None,
                author: None,
            },
        }
    }

    #[test]
    fn test_batch_accumulates_records() {
        let mut batch = StagingBatch::new(Uuid::new_v4(), Category::News);
        assert!(batch.is_empty());
        batch.push(record("a"));
        batch.push(record("b"));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records()[0].identity_key, "a");
    }
}
