//! Dedup-merge engine
//!
//! Reconciles a staged batch against its durable table in three steps:
//!
//! 1. collapse in-batch duplicates, keeping the record with the latest
//!    `observed_at` per identity key (last write wins on ties, so page
//!    order is the tiebreak),
//! 2. insert records whose key is absent,
//! 3. for revisable categories only, overwrite rows whose stored
//!    `event_time` is strictly older.
//!
//! Replaying the same batch is a no-op by construction.

use std::collections::HashMap;

use sentivol_common::CanonicalRecord;
use tracing::{debug, info};

use crate::staging::StagingBatch;
use crate::warehouse::{Warehouse, WarehouseError};

/// Counts reported by one merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Distinct identity keys after in-batch dedup.
    pub distinct: u64,
    pub inserted: u64,
    pub updated: u64,
}

pub struct MergeEngine;

impl MergeEngine {
    /// Collapse duplicates within a batch: one survivor per identity key,
    /// the one with the greatest `observed_at`. Later batch position wins
    /// ties. First-seen key order is preserved so merges are stable.
    pub fn dedup_latest(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, CanonicalRecord> = HashMap::new();

        for record in records {
            match latest.get(&record.identity_key) {
                Some(existing) if existing.observed_at > record.observed_at => {},
                _ => {
                    if !latest.contains_key(&record.identity_key) {
                        order.push(record.identity_key.clone());
                    }
                    latest.insert(record.identity_key.clone(), record);
                },
            }
        }

        order
            .into_iter()
            .filter_map(|key| latest.remove(&key))
            .collect()
    }

    /// Merge a staged batch into the warehouse.
    pub async fn merge(
        warehouse: &dyn Warehouse,
        batch: StagingBatch,
    ) -> Result<MergeOutcome, WarehouseError> {
        let category = batch.category();
        let run_id = batch.run_id();
        let staged = batch.len();

        let survivors = Self::dedup_latest(batch.into_records());
        let distinct = survivors.len() as u64;
        debug!(
            %run_id,
            table = category.table(),
            staged,
            distinct,
            "batch deduplicated"
        );

        let inserted = warehouse.insert_if_absent(category, &survivors).await?;

        let updated = if category.revisable() {
            warehouse.update_if_newer(category, &survivors).await?
        } else {
            0
        };

        info!(
            %run_id,
            table = category.table(),
            distinct,
            inserted,
            updated,
            "merge complete"
        );

        Ok(MergeOutcome {
            distinct,
            inserted,
            updated,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sentivol_common::{Category, Payload, Source};

    fn record(key: &str, observed_secs: i64, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            source: Source::NewsApi,
            category: Category::News,
            identity_key: key.to_string(),
            observed_at: Utc.timestamp_opt(observed_secs, 0).single().unwrap(),
            event_time: None,
            payload: Payload::Article {
                title: title.to_string(),
                description: String::new(),
                url: None,
                author: None,
            },
        }
    }

    fn title_of(r: &CanonicalRecord) -> &str {
        match &r.payload {
            Payload::Article { title, .. } => title,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dedup_keeps_latest_observation() {
        let survivors = MergeEngine::dedup_latest(vec![
            record("a", 100, "old"),
            record("b", 100, "only"),
            record("a", 200, "new"),
        ]);
        assert_eq!(survivors.len(), 2);
        assert_eq!(survivors[0].identity_key, "a");
        assert_eq!(title_of(&survivors[0]), "new");
        assert_eq!(survivors[1].identity_key, "b");
    }

    #[test]
    fn test_dedup_ties_favor_later_position() {
        let survivors = MergeEngine::dedup_latest(vec![
            record("a", 100, "first"),
            record("a", 100, "second"),
        ]);
        assert_eq!(survivors.len(), 1);
        assert_eq!(title_of(&survivors[0]), "second");
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let survivors = MergeEngine::dedup_latest(vec![
            record("c", 100, "c1"),
            record("a", 100, "a1"),
            record("c", 300, "c2"),
            record("b", 100, "b1"),
        ]);
        let keys: Vec<&str> = survivors.iter().map(|r| r.identity_key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dedup_empty_batch() {
        assert!(MergeEngine::dedup_latest(vec![]).is_empty());
    }
}
