//! Durable storage backends
//!
//! The merge engine talks to storage through the [`Warehouse`] trait so
//! merge semantics can be tested against an in-memory backend. The
//! production backend is Postgres with one table per category, each keyed
//! on `identity_key`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentivol_common::{CanonicalRecord, Category};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse unavailable: {0}")]
    Unavailable(String),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for WarehouseError {
    fn from(e: sqlx::Error) -> Self {
        WarehouseError::Unavailable(e.to_string())
    }
}

/// Merge target contract. Both operations are idempotent per record:
/// replaying a batch that already landed changes nothing and reports
/// zero effects.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Insert records whose identity key is not yet present. Returns the
    /// number of rows actually inserted.
    async fn insert_if_absent(
        &self,
        category: Category,
        records: &[CanonicalRecord],
    ) -> Result<u64, WarehouseError>;

    /// Overwrite existing rows whose stored `event_time` is strictly older
    /// than the incoming record's. The stored `observed_at` (first-seen
    /// time) is preserved. Returns the number of rows updated.
    async fn update_if_newer(
        &self,
        category: Category,
        records: &[CanonicalRecord],
    ) -> Result<u64, WarehouseError>;
}

// ============================================================================
// Postgres backend
// ============================================================================

pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub async fn connect(database_url: &str) -> Result<Self, WarehouseError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), WarehouseError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| WarehouseError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn insert_if_absent(
        &self,
        category: Category,
        records: &[CanonicalRecord],
    ) -> Result<u64, WarehouseError> {
        if records.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "INSERT INTO {} (identity_key, source, observed_at, event_time, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (identity_key) DO NOTHING",
            category.table()
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for record in records {
            let payload = serde_json::to_value(&record.payload)?;
            let result = sqlx::query(&sql)
                .bind(&record.identity_key)
                .bind(record.source.as_str())
                .bind(record.observed_at)
                .bind(record.event_time)
                .bind(payload)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        debug!(table = category.table(), inserted, "insert-if-absent done");
        Ok(inserted)
    }

    async fn update_if_newer(
        &self,
        category: Category,
        records: &[CanonicalRecord],
    ) -> Result<u64, WarehouseError> {
        if records.is_empty() {
            return Ok(0);
        }
        // Strictly-newer guard keeps replays and equal revisions no-ops;
        // observed_at is deliberately not touched.
        let sql = format!(
            "UPDATE {} SET payload = $2, event_time = $3 \
             WHERE identity_key = $1 \
               AND event_time IS NOT NULL AND $3 IS NOT NULL \
               AND event_time < $3",
            category.table()
        );

        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;
        for record in records {
            let payload = serde_json::to_value(&record.payload)?;
            let result = sqlx::query(&sql)
                .bind(&record.identity_key)
                .bind(payload)
                .bind(record.event_time)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;

        debug!(table = category.table(), updated, "update-if-newer done");
        Ok(updated)
    }
}

// ============================================================================
// In-memory backend (tests, dry runs)
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredRow {
    pub identity_key: String,
    pub observed_at: DateTime<Utc>,
    pub event_time: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct MemState {
    tables: HashMap<Category, HashMap<String, StoredRow>>,
    ops_until_failure: Option<u64>,
}

/// Hash-map warehouse with the same merge semantics as Postgres. Supports
/// injected failure after N operations for resilience tests.
#[derive(Default)]
pub struct MemWarehouse {
    state: Mutex<MemState>,
}

impl MemWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the operation after the next `n` fail once with
    /// `Unavailable`; subsequent operations recover.
    pub async fn fail_after(&self, n: u64) {
        self.state.lock().await.ops_until_failure = Some(n);
    }

    pub async fn rows(&self, category: Category) -> Vec<StoredRow> {
        let state = self.state.lock().await;
        state
            .tables
            .get(&category)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get(&self, category: Category, identity_key: &str) -> Option<StoredRow> {
        let state = self.state.lock().await;
        state
            .tables
            .get(&category)
            .and_then(|t| t.get(identity_key))
            .cloned()
    }

    fn check_failure(state: &mut MemState) -> Result<(), WarehouseError> {
        match state.ops_until_failure {
            Some(0) => {
                state.ops_until_failure = None;
                Err(WarehouseError::Unavailable("injected failure".into()))
            },
            Some(n) => {
                state.ops_until_failure = Some(n - 1);
                Ok(())
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Warehouse for MemWarehouse {
    async fn insert_if_absent(
        &self,
        category: Category,
        records: &[CanonicalRecord],
    ) -> Result<u64, WarehouseError> {
        let mut state = self.state.lock().await;
        Self::check_failure(&mut state)?;
        let table = state.tables.entry(category).or_default();
        let mut inserted = 0;
        for record in records {
            if table.contains_key(&record.identity_key) {
                continue;
            }
            table.insert(
                record.identity_key.clone(),
                StoredRow {
                    identity_key: record.identity_key.clone(),
                    observed_at: record.observed_at,
                    event_time: record.event_time,
                    payload: serde_json::to_value(&record.payload)?,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update_if_newer(
        &self,
        category: Category,
        records: &[CanonicalRecord],
    ) -> Result<u64, WarehouseError> {
        let mut state = self.state.lock().await;
        Self::check_failure(&mut state)?;
        let table = state.tables.entry(category).or_default();
        let mut updated = 0;
        for record in records {
            let Some(row) = table.get_mut(&record.identity_key) else {
                continue;
            };
            let (Some(stored), Some(incoming)) = (row.event_time, record.event_time) else {
                continue;
            };
            if stored < incoming {
                row.event_time = Some(incoming);
                row.payload = serde_json::to_value(&record.payload)?;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
