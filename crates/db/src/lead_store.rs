//! Bounded local lead log backed by SQLite.
//!
//! The log keeps only the newest [`RETAIN_LIMIT`] leads. Eviction happens in
//! the same transaction as the insert, so readers never observe the log above
//! its cap or an insert without its matching trim.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use thiserror::Error;
use tracing::warn;

use leadline_core::lead::{
    iso8601, LeadDraft, LeadRecord, LeadSource, Priority, DEFAULT_NAME, DEFAULT_STATUS,
};

use crate::DbPool;

pub const RETAIN_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Commits a draft to the log, assigning its id and `created_at`, and
    /// evicts entries beyond the retention cap.
    async fn append(&self, draft: &LeadDraft) -> Result<LeadRecord, StoreError>;

    /// Retained leads, newest first.
    async fn list_recent(&self) -> Result<Vec<LeadRecord>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<LeadRecord>, StoreError>;

    /// Read path used by query surfaces: a broken local log must not take
    /// the merged view down with it.
    async fn list_recent_or_empty(&self) -> Vec<LeadRecord> {
        match self.list_recent().await {
            Ok(leads) => leads,
            Err(error) => {
                warn!(event_name = "lead_store.read_degraded", error = %error);
                Vec::new()
            }
        }
    }
}

pub struct SqlLeadStore {
    pool: DbPool,
}

impl SqlLeadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for SqlLeadStore {
    async fn append(&self, draft: &LeadDraft) -> Result<LeadRecord, StoreError> {
        let now = Utc::now();
        let base_nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_millis());
        let created_at = iso8601(&now);

        // Ids are derived from the append instant. Two appends landing on
        // the same nanosecond collide on the primary key; bump and retry.
        for attempt in 0..3_i64 {
            let record = LeadRecord {
                id: format!("local-{}", base_nanos + attempt),
                name: draft.display_name().to_string(),
                phone: draft.phone.clone().filter(|phone| !phone.trim().is_empty()),
                intent: draft.display_intent().to_string(),
                original_text: draft.original_text.clone().unwrap_or_default(),
                status: DEFAULT_STATUS.to_string(),
                priority: Priority::Normal,
                created_at: created_at.clone(),
                updated_at: None,
                source: LeadSource::Local,
                url: None,
            };

            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query(
                "INSERT INTO lead (id, name, phone, intent, original_text, status, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&record.id)
            .bind(&record.name)
            .bind(&record.phone)
            .bind(&record.intent)
            .bind(&record.original_text)
            .bind(&record.status)
            .bind(record.priority.as_str())
            .bind(&record.created_at)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(error) if is_unique_violation(&error) => {
                    tx.rollback().await?;
                    continue;
                }
                Err(error) => return Err(error.into()),
            }

            sqlx::query(
                "DELETE FROM lead
                 WHERE rowid NOT IN (SELECT rowid FROM lead ORDER BY rowid DESC LIMIT ?1)",
            )
            .bind(RETAIN_LIMIT)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            return Ok(record);
        }

        Err(StoreError::Decode("could not assign a unique lead id".to_string()))
    }

    async fn list_recent(&self) -> Result<Vec<LeadRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, phone, intent, original_text, status, priority, created_at
             FROM lead ORDER BY rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LeadRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, phone, intent, original_text, status, priority, created_at
             FROM lead WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LeadRecord, StoreError> {
    let priority_label: String = row.get("priority");
    let priority = priority_label.parse::<Priority>().unwrap_or_default();

    Ok(LeadRecord {
        id: row.get("id"),
        name: row.try_get("name").unwrap_or_else(|_| DEFAULT_NAME.to_string()),
        phone: row.get("phone"),
        intent: row.get("intent"),
        original_text: row.get("original_text"),
        status: row.get("status"),
        priority,
        created_at: row.get("created_at"),
        updated_at: None,
        source: LeadSource::Local,
        url: None,
    })
}

#[cfg(test)]
mod tests {
    use leadline_core::lead::LeadDraft;

    use super::{LeadStore, SqlLeadStore, RETAIN_LIMIT};
    use crate::connect_with_settings;
    use crate::migrations::run_pending;

    async fn store() -> SqlLeadStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        SqlLeadStore::new(pool)
    }

    fn draft(name: &str) -> LeadDraft {
        LeadDraft {
            name: Some(name.to_string()),
            phone: Some("0501234567".to_string()),
            intent: Some("Rent".to_string()),
            original_text: Some(format!("{name} wants to rent")),
        }
    }

    #[tokio::test]
    async fn append_assigns_id_and_timestamp() {
        let store = store().await;

        let record = store.append(&draft("Ali")).await.expect("append");
        assert!(record.id.starts_with("local-"));
        assert!(!record.created_at.is_empty());
        assert_eq!(record.status, "TO DO");

        let found = store.find_by_id(&record.id).await.expect("lookup");
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn append_defaults_missing_fields() {
        let store = store().await;

        let record = store.append(&LeadDraft::default()).await.expect("append");
        assert_eq!(record.name, "Unknown");
        assert_eq!(record.intent, "General Inquiry");
        assert_eq!(record.phone, None);
    }

    #[tokio::test]
    async fn log_retains_only_the_newest_entries() {
        let store = store().await;

        let mut appended_ids = Vec::new();
        for index in 0..150 {
            let record = store.append(&draft(&format!("Lead {index}"))).await.expect("append");
            appended_ids.push(record.id);
        }

        let retained = store.list_recent().await.expect("list");
        assert_eq!(retained.len(), RETAIN_LIMIT as usize);

        // Newest first, and exactly the last 100 appends survive.
        let expected: Vec<&String> = appended_ids.iter().rev().take(100).collect();
        let actual: Vec<&String> = retained.iter().map(|lead| &lead.id).collect();
        assert_eq!(actual, expected);

        let evicted = &appended_ids[0];
        assert_eq!(store.find_by_id(evicted).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn ids_are_unique_across_rapid_appends() {
        let store = store().await;

        let first = store.append(&draft("Ali")).await.expect("append");
        let second = store.append(&draft("Omar")).await.expect("append");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn missing_id_lookup_returns_none() {
        let store = store().await;
        assert_eq!(store.find_by_id("local-0").await.expect("lookup"), None);
    }
}
