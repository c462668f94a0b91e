//! libSQL implementation of the async `Database` trait.
//!
//! Supports local file and in-memory databases.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, NewResult, StoredResult};

const RESULT_COLUMNS: &str =
    "id, message_ref, intent, subject, message_date, details, processed_at";

/// Intent label sorted ahead of everything else on the dashboard.
const PINNED_INTENT: &str = "schedule_meeting";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Parse a mail `Date` header. Returns `None` when absent or malformed.
fn parse_message_date(date: Option<&str>) -> Option<DateTime<Utc>> {
    let date = date?.trim();
    DateTime::parse_from_rfc2822(date)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Dashboard ordering: pinned intent first, then message date ascending
/// with unparseable dates last, then processing time.
fn dashboard_order(a: &StoredResult, b: &StoredResult) -> Ordering {
    let pinned = |r: &StoredResult| if r.intent == PINNED_INTENT { 0 } else { 1 };
    let date_a = parse_message_date(a.date.as_deref());
    let date_b = parse_message_date(b.date.as_deref());

    pinned(a)
        .cmp(&pinned(b))
        .then_with(|| match (date_a, date_b) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.processed_at.cmp(&b.processed_at))
}

fn row_to_result(row: &libsql::Row) -> Result<StoredResult, libsql::Error> {
    let details_str: String = row.get(5)?;
    let processed_str: String = row.get(6)?;

    Ok(StoredResult {
        id: row.get(0)?,
        message_ref: row.get(1)?,
        intent: row.get(2)?,
        subject: row.get(3).ok(),
        date: row.get(4).ok(),
        details: serde_json::from_str(&details_str)
            .unwrap_or(serde_json::Value::String(details_str)),
        processed_at: parse_datetime(&processed_str),
    })
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn append_result(&self, result: &NewResult) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let details = serde_json::to_string(&result.details)
            .map_err(|e| DatabaseError::Serialization(format!("details: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO processed_emails (id, message_ref, intent, subject, message_date,
                    details, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.clone(),
                    result.message_ref.as_str(),
                    result.intent.as_str(),
                    opt_text(result.subject.as_deref()),
                    opt_text(result.date.as_deref()),
                    details,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DatabaseError::Constraint(format!(
                        "result for message {} already stored",
                        result.message_ref
                    ))
                } else {
                    DatabaseError::Query(format!("append_result: {e}"))
                }
            })?;

        debug!(id = %id, message_ref = %result.message_ref, intent = %result.intent, "Result stored");
        Ok(id)
    }

    async fn is_processed(&self, message_ref: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM processed_emails WHERE message_ref = ?1",
                params![message_ref],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("is_processed: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("is_processed row: {e}")))?;
                Ok(count > 0)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("is_processed: {e}"))),
        }
    }

    /// Loads every row, then sorts and truncates in memory. The table is
    /// bounded by `prune_results`, so a full scan stays small.
    async fn list_results(&self, limit: usize) -> Result<Vec<StoredResult>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RESULT_COLUMNS} FROM processed_emails"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_results: {e}")))?;

        let mut results = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let result = row_to_result(&row)
                        .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                    results.push(result);
                }
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("list_results: {e}"))),
            }
        }

        // RFC 2822 dates cannot be ordered in SQL.
        results.sort_by(dashboard_order);
        results.truncate(limit);
        Ok(results)
    }

    async fn prune_results(&self, keep_days: u32) -> Result<u64, DatabaseError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(keep_days));
        let removed = self
            .conn()
            .execute(
                "DELETE FROM processed_emails WHERE processed_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_results: {e}")))?;

        info!(removed, keep_days, "Pruned old results");
        Ok(removed)
    }
}
