//! Embedded persistence for review outcomes and failure logs.
//!
//! A single SQLite file behind a `Mutex<Connection>`. That serialises
//! writers; reads go through the same lock, which is acceptable for this
//! workload (a handful of pipeline workers plus an operator browsing the
//! read API). The schema is applied idempotently at open, so a fresh path
//! and an existing database are handled the same way.
//!
//! IDs are `AUTOINCREMENT` rowids: strictly increasing per table, and a
//! reopened database continues from the persisted maximum.

pub mod errors;
pub mod models;

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

pub use errors::{StoreError, StoreResult};
pub use models::{
    EmailRecipients, EventType, FailureLog, FailureStage, NewFailureLog, NewReviewRecord, Page,
    ReviewRecord, ReviewType, TriggerType,
};

const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Listing limits are clamped into this window.
const LIMIT_MIN: i64 = 1;
const LIMIT_MAX: i64 = 100;

/// Handle to the embedded store. Cheap to share behind an `Arc`.
pub struct Store {
    conn: Mutex<Connection>,
}

/* ------------------------- small helpers ------------------------- */

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(LIMIT_MIN, LIMIT_MAX)
}

fn ms_to_instant(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRecord> {
    let recipients_json: Option<String> = row.get(12)?;
    let email_recipients = recipients_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());

    Ok(ReviewRecord {
        id: row.get(0)?,
        created_at: ms_to_instant(row.get(1)?),
        review_type: ReviewType::parse(&row.get::<_, String>(2)?).unwrap_or(ReviewType::Auto),
        trigger_type: TriggerType::parse(&row.get::<_, String>(3)?)
            .unwrap_or(TriggerType::Commit),
        project_key: row.get(4)?,
        repo_slug: row.get(5)?,
        commit_id: row.get(6)?,
        mr_id: row.get(7)?,
        author_name: row.get(8)?,
        author_email: row.get(9)?,
        diff_content: row.get(10)?,
        review_feedback: row.get(11)?,
        email_recipients,
        email_sent: row.get::<_, i64>(13)? != 0,
        llm_provider: row.get(14)?,
        llm_model: row.get(15)?,
    })
}

fn row_to_failure(row: &rusqlite::Row<'_>) -> rusqlite::Result<FailureLog> {
    let payload_json: Option<String> = row.get(4)?;
    let request_payload = payload_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());

    Ok(FailureLog {
        id: row.get(0)?,
        created_at: ms_to_instant(row.get(1)?),
        event_type: EventType::parse(&row.get::<_, String>(2)?).unwrap_or(EventType::Webhook),
        event_key: row.get(3)?,
        request_payload,
        project_key: row.get(5)?,
        repo_slug: row.get(6)?,
        commit_id: row.get(7)?,
        mr_id: row.get(8)?,
        author_name: row.get(9)?,
        author_email: row.get(10)?,
        failure_stage: FailureStage::parse(&row.get::<_, String>(11)?)
            .unwrap_or(FailureStage::IngressValidation),
        error_type: row.get(12)?,
        error_message: row.get(13)?,
        error_stacktrace: row.get(14)?,
        retry_count: row.get(15)?,
        resolved: row.get::<_, i64>(16)? != 0,
        resolution_notes: row.get(17)?,
    })
}

const REVIEW_COLUMNS: &str = "id, created_at_ms, review_type, trigger_type, project_key, \
     repo_slug, commit_id, mr_id, author_name, author_email, diff_content, review_feedback, \
     email_recipients, email_sent, llm_provider, llm_model";

const FAILURE_COLUMNS: &str = "id, created_at_ms, event_type, event_key, request_payload, \
     project_key, repo_slug, commit_id, mr_id, author_name, author_email, failure_stage, \
     error_type, error_message, error_stacktrace, retry_count, resolved, resolution_notes";

impl Store {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!(path, "review store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Cheap readiness probe for the health endpoint.
    pub fn ping(&self) -> StoreResult<()> {
        let conn = self.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement; the connection itself
        // is still usable for independent statements.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /* ---------------------- review records ---------------------- */

    /// Inserts a review outcome and returns the assigned id.
    ///
    /// Row invariants are enforced here so a violation surfaces as a
    /// `persistence` failure rather than a silently defective row.
    pub fn insert_review(&self, record: &NewReviewRecord) -> StoreResult<i64> {
        if record.project_key.trim().is_empty() || record.repo_slug.trim().is_empty() {
            return Err(StoreError::InvalidRecord("project_key and repo_slug must be non-empty"));
        }
        if record.diff_content.trim().is_empty() {
            return Err(StoreError::InvalidRecord("diff_content must be non-empty"));
        }
        if record.review_feedback.trim().is_empty() {
            return Err(StoreError::InvalidRecord("review_feedback must be non-empty"));
        }
        if record.commit_id.is_none() && record.mr_id.is_none() {
            return Err(StoreError::InvalidRecord("one of commit_id or mr_id is required"));
        }

        let recipients_json = record
            .email_recipients
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO review_records (created_at_ms, review_type, trigger_type, project_key, \
             repo_slug, commit_id, mr_id, author_name, author_email, diff_content, \
             review_feedback, email_recipients, email_sent, llm_provider, llm_model) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13, ?14)",
            params![
                Utc::now().timestamp_millis(),
                record.review_type.as_str(),
                record.trigger_type.as_str(),
                record.project_key,
                record.repo_slug,
                record.commit_id,
                record.mr_id,
                record.author_name,
                record.author_email,
                record.diff_content,
                record.review_feedback,
                recipients_json,
                record.llm_provider,
                record.llm_model,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, project = %record.project_key, "review record inserted");
        Ok(id)
    }

    /// Flips `email_sent` to true after a successful notification. The only
    /// review-record column that is ever updated.
    pub fn mark_email_sent(&self, id: i64) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute("UPDATE review_records SET email_sent = 1 WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub fn get_review(&self, id: i64) -> StoreResult<Option<ReviewRecord>> {
        let conn = self.lock();
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM review_records WHERE id = ?1");
        let row = conn.query_row(&sql, [id], row_to_review).optional()?;
        Ok(row)
    }

    /// Default ordering window: descending `created_at`, ties broken by
    /// descending id. `total` is the true table count.
    pub fn list_reviews(&self, offset: i64, limit: i64) -> StoreResult<Page<ReviewRecord>> {
        let limit = clamp_limit(limit);
        let offset = offset.max(0);
        let conn = self.lock();

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM review_records", [], |r| r.get(0))?;

        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM review_records \
             ORDER BY created_at_ms DESC, id DESC LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit, offset], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page { total, rows })
    }

    pub fn latest_reviews(&self, limit: i64) -> StoreResult<Vec<ReviewRecord>> {
        Ok(self.list_reviews(0, limit)?.rows)
    }

    pub fn reviews_by_project(
        &self,
        project_key: &str,
        repo_slug: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<ReviewRecord>> {
        let limit = clamp_limit(limit);
        let conn = self.lock();

        let rows = match repo_slug {
            Some(slug) => {
                let sql = format!(
                    "SELECT {REVIEW_COLUMNS} FROM review_records \
                     WHERE project_key = ?1 AND repo_slug = ?2 \
                     ORDER BY created_at_ms DESC, id DESC LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(params![project_key, slug, limit], row_to_review)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {REVIEW_COLUMNS} FROM review_records WHERE project_key = ?1 \
                     ORDER BY created_at_ms DESC, id DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(params![project_key, limit], row_to_review)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    pub fn reviews_by_author(&self, email: &str, limit: i64) -> StoreResult<Vec<ReviewRecord>> {
        let limit = clamp_limit(limit);
        let conn = self.lock();
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM review_records WHERE author_email = ?1 \
             ORDER BY created_at_ms DESC, id DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![email, limit], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn reviews_by_commit(&self, commit_id: &str) -> StoreResult<Vec<ReviewRecord>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM review_records WHERE commit_id = ?1 \
             ORDER BY created_at_ms DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![commit_id], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn reviews_by_mr(&self, mr_id: i64) -> StoreResult<Vec<ReviewRecord>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM review_records WHERE mr_id = ?1 \
             ORDER BY created_at_ms DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![mr_id], row_to_review)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /* ----------------------- failure logs ----------------------- */

    pub fn insert_failure(&self, log: &NewFailureLog) -> StoreResult<i64> {
        if log.error_type.trim().is_empty() || log.error_message.trim().is_empty() {
            return Err(StoreError::InvalidRecord("error_type and error_message must be non-empty"));
        }

        let payload_json = log
            .request_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO failure_logs (created_at_ms, event_type, event_key, request_payload, \
             project_key, repo_slug, commit_id, mr_id, author_name, author_email, failure_stage, \
             error_type, error_message, error_stacktrace, retry_count, resolved) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0)",
            params![
                Utc::now().timestamp_millis(),
                log.event_type.as_str(),
                log.event_key,
                payload_json,
                log.project_key,
                log.repo_slug,
                log.commit_id,
                log.mr_id,
                log.author_name,
                log.author_email,
                log.failure_stage.as_str(),
                log.error_type,
                log.error_message,
                log.error_stacktrace,
                log.retry_count,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, stage = log.failure_stage.as_str(), kind = %log.error_type, "failure logged");
        Ok(id)
    }

    pub fn get_failure(&self, id: i64) -> StoreResult<Option<FailureLog>> {
        let conn = self.lock();
        let sql = format!("SELECT {FAILURE_COLUMNS} FROM failure_logs WHERE id = ?1");
        let row = conn.query_row(&sql, [id], row_to_failure).optional()?;
        Ok(row)
    }

    pub fn list_failures(&self, offset: i64, limit: i64) -> StoreResult<Page<FailureLog>> {
        let limit = clamp_limit(limit);
        let offset = offset.max(0);
        let conn = self.lock();

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM failure_logs", [], |r| r.get(0))?;

        let sql = format!(
            "SELECT {FAILURE_COLUMNS} FROM failure_logs \
             ORDER BY created_at_ms DESC, id DESC LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit, offset], row_to_failure)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page { total, rows })
    }

    /// Out-of-band operator path: flag a failure as handled.
    pub fn mark_failure_resolved(&self, id: i64, notes: Option<&str>) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE failure_logs SET resolved = 1, resolution_notes = ?2 WHERE id = ?1",
            params![id, notes],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped_into_window() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(1), 1);
        assert_eq!(clamp_limit(50), 50);
        assert_eq!(clamp_limit(100), 100);
        assert_eq!(clamp_limit(1000), 100);
    }

    #[test]
    fn epoch_fallback_for_out_of_range_timestamps() {
        assert_eq!(ms_to_instant(0), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(ms_to_instant(i64::MAX), DateTime::<Utc>::UNIX_EPOCH);
    }
}
