//! Read side of the audit log: paged listing, record history, per-user activity and
//! bulk-deletion detection.

use chrono::{DateTime, TimeDelta, Utc};
use db::{
    DBService,
    models::audit_log::{AuditLogEntry, AuditLogQuery, BulkDeletion, ModuleSummary},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

pub const AUDIT_PAGE_SIZE: i64 = 50;

const DEFAULT_HISTORY_LIMIT: i64 = 100;
const DEFAULT_BULK_WINDOW_DAYS: i64 = 7;
const DEFAULT_BULK_THRESHOLD: i64 = 5;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid audit query: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AuditPage {
    pub items: Vec<AuditLogEntry>,
    pub total: i64,
    /// 1-based
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Clone)]
pub struct AuditTrail {
    db: DBService,
}

impl AuditTrail {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Page `page` (1-based) of matching entries, newest first.
    pub async fn list(&self, query: &AuditLogQuery, page: i64) -> Result<AuditPage, AuditError> {
        if page < 1 {
            return Err(AuditError::InvalidQuery("page must be at least 1".to_string()));
        }
        if matches!((query.from, query.to), (Some(from), Some(to)) if from > to) {
            return Err(AuditError::InvalidQuery("from must not be after to".to_string()));
        }

        let offset = (page - 1)
            .checked_mul(AUDIT_PAGE_SIZE)
            .ok_or_else(|| AuditError::InvalidQuery(format!("page {page} is out of range")))?;
        let (items, total) = AuditLogEntry::search(&self.db.pool, query, AUDIT_PAGE_SIZE, offset).await?;
        debug!(page, total, returned = items.len(), "Audit page loaded");

        Ok(AuditPage {
            items,
            total,
            page,
            total_pages: (total + AUDIT_PAGE_SIZE - 1) / AUDIT_PAGE_SIZE,
        })
    }

    /// Full history of one record, newest first.
    pub async fn record_history(
        &self,
        table_name: &str,
        record_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
        Ok(AuditLogEntry::find_by_record(&self.db.pool, table_name, record_id, limit).await?)
    }

    pub async fn user_activity(
        &self,
        actor_id: Uuid,
        days: i64,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        if days < 0 {
            return Err(AuditError::InvalidQuery("days must not be negative".to_string()));
        }
        let since = days_ago(days)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
        Ok(AuditLogEntry::find_by_actor_since(&self.db.pool, actor_id, since, limit).await?)
    }

    /// Day/actor/table groups with at least `threshold` deletions in the last `days` days.
    pub async fn detect_bulk_deletions(
        &self,
        days: Option<i64>,
        threshold: Option<i64>,
    ) -> Result<Vec<BulkDeletion>, AuditError> {
        let days = days.unwrap_or(DEFAULT_BULK_WINDOW_DAYS).max(0);
        let threshold = threshold.unwrap_or(DEFAULT_BULK_THRESHOLD).max(1);
        let since = days_ago(days)?;
        Ok(AuditLogEntry::bulk_deletions_since(&self.db.pool, since, threshold).await?)
    }

    pub async fn module_summary(&self) -> Result<Vec<ModuleSummary>, AuditError> {
        Ok(AuditLogEntry::module_summary(&self.db.pool).await?)
    }
}

fn days_ago(days: i64) -> Result<DateTime<Utc>, AuditError> {
    TimeDelta::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| AuditError::InvalidQuery(format!("{days} days is out of range")))
}
