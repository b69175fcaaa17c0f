use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{DateTime, Utc};
use db::models::audit_log::{AuditAction, AuditLogEntry, AuditLogQuery, BulkDeletion, ModuleSummary};
use serde::Deserialize;
use services::services::audit_trail::AuditPage;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const DEFAULT_ACTIVITY_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct AuditListParams {
    pub table_name: Option<String>,
    pub record_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub module: Option<String>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub page: Option<i64>,
}

impl AuditListParams {
    fn into_query(self) -> (AuditLogQuery, i64) {
        let query = AuditLogQuery {
            table_name: self.table_name,
            record_id: self.record_id,
            actor_id: self.actor_id,
            module: self.module,
            action: self.action,
            from: self.from,
            to: self.to,
            search: self.search.filter(|s| !s.trim().is_empty()),
        };
        (query, self.page.unwrap_or(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeletionParams {
    pub days: Option<i64>,
    pub threshold: Option<i64>,
}

/// GET /api/audit
pub async fn list_audit(
    State(state): State<AppState>,
    Query(params): Query<AuditListParams>,
) -> Result<ResponseJson<ApiResponse<AuditPage>>, ApiError> {
    let (query, page) = params.into_query();
    Ok(ResponseJson(ApiResponse::success(state.audit().list(&query, page).await?)))
}

/// GET /api/audit/records/{table_name}/{record_id}
pub async fn record_history(
    State(state): State<AppState>,
    Path((table_name, record_id)): Path<(String, Uuid)>,
    Query(params): Query<LimitParams>,
) -> Result<ResponseJson<ApiResponse<Vec<AuditLogEntry>>>, ApiError> {
    let entries = state
        .audit()
        .record_history(&table_name, record_id, params.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// GET /api/audit/actors/{actor_id}
pub async fn user_activity(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
    Query(params): Query<ActivityParams>,
) -> Result<ResponseJson<ApiResponse<Vec<AuditLogEntry>>>, ApiError> {
    let entries = state
        .audit()
        .user_activity(actor_id, params.days.unwrap_or(DEFAULT_ACTIVITY_DAYS), params.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// GET /api/audit/bulk-deletions
pub async fn bulk_deletions(
    State(state): State<AppState>,
    Query(params): Query<BulkDeletionParams>,
) -> Result<ResponseJson<ApiResponse<Vec<BulkDeletion>>>, ApiError> {
    let groups = state
        .audit()
        .detect_bulk_deletions(params.days, params.threshold)
        .await?;
    Ok(ResponseJson(ApiResponse::success(groups)))
}

/// GET /api/audit/modules
pub async fn module_summary(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<ModuleSummary>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.audit().module_summary().await?)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/audit",
        Router::new()
            .route("/", get(list_audit))
            .route("/records/{table_name}/{record_id}", get(record_history))
            .route("/actors/{actor_id}", get(user_activity))
            .route("/bulk-deletions", get(bulk_deletions))
            .route("/modules", get(module_summary)),
    )
}
