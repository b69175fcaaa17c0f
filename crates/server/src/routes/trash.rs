use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::document::{Document, OwnerKind, OwnerRef};
use serde::Deserialize;
use services::services::documents::PurgeReport;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct DeleteRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct RestoreVersionsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, TS)]
pub struct PurgeRequest {
    /// Must be the literal `DELETE`
    pub confirmation: String,
    pub justification: String,
}

#[derive(Debug, Deserialize)]
pub struct TrashQuery {
    pub owner_kind: Option<OwnerKind>,
    pub owner_id: Option<Uuid>,
}

impl TrashQuery {
    fn owner(&self) -> Result<Option<OwnerRef>, ApiError> {
        match (self.owner_kind, self.owner_id) {
            (Some(kind), Some(id)) => Ok(Some(OwnerRef::new(kind, id))),
            (None, None) => Ok(None),
            _ => Err(ApiError::BadRequest(
                "owner_kind and owner_id must be given together".to_string(),
            )),
        }
    }
}

/// GET /api/trash
pub async fn list_trash(
    State(state): State<AppState>,
    Query(query): Query<TrashQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    let documents = state.documents().list_trash(query.owner()?).await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

/// POST /api/documents/{id}/trash moves the whole document to the trash
pub async fn soft_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<DeleteRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let document = state.documents().soft_delete(id, &actor, &payload.reason).await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// POST /api/versions/{id}/trash moves a single version to the trash
pub async fn soft_delete_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<DeleteRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let document = state
        .documents()
        .soft_delete_version(id, &actor, &payload.reason)
        .await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// POST /api/trash/{id}/restore
pub async fn restore(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.documents().restore(id, &actor).await?)))
}

/// POST /api/trash/restore
pub async fn restore_versions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<RestoreVersionsRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    let documents = state.documents().restore_versions(&payload.ids, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

/// POST /api/trash/{id}/purge
pub async fn purge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<PurgeRequest>,
) -> Result<ResponseJson<ApiResponse<PurgeReport>>, ApiError> {
    let report = state
        .documents()
        .purge_permanently(id, &payload.confirmation, &payload.justification, &actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trash", get(list_trash))
        .route("/trash/restore", post(restore_versions))
        .route("/trash/{id}/restore", post(restore))
        .route("/trash/{id}/purge", post(purge))
        .route("/documents/{id}/trash", post(soft_delete))
        .route("/versions/{id}/trash", post(soft_delete_version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trash_owner_must_be_complete() {
        let query = TrashQuery {
            owner_kind: Some(OwnerKind::Housing),
            owner_id: None,
        };
        assert!(matches!(query.owner(), Err(ApiError::BadRequest(_))));

        let query = TrashQuery {
            owner_kind: None,
            owner_id: None,
        };
        assert!(query.owner().unwrap().is_none());
    }
}
