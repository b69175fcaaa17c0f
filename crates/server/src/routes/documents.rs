use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use db::models::document::{
    Document, DocumentFilter, OwnerKind, OwnerRef, UpdateDocumentDetails, VersionStatus,
};
use serde::Deserialize;
use services::services::documents::{FileUpload, NewDocument, VersionSummary};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

/// File content sent inline as base64
#[derive(Debug, Deserialize, TS)]
pub struct UploadPayload {
    pub file_name: String,
    pub mime_type: String,
    pub content_base64: String,
}

impl UploadPayload {
    fn into_upload(self) -> Result<FileUpload, ApiError> {
        let bytes = BASE64
            .decode(self.content_base64.trim())
            .map_err(|e| ApiError::BadRequest(format!("file content is not valid base64: {e}")))?;
        Ok(FileUpload::new(self.file_name, self.mime_type, bytes))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(flatten)]
    pub file: UploadPayload,
    #[serde(default)]
    pub details: NewDocument,
}

#[derive(Debug, Deserialize, TS)]
pub struct AddVersionRequest {
    #[serde(flatten)]
    pub file: UploadPayload,
    pub change_description: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct ReplaceFileRequest {
    #[serde(flatten)]
    pub file: UploadPayload,
    pub reason: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct MakeCurrentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
pub struct VersionStatusRequest {
    pub status: VersionStatus,
    #[serde(default)]
    pub reason: String,
    pub corrected_by_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

const DEFAULT_EXPIRING_DAYS: i64 = 30;

/// POST /api/owners/{kind}/{owner_id}/documents
pub async fn create_document(
    State(state): State<AppState>,
    Path((kind, owner_id)): Path<(OwnerKind, Uuid)>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<CreateDocumentRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let upload = payload.file.into_upload()?;
    let document = state
        .documents()
        .create_document(OwnerRef::new(kind, owner_id), upload, payload.details, &actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// GET /api/owners/{kind}/{owner_id}/documents
pub async fn list_documents(
    State(state): State<AppState>,
    Path((kind, owner_id)): Path<(OwnerKind, Uuid)>,
    Query(filter): Query<DocumentFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    let documents = state
        .documents()
        .list_active(OwnerRef::new(kind, owner_id), &filter)
        .await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

/// GET /api/owners/{kind}/{owner_id}/documents/archived
pub async fn list_archived(
    State(state): State<AppState>,
    Path((kind, owner_id)): Path<(OwnerKind, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    let documents = state.documents().list_archived(OwnerRef::new(kind, owner_id)).await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

/// GET /api/documents/expiring?days=30
pub async fn list_expiring(
    State(state): State<AppState>,
    Query(query): Query<ExpiringQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    let documents = state
        .documents()
        .list_expiring(query.days.unwrap_or(DEFAULT_EXPIRING_DAYS))
        .await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.documents().get(id).await?)))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(patch): axum::Json<UpdateDocumentDetails>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let document = state.documents().update_details(id, patch, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// GET /api/documents/{id}/download
pub async fn download_document(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    let (document, bytes) = state.documents().download(id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.original_name.replace(['"', '\\', '\r', '\n'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, document.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/documents/{id}/versions
pub async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.documents().list_versions(id).await?)))
}

/// POST /api/documents/{id}/versions
pub async fn add_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<AddVersionRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let upload = payload.file.into_upload()?;
    let document = state
        .documents()
        .add_version(id, upload, &payload.change_description, &actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// POST /api/documents/{id}/replace overwrites the file of this version, keeping a backup
pub async fn replace_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<ReplaceFileRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let upload = payload.file.into_upload()?;
    let document = state
        .documents()
        .replace_file(id, upload, &payload.reason, &actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

pub async fn list_deleted_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        state.documents().list_deleted_versions(id).await?,
    )))
}

pub async fn version_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<VersionSummary>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.documents().version_summary(id).await?)))
}

/// POST /api/documents/{id}/make-current
pub async fn make_current(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<MakeCurrentRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let document = state.documents().restore_version(id, &actor, payload.reason).await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// POST /api/documents/{id}/status marks a version erroneous or obsolete
pub async fn mark_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
    axum::Json(payload): axum::Json<VersionStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let document = state
        .documents()
        .mark_version_status(id, payload.status, &payload.reason, payload.corrected_by_id, &actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

/// DELETE /api/documents/{id}/status resets the version to valid
pub async fn reset_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let document = state.documents().reset_version_status(id, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(document)))
}

pub async fn archive_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.documents().archive(id, &actor).await?)))
}

pub async fn unarchive_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CurrentActor(actor): CurrentActor,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.documents().unarchive(id, &actor).await?)))
}

pub fn router() -> Router<AppState> {
    let owner_routes = Router::new()
        .route("/", get(list_documents).post(create_document))
        .route("/archived", get(list_archived));

    let document_routes = Router::new()
        .route("/", get(get_document).patch(update_document))
        .route("/download", get(download_document))
        .route("/replace", post(replace_file))
        .route("/versions", get(list_versions).post(add_version))
        .route("/versions/deleted", get(list_deleted_versions))
        .route("/versions/summary", get(version_summary))
        .route("/make-current", post(make_current))
        .route("/status", post(mark_status).delete(reset_status))
        .route("/archive", post(archive_document))
        .route("/unarchive", post(unarchive_document));

    Router::new()
        .nest("/owners/{kind}/{owner_id}/documents", owner_routes)
        .route("/documents/expiring", get(list_expiring))
        .nest("/documents/{id}", document_routes)
}
