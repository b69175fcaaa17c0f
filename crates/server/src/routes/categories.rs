use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    document::OwnerKind,
    document_category::{DocumentCategory, UpdateDocumentCategory},
};
use serde::Deserialize;
use services::services::categories::{CategoryOrder, NewCategory};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    pub module: Option<OwnerKind>,
}

/// GET /api/categories?module=housing
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<DocumentCategory>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        state.categories().list(query.module).await?,
    )))
}

pub async fn create_category(
    State(state): State<AppState>,
    _actor: CurrentActor,
    axum::Json(payload): axum::Json<NewCategory>,
) -> Result<ResponseJson<ApiResponse<DocumentCategory>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.categories().create(payload).await?)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<DocumentCategory>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.categories().get(id).await?)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _actor: CurrentActor,
    axum::Json(patch): axum::Json<UpdateDocumentCategory>,
) -> Result<ResponseJson<ApiResponse<DocumentCategory>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(state.categories().update(id, patch).await?)))
}

/// DELETE /api/categories/{id} is refused while documents are filed under the category
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _actor: CurrentActor,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.categories().delete(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/categories/reorder
pub async fn reorder_categories(
    State(state): State<AppState>,
    _actor: CurrentActor,
    axum::Json(order): axum::Json<Vec<CategoryOrder>>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.categories().reorder(&order).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/categories/housing-defaults creates the missing housing system categories
pub async fn seed_housing_categories(
    State(state): State<AppState>,
    _actor: CurrentActor,
) -> Result<ResponseJson<ApiResponse<Vec<DocumentCategory>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        state.categories().seed_housing_categories().await?,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/reorder", post(reorder_categories))
        .route("/categories/housing-defaults", post(seed_housing_categories))
        .route(
            "/categories/{id}",
            get(get_category).patch(update_category).delete(delete_category),
        )
}
