use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use services::services::documents::DocumentError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

pub mod audit;
pub mod categories;
pub mod documents;
pub mod trash;

/// GET /api/health checks that a database connection can be acquired
pub async fn health(State(state): State<AppState>) -> Result<ResponseJson<ApiResponse<String>>, ApiError> {
    state.db().pool.acquire().await.map_err(DocumentError::from)?;
    Ok(ResponseJson(ApiResponse::success("OK".to_string())))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(documents::router())
        .merge(categories::router())
        .merge(trash::router())
        .merge(audit::router());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
