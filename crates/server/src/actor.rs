//! Identifies the user behind a request from the `x-actor-id` / `x-actor-email` headers.

use axum::{extract::FromRequestParts, http::request::Parts};
use services::services::documents::Actor;
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_EMAIL_HEADER: &str = "x-actor-email";

pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let raw_id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?;
        let id = Uuid::parse_str(raw_id)
            .map_err(|_| ApiError::Unauthorized(format!("invalid {ACTOR_ID_HEADER} header")))?;
        let email = header(ACTOR_EMAIL_HEADER).map(str::to_string);

        Ok(CurrentActor(Actor::new(id, email)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<CurrentActor, ApiError> {
        let (mut parts, _) = request.into_parts();
        CurrentActor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_reads_actor_headers() {
        let id = Uuid::new_v4();
        let request = Request::builder()
            .header(ACTOR_ID_HEADER, id.to_string())
            .header(ACTOR_EMAIL_HEADER, "ana@ryr.co")
            .body(())
            .unwrap();
        let CurrentActor(actor) = extract(request).await.unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.email.as_deref(), Some("ana@ryr.co"));
    }

    #[tokio::test]
    async fn test_rejects_missing_or_malformed_id() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(ApiError::Unauthorized(_))));

        let request = Request::builder()
            .header(ACTOR_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(ApiError::Unauthorized(_))));
    }
}
