//! Request handlers. A single handler for the single route spec.md
//! defines (§6): decode the request body, run it through the Lookup
//! Pipeline, and serialize the verdict list — no business logic lives
//! here.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::AppError;
use crate::lookup::Verdict;

#[derive(Debug, Deserialize)]
pub struct CheckUrlRequest {
    pub urls: Vec<String>,
}

/// `POST /api/check-url`.
pub async fn check_url(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckUrlRequest>,
) -> Result<Json<Vec<Verdict>>, AppError> {
    if request.urls.is_empty() {
        return Err(AppError::BadRequest("urls must be a non-empty array".to_string()));
    }

    let verdicts = state.pipeline.check(request.urls).await?;
    Ok(Json(verdicts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_when_deserialized_without_urls_field() {
        let err = serde_json::from_str::<CheckUrlRequest>("{}").unwrap_err();
        assert!(err.to_string().contains("urls"));
    }
}
