//! Route table for the HTTP surface (spec.md §6: one POST route).

use axum::routing::post;
use axum::Router;
use std::sync::Arc;

use crate::api::{handlers, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/check-url", post(handlers::check_url))
}
