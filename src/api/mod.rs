//! # HTTP Surface
//!
//! The external collaborator spec.md treats as out of scope for the
//! core (§1) but which a runnable crate still needs as its front door
//! (SPEC_FULL.md §6): one POST route, thin JSON ingress/egress, all
//! decision logic delegated to [`crate::lookup::LookupPipeline`].
//! Builder shape ported from the teacher's `ApiServerBuilder`
//! (`api/mod.rs`), trimmed of its auth/rate-limit/webhook layers — those
//! are teacher SaaS features with no SPEC_FULL.md counterpart.

pub mod handlers;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::lookup::LookupPipeline;

/// Shared application state handed to every route handler.
pub struct AppState {
    pub pipeline: LookupPipeline,
}

/// Build the full axum router: one route, CORS, and request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::router())
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_builds() {
        let _ = cors_layer();
    }
}
