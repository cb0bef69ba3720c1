//! Combines the per-module routers into the unified API surface.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::Router;

use crate::shared::state::AppState;

/// Actor identity for the request. Authentication is an upstream
/// concern; the id arrives in the `x-user-id` header.
pub(crate) fn actor_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("default-user")
        .to_string()
}

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::documents::configure_documents_routes())
        .merge(crate::collab::configure_collab_routes())
        .merge(crate::favorites::configure_favorites_routes())
        .merge(crate::templates::configure_templates_routes())
}
