//! HTTP surface for the two engines.

use axum::{Json, Router, routing::get};
use serde_json::json;

use crate::serve::{AppState, Result};

mod reports;
mod tracking;

/// Health check endpoint. Returns name and version of the service.
pub(crate) async fn health() -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "version": concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
    })))
}

/// Register all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_health", get(health))
        .merge(reports::routes())
        .merge(tracking::routes())
}
