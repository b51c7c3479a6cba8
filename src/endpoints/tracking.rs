//! Driver service endpoints: start/ping/stop/status.

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::db::{self, Db};
use crate::serve::{AppState, Result};
use crate::tracking::route::DirectionsClient;
use crate::tracking::sessions::{SessionError, SessionStore};
use crate::Error;

fn session_error(err: SessionError) -> Error {
    match err {
        SessionError::InvalidCoordinates { .. } => Error::invalid_input(err),
        SessionError::NotRunning(_) => Error::state_conflict(err),
    }
}

fn validate_cedula(cedula: &str) -> Result<()> {
    if cedula.trim().is_empty() {
        return Err(Error::invalid_input(anyhow!("missing driver cedula")));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct StartInput {
    pub lat: f64,
    pub lng: f64,
    /// Human-readable pickup location name.
    pub origin: String,
    /// Human-readable destination name.
    pub destination: String,
}

async fn start_service(
    State(db): State<Db>,
    State(directions): State<Arc<DirectionsClient>>,
    State(sessions): State<Arc<SessionStore>>,
    Path(cedula): Path<String>,
    Json(input): Json<StartInput>,
) -> Result<Json<serde_json::Value>> {
    validate_cedula(&cedula)?;
    if !db::is_approved_driver(&db, &cedula).await? {
        return Err(Error::forbidden(anyhow!(
            "driver {cedula} has no approved application"
        )));
    }

    // An empty route disables geofencing rather than failing the start.
    let route = directions
        .build_route(&input.origin, &input.destination)
        .await;
    let outcome = sessions
        .start(&cedula, input.lat, input.lng, route)
        .await
        .map_err(session_error)?;

    Ok(Json(json!({
        "ok": true,
        "resumed": outcome.resumed,
        "route_summary": outcome.route_summary,
    })))
}

#[derive(Deserialize)]
pub struct PingInput {
    pub lat: f64,
    pub lng: f64,
}

async fn ping_service(
    State(sessions): State<Arc<SessionStore>>,
    Path(cedula): Path<String>,
    Json(input): Json<PingInput>,
) -> Result<Json<serde_json::Value>> {
    validate_cedula(&cedula)?;
    let outcome = sessions
        .ping(&cedula, input.lat, input.lng)
        .await
        .map_err(session_error)?;

    Ok(Json(json!({
        "ok": true,
        "is_off_route": outcome.is_off_route,
        "has_arrived": outcome.has_arrived,
        "is_far_from_start": outcome.is_far_from_start,
    })))
}

async fn stop_service(
    State(sessions): State<Arc<SessionStore>>,
    Path(cedula): Path<String>,
) -> Result<Json<serde_json::Value>> {
    validate_cedula(&cedula)?;
    let was_running = sessions.stop(&cedula).await;
    Ok(Json(json!({ "ok": true, "was_running": was_running })))
}

async fn service_status(
    State(sessions): State<Arc<SessionStore>>,
    Path(cedula): Path<String>,
) -> Result<Json<serde_json::Value>> {
    validate_cedula(&cedula)?;
    let status = sessions.status(&cedula).await;
    Ok(Json(serde_json::to_value(status).map_err(anyhow::Error::new)?))
}

#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    // UP /api/drivers/{cedula}/start
    // UP /api/drivers/{cedula}/ping
    // UP /api/drivers/{cedula}/stop
    // UG /api/drivers/{cedula}/status
    Router::new()
        .route("/api/drivers/{cedula}/start",  post(start_service))
        .route("/api/drivers/{cedula}/ping",   post(ping_service))
        .route("/api/drivers/{cedula}/stop",   post(stop_service))
        .route("/api/drivers/{cedula}/status", get(service_status))
}
