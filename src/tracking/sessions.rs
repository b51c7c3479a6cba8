//! Driver service session store.
//!
//! One session per driver, keyed by cédula, held behind a single write lock
//! so start/stop behave as compare-and-set. Server state is authoritative:
//! clients resynchronize through `status` after reconnecting.
//!
//! Concurrent-start policy: first writer wins. A `start` while a session is
//! already running is a no-op that reports the existing session's route.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::TrackingConfig;
use crate::metrics::{TRACKING_OFF_ROUTE, TRACKING_PINGS, TRACKING_SESSIONS_STARTED};

use super::geo;
use super::route::{route_summary, RouteSummary};
use super::Waypoint;

/// A position report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ping {
    pub lat: f64,
    pub lng: f64,
    pub at: DateTime<Utc>,
}

/// One active service session.
#[derive(Debug, Clone)]
pub struct DriverSession {
    pub cedula: String,
    pub route: Vec<Waypoint>,
    pub started_at: DateTime<Utc>,
    pub last_ping: Ping,
}

/// Session-level failures that callers must see; everything
/// upstream-related is neutralized before reaching here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },
    #[error("no running service session for driver {0}")]
    NotRunning(String),
}

/// Result of a `start` call.
#[derive(Debug, Serialize)]
pub struct StartOutcome {
    /// True when an already-running session was kept (idempotent start).
    pub resumed: bool,
    pub route_summary: Option<RouteSummary>,
}

/// Geofencing evaluation for a ping.
#[derive(Debug, Serialize)]
pub struct PingOutcome {
    pub is_off_route: bool,
    pub has_arrived: bool,
    pub is_far_from_start: bool,
}

/// Read-only session state.
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_ping: Option<Ping>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, DriverSession>>,
    cfg: TrackingConfig,
}

fn validate_coordinates(lat: f64, lng: f64) -> Result<(), SessionError> {
    let ok = lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng);
    if ok {
        Ok(())
    } else {
        Err(SessionError::InvalidCoordinates { lat, lng })
    }
}

impl SessionStore {
    pub fn new(cfg: TrackingConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cfg,
        }
    }

    /// Begin a service session with an already-computed route. If the driver
    /// is already running, the existing session is kept untouched.
    pub async fn start(
        &self,
        cedula: &str,
        lat: f64,
        lng: f64,
        route: Vec<Waypoint>,
    ) -> Result<StartOutcome, SessionError> {
        validate_coordinates(lat, lng)?;

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(cedula) {
            return Ok(StartOutcome {
                resumed: true,
                route_summary: route_summary(&existing.route),
            });
        }

        let now = Utc::now();
        let summary = route_summary(&route);
        sessions.insert(
            cedula.to_owned(),
            DriverSession {
                cedula: cedula.to_owned(),
                route,
                started_at: now,
                last_ping: Ping { lat, lng, at: now },
            },
        );
        metrics::counter!(TRACKING_SESSIONS_STARTED).increment(1);

        Ok(StartOutcome {
            resumed: false,
            route_summary: summary,
        })
    }

    /// Record a position and evaluate the geofencing predicates against the
    /// session's route. Fails with `NotRunning` when there is no session.
    pub async fn ping(
        &self,
        cedula: &str,
        lat: f64,
        lng: f64,
    ) -> Result<PingOutcome, SessionError> {
        validate_coordinates(lat, lng)?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(cedula)
            .ok_or_else(|| SessionError::NotRunning(cedula.to_owned()))?;

        session.last_ping = Ping {
            lat,
            lng,
            at: Utc::now(),
        };

        let outcome = PingOutcome {
            is_off_route: geo::is_off_route(lat, lng, &session.route, self.cfg.route_tolerance_m),
            has_arrived: geo::has_arrived_at_start(
                lat,
                lng,
                &session.route,
                self.cfg.arrival_radius_m,
            ),
            is_far_from_start: geo::is_far_from_start(
                lat,
                lng,
                &session.route,
                self.cfg.far_threshold_m,
            ),
        };

        metrics::counter!(TRACKING_PINGS).increment(1);
        if outcome.is_off_route {
            metrics::counter!(TRACKING_OFF_ROUTE).increment(1);
        }
        Ok(outcome)
    }

    /// End a session. Idempotent: stopping an already-stopped driver is fine.
    /// Returns whether a session was actually running.
    pub async fn stop(&self, cedula: &str) -> bool {
        self.sessions.write().await.remove(cedula).is_some()
    }

    /// Authoritative session state for a driver.
    pub async fn status(&self, cedula: &str) -> SessionStatus {
        match self.sessions.read().await.get(cedula) {
            Some(session) => SessionStatus {
                running: true,
                started_at: Some(session.started_at),
                last_ping: Some(session.last_ping),
            },
            None => SessionStatus {
                running: false,
                started_at: None,
                last_ping: None,
            },
        }
    }
}
