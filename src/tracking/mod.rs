//! Live bus-service tracking: route construction, geofencing, and the
//! per-driver session state machine.

pub mod geo;
pub mod route;
pub mod sessions;

use serde::{Deserialize, Serialize};

/// One coordinate sample along a computed route. Index 0 is the pickup
/// point, the last entry is the destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}
