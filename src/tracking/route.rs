//! Route construction via the directions service.
//!
//! A route is computed once per service session from two place names. Any
//! upstream problem (missing key, API error, no route found) yields an empty
//! waypoint list: deviation and arrival checks are then disabled, not
//! violated.

use std::time::Duration;

use anyhow::{bail, Context as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::DirectionsConfig;

use super::Waypoint;

/// Summary of a computed route, for the client's map header.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub start: Waypoint,
    pub end: Waypoint,
    pub waypoint_count: usize,
}

/// Start/end/count for a route, or `None` when there is no usable route
/// (fewer than two waypoints).
pub fn route_summary(waypoints: &[Waypoint]) -> Option<RouteSummary> {
    if waypoints.len() < 2 {
        return None;
    }
    Some(RouteSummary {
        start: waypoints[0],
        end: waypoints[waypoints.len() - 1],
        waypoint_count: waypoints.len(),
    })
}

pub struct DirectionsClient {
    /// Cached outbound client: the same origin/destination pair recurs every
    /// time a driver restarts the same line, so responses are worth caching.
    client: crate::serve::Client,
    cfg: DirectionsConfig,
}

impl DirectionsClient {
    pub fn new(client: crate::serve::Client, cfg: DirectionsConfig) -> Self {
        Self { client, cfg }
    }

    /// Compute the driving route between two place names. Returns the leg's
    /// start point followed by each step's end point, in traversal order.
    /// Empty on any failure.
    #[tracing::instrument(skip(self))]
    pub async fn build_route(&self, origin: &str, destination: &str) -> Vec<Waypoint> {
        match self.try_build_route(origin, destination).await {
            Ok(waypoints) => waypoints,
            Err(err) => {
                warn!("route construction failed, tracking without geofence: {err:#}");
                Vec::new()
            }
        }
    }

    async fn try_build_route(
        &self,
        origin: &str,
        destination: &str,
    ) -> anyhow::Result<Vec<Waypoint>> {
        let key = self
            .cfg
            .api_key
            .as_deref()
            .context("no directions api key configured")?;

        let res = self
            .client
            .get(&self.cfg.endpoint)
            .timeout(Duration::from_secs(self.cfg.timeout_secs))
            .query(&[
                ("origin", origin),
                ("destination", destination),
                ("mode", "driving"),
                ("language", "es"),
                ("key", key),
            ])
            .send()
            .await
            .context("directions request failed")?
            .error_for_status()
            .context("directions service returned an error status")?;

        let response: DirectionsResponse =
            res.json().await.context("invalid directions response")?;
        waypoints_from_response(response)
    }
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    #[serde(default)]
    legs: Vec<RouteLeg>,
}

#[derive(Deserialize)]
struct RouteLeg {
    start_location: Waypoint,
    #[serde(default)]
    steps: Vec<RouteStep>,
}

#[derive(Deserialize)]
struct RouteStep {
    end_location: Waypoint,
}

fn waypoints_from_response(response: DirectionsResponse) -> anyhow::Result<Vec<Waypoint>> {
    if response.status != "OK" {
        bail!("directions status {}", response.status);
    }
    let leg = response
        .routes
        .into_iter()
        .next()
        .context("no routes returned")?
        .legs
        .into_iter()
        .next()
        .context("route has no legs")?;

    let mut waypoints = Vec::with_capacity(leg.steps.len() + 1);
    waypoints.push(leg.start_location);
    waypoints.extend(leg.steps.into_iter().map(|s| s.end_location));
    Ok(waypoints)
}
