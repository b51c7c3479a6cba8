//! Geodesic distance and geofencing predicates.
//!
//! Pure math over a route polyline. These never fail: empty routes disable
//! the checks instead of tripping them.

use super::Waypoint;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default off-route tolerance in meters.
pub const DEFAULT_ROUTE_TOLERANCE_M: f64 = 100.0;
/// Default arrival radius around the pickup point, meters.
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 100.0;
/// Default "far from pickup" threshold, meters.
pub const DEFAULT_FAR_THRESHOLD_M: f64 = 500.0;

/// Haversine distance in meters between two coordinates on a spherical Earth.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Minimum distance from a point to any waypoint of the route.
fn min_distance_to_route(lat: f64, lng: f64, waypoints: &[Waypoint]) -> Option<f64> {
    waypoints
        .iter()
        .map(|w| distance_meters(lat, lng, w.lat, w.lng))
        .fold(None, |acc, d| Some(acc.map_or(d, |m: f64| m.min(d))))
}

/// True iff the point is farther than `tolerance_m` from every waypoint.
/// An empty route never reports a deviation.
pub fn is_off_route(lat: f64, lng: f64, waypoints: &[Waypoint], tolerance_m: f64) -> bool {
    match min_distance_to_route(lat, lng, waypoints) {
        Some(min) => min > tolerance_m,
        None => false,
    }
}

/// True iff the point is within `radius_m` of the route's start (pickup).
pub fn has_arrived_at_start(lat: f64, lng: f64, waypoints: &[Waypoint], radius_m: f64) -> bool {
    waypoints
        .first()
        .is_some_and(|start| distance_meters(lat, lng, start.lat, start.lng) <= radius_m)
}

/// True iff the point is farther than `threshold_m` from the route's start.
pub fn is_far_from_start(lat: f64, lng: f64, waypoints: &[Waypoint], threshold_m: f64) -> bool {
    waypoints
        .first()
        .is_some_and(|start| distance_meters(lat, lng, start.lat, start.lng) > threshold_m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(lat: f64, lng: f64) -> Waypoint {
        Waypoint { lat, lng }
    }

    #[test]
    fn distance_to_self_is_zero() {
        for (lat, lng) in [(0.0, 0.0), (4.711, -74.0721), (-33.45, -70.66)] {
            assert_eq!(distance_meters(lat, lng, lat, lng), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let d1 = distance_meters(4.711, -74.0721, 6.2442, -75.5812);
        let d2 = distance_meters(6.2442, -75.5812, 4.711, -74.0721);
        assert!((d1 - d2).abs() < 1e-6);
    }

    #[test]
    fn known_pair_distance_is_plausible() {
        // Bogotá to Medellín, roughly 246 km great-circle.
        let d = distance_meters(4.711, -74.0721, 6.2442, -75.5812);
        assert!((d - 246_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111km() {
        let d = distance_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn empty_route_is_never_off_route() {
        assert!(!is_off_route(10.0, 10.0, &[], DEFAULT_ROUTE_TOLERANCE_M));
    }

    #[test]
    fn point_on_a_waypoint_is_on_route() {
        let route = vec![wp(0.0, 0.0), wp(0.0, 1.0)];
        assert!(!is_off_route(0.0, 1.0, &route, DEFAULT_ROUTE_TOLERANCE_M));
    }

    #[test]
    fn distant_point_is_off_route() {
        let route = vec![wp(0.0, 0.0), wp(0.0, 1.0)];
        assert!(is_off_route(10.0, 10.0, &route, DEFAULT_ROUTE_TOLERANCE_M));
    }

    #[test]
    fn arrival_and_far_predicates() {
        let route = vec![wp(0.0, 0.0), wp(0.0, 1.0)];
        assert!(has_arrived_at_start(0.0, 0.0, &route, DEFAULT_ARRIVAL_RADIUS_M));
        assert!(!has_arrived_at_start(
            10.0,
            10.0,
            &route,
            DEFAULT_ARRIVAL_RADIUS_M
        ));
        assert!(is_far_from_start(10.0, 10.0, &route, DEFAULT_FAR_THRESHOLD_M));
        assert!(!is_far_from_start(0.0, 0.0, &route, DEFAULT_FAR_THRESHOLD_M));
    }

    #[test]
    fn empty_route_disables_start_predicates() {
        assert!(!has_arrived_at_start(0.0, 0.0, &[], DEFAULT_ARRIVAL_RADIUS_M));
        assert!(!is_far_from_start(0.0, 0.0, &[], DEFAULT_FAR_THRESHOLD_M));
    }
}
