use crate::models::{Coordinate, GeoNode};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters (Haversine).
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + phi1.cos() * phi2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    distance_m(a.lat, a.lon, b.lat, b.lon)
}

pub fn node_distance_m(a: &GeoNode, b: &GeoNode) -> f64 {
    distance_m(a.lat, a.lon, b.lat, b.lon)
}

/// Straight-line length of a polyline of nodes.
pub fn path_length_m(path: &[GeoNode]) -> f64 {
    path.windows(2).map(|w| node_distance_m(&w[0], &w[1])).sum()
}
