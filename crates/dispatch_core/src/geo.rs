//! Great-circle distance and the checkpoint thresholds.
//!
//! All distances in this crate are Haversine meters on a spherical Earth.
//! Coordinates equal to (0, 0) are treated as "position unknown" throughout;
//! callers that need a distance from an unknown position get `f64::INFINITY`.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A driver within this distance of the next pickup on their route has
/// reached it; the route index advances.
pub const PICKUP_RADIUS_M: f64 = 120.0;

/// A driver within this distance of the trip's station centroid has dropped
/// the rider off; the trip completes.
pub const DROPOFF_RADIUS_M: f64 = 150.0;

/// Haversine distance in meters between two (lat, lon) pairs in degrees.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let sin_dlat = (delta_lat * 0.5).sin();
    let sin_dlon = (delta_lon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1_rad.cos() * lat2_rad.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// True when a coordinate pair carries no position information.
pub fn is_unset(lat: f64, lon: f64) -> bool {
    lat == 0.0 && lon == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_meters(12.8456, 77.66, 12.8456, 77.66), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let forward = haversine_meters(12.8456, 77.66, 12.9165, 77.6238);
        let backward = haversine_meters(12.9165, 77.6238, 12.8456, 77.66);
        assert!((forward - backward).abs() < 1e-6);
    }

    #[test]
    fn known_distance_within_tolerance() {
        // Electronic City station to the Wipro Gate pickup: a short hop.
        let d = haversine_meters(12.8456, 77.66, 12.8467, 77.6624);
        assert!(d > 250.0 && d < 300.0, "unexpected distance {d}");
    }

    #[test]
    fn unset_coordinates_are_detected() {
        assert!(is_unset(0.0, 0.0));
        assert!(!is_unset(12.8456, 77.66));
        assert!(!is_unset(0.0, 77.66));
    }
}
