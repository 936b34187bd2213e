//! Geographic utilities: great-circle distance along point sequences.

use crate::GeoPoint;

/// Mean Earth radius used for all distance computations, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (haversine).
///
/// Non-finite coordinates propagate as NaN.
///
/// # Example
/// ```
/// use techroutes::{GeoPoint, haversine_distance};
/// let d = haversine_distance(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0));
/// assert!((d - 111.19).abs() < 0.5);
/// ```
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points
    let c = 2.0 * a.sqrt().clamp(0.0, 1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Sum of haversine distances between consecutive points, in kilometers.
///
/// Empty and single-point paths have zero length.
pub fn haversine_total(path: &[GeoPoint]) -> f64 {
    path.windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Same as [`haversine_distance`], in meters.
pub fn haversine_distance_m(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine_distance(p1, p2) * 1000.0
}
