//! Coordinate normalization.
//!
//! KML writes `lon,lat[,alt]`; everything downstream works in `(lat, lon)`.
//! Tuples with a missing or non-finite component are dropped silently.

use crate::kml::RawCoordinate;
use crate::GeoPoint;

/// Swap raw `(lon, lat[, alt])` tuples to [`GeoPoint`]s, keeping order.
///
/// Only the first two components are read. A tuple is kept only if both are
/// finite numbers. No deduplication is performed.
///
/// # Example
/// ```
/// use techroutes::{normalize_coordinates, GeoPoint, RawCoordinate};
///
/// let raw = vec![
///     RawCoordinate(vec![-46.0, -23.0, 0.0]),
///     RawCoordinate(vec![f64::NAN, -23.1]),
/// ];
/// assert_eq!(normalize_coordinates(&raw), vec![GeoPoint::new(-23.0, -46.0)]);
/// ```
pub fn normalize_coordinates(raw: &[RawCoordinate]) -> Vec<GeoPoint> {
    raw.iter()
        .filter_map(|c| match (c.longitude(), c.latitude()) {
            (Some(lon), Some(lat)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        })
        .filter(|p| p.is_finite())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_to_lat_lon() {
        let raw = vec![
            RawCoordinate(vec![-46.0, -23.0]),
            RawCoordinate(vec![-46.1, -23.1, 12.5]),
        ];
        assert_eq!(
            normalize_coordinates(&raw),
            vec![GeoPoint::new(-23.0, -46.0), GeoPoint::new(-23.1, -46.1)]
        );
    }

    #[test]
    fn test_drops_incomplete_and_non_numeric() {
        let raw = vec![
            RawCoordinate(vec![1.0, 2.0]),
            RawCoordinate(vec![3.0]),
            RawCoordinate(vec![]),
            RawCoordinate(vec![f64::NAN, 4.0]),
            RawCoordinate(vec![5.0, f64::INFINITY]),
            RawCoordinate(vec![6.0, 7.0, f64::NAN]),
        ];
        let points = normalize_coordinates(&raw);
        assert_eq!(points, vec![GeoPoint::new(2.0, 1.0), GeoPoint::new(7.0, 6.0)]);
        assert!(points.len() <= raw.len());
        assert!(points.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_keeps_duplicates_and_order() {
        let raw = vec![
            RawCoordinate(vec![1.0, 1.0]),
            RawCoordinate(vec![1.0, 1.0]),
            RawCoordinate(vec![0.0, 0.0]),
        ];
        let points = normalize_coordinates(&raw);
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], GeoPoint::new(0.0, 0.0));
    }
}
