//! One-pass midpoint smoothing.
//!
//! Inserts the arithmetic midpoint between every pair of consecutive
//! vertices. The pipeline applies it exactly once per build; it is not
//! idempotent (each pass roughly doubles the vertex count).

use crate::GeoPoint;

/// Insert midpoints between consecutive points.
///
/// For `n >= 1` input points the output has `2 * (n - 1) + 1` points, starts
/// with `points[0]` and ends with `points[n - 1]`. Empty input stays empty.
///
/// # Example
/// ```
/// use techroutes::{smooth_polyline, GeoPoint};
///
/// let smoothed = smooth_polyline(&[GeoPoint::new(0.0, 0.0), GeoPoint::new(2.0, 4.0)]);
/// assert_eq!(smoothed[1], GeoPoint::new(1.0, 2.0));
/// ```
pub fn smooth_polyline(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let Some(last) = points.last() else {
        return Vec::new();
    };

    let mut smoothed = Vec::with_capacity(points.len() * 2 - 1);
    for pair in points.windows(2) {
        smoothed.push(pair[0]);
        smoothed.push(pair[0].midpoint(&pair[1]));
    }
    smoothed.push(*last);
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<GeoPoint> {
        (0..n)
            .map(|i| GeoPoint::new(-23.0 - i as f64 * 0.01, -46.0 + i as f64 * 0.02))
            .collect()
    }

    #[test]
    fn test_length_and_endpoints() {
        for n in 1..10 {
            let points = line(n);
            let smoothed = smooth_polyline(&points);
            assert_eq!(smoothed.len(), 2 * (n - 1) + 1);
            assert_eq!(smoothed[0], points[0]);
            assert_eq!(*smoothed.last().unwrap(), *points.last().unwrap());
        }
    }

    #[test]
    fn test_empty_and_single() {
        assert!(smooth_polyline(&[]).is_empty());
        let p = GeoPoint::new(1.0, 2.0);
        assert_eq!(smooth_polyline(&[p]), vec![p]);
    }

    #[test]
    fn test_midpoints_interleave_input() {
        let points = line(3);
        let smoothed = smooth_polyline(&points);
        assert_eq!(smoothed[0], points[0]);
        assert_eq!(smoothed[1], points[0].midpoint(&points[1]));
        assert_eq!(smoothed[2], points[1]);
        assert_eq!(smoothed[3], points[1].midpoint(&points[2]));
        assert_eq!(smoothed[4], points[2]);
    }

    #[test]
    fn test_not_idempotent() {
        let points = line(4);
        let once = smooth_polyline(&points);
        let twice = smooth_polyline(&once);
        assert_ne!(once, twice);
        assert_eq!(twice.len(), 2 * (once.len() - 1) + 1);
    }
}
