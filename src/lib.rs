//! # TechRoutes
//!
//! Route geometry pipeline for planning and recording field routes.
//!
//! This library provides:
//! - KMZ extraction and KML line geometry parsing
//! - Coordinate normalization and one-pass midpoint smoothing
//! - Best-effort stitching of externally routed segments
//! - Live GPS track recording with start/stop semantics
//! - Haversine distance and trip summaries
//!
//! ## Features
//!
//! - **`http`** - Enable HTTP clients for KMZ fetching and OSRM directions
//!
//! ## Quick Start
//!
//! ```rust
//! use techroutes::{build_route_from_kml, GeoPoint};
//!
//! let kml = r#"<kml><Placemark><LineString><coordinates>
//!     -46.0,-23.0 -46.1,-23.1
//! </coordinates></LineString></Placemark></kml>"#;
//!
//! let route = build_route_from_kml(kml).unwrap();
//! assert_eq!(route.points.len(), 3);
//! assert_eq!(route.points[0], GeoPoint::new(-23.0, -46.0));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{PositionErrorKind, Result, RouteError};

// Geographic utilities (distance, bounds)
pub mod geo_utils;
pub use geo_utils::{haversine_distance, haversine_total};

// KMZ archive extraction
pub mod kmz;
pub use kmz::extract_kml;

// KML line geometry parsing
pub mod kml;
pub use kml::{parse_coordinates, parse_geometries, Geometry, RawCoordinate};

// Coordinate normalization (lon/lat -> lat/lon, drop non-numeric)
pub mod normalize;
pub use normalize::normalize_coordinates;

// Midpoint smoothing
pub mod smoothing;
pub use smoothing::smooth_polyline;

// KMZ/KML -> PlannedRoute
pub mod pipeline;
pub use pipeline::{build_route, build_route_from_kml};

// Segment routing through an external directions service
pub mod directions;
pub use directions::{
    build_routed_path, DirectionsProvider, RoutedPath, SegmentOutcome, SegmentResult,
};

// Live position tracking
pub mod tracking;
pub use tracking::{
    PositionCallback, PositionEvent, PositionSource, Subscription, TrackRecorder, TrackingState,
};

// Trip summaries, history and sharing
pub mod trip;
pub use trip::{TripHistory, TripSink, TripSummary};

// Google Maps direction links
pub mod links;
pub use links::google_maps_links;

// Session state and stale-source cancellation
pub mod session;
pub use session::{BuildOutcome, KmzSource, RouteSession};

// Algorithm toolbox - standalone access to the pure pipeline stages
pub mod algorithms;

// HTTP capabilities
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpKmzSource, OsrmDirections};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use techroutes::GeoPoint;
/// let point = GeoPoint::new(-23.5505, -46.6333); // São Paulo
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Finite and within latitude [-90, 90], longitude [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Arithmetic midpoint of the two coordinate pairs.
    pub fn midpoint(&self, other: &GeoPoint) -> GeoPoint {
        GeoPoint::new(
            (self.latitude + other.latitude) / 2.0,
            (self.longitude + other.longitude) / 2.0,
        )
    }
}

/// Bounding box for a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// The display/navigation polyline for one route source.
///
/// Built once per KMZ input (or per routed waypoint list) and replaced
/// wholesale when the source changes; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRoute {
    /// Polyline to render, in order
    pub points: Vec<GeoPoint>,
    /// Normalized waypoints the polyline was derived from
    pub waypoints: Vec<GeoPoint>,
    /// Pre-computed bounding box (None for an empty route)
    pub bounds: Option<Bounds>,
}

impl PlannedRoute {
    /// Wrap a polyline and its anchor waypoints, computing bounds.
    pub fn new(points: Vec<GeoPoint>, waypoints: Vec<GeoPoint>) -> Self {
        let bounds = Bounds::from_points(&points);
        Self {
            points,
            waypoints,
            bounds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Center of the bounds, for initial map framing.
    pub fn center(&self) -> Option<GeoPoint> {
        self.bounds.map(|b| b.center())
    }

    /// Length of the polyline in kilometers.
    pub fn distance_km(&self) -> f64 {
        haversine_total(&self.points)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for link generation and trip labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Minimum spacing between points kept for Google Maps links.
    /// Default: 100.0 meters
    pub maps_link_min_spacing_m: f64,

    /// Maximum points per Google Maps directions link.
    /// Default: 25 (the Maps URL waypoint limit)
    pub maps_link_chunk_size: usize,

    /// Prefix for generated trip labels.
    /// Default: "Trip"
    pub trip_label_prefix: String,

    /// Messaging endpoint trip summaries are shared through.
    /// Default: "https://wa.me/"
    pub share_base_url: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            maps_link_min_spacing_m: 100.0,
            maps_link_chunk_size: 25,
            trip_label_prefix: "Trip".to_string(),
            share_base_url: "https://wa.me/".to_string(),
        }
    }
}

impl RouteConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RouteConfig =
            serde_json::from_str(json).map_err(|e| RouteError::Config {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.maps_link_min_spacing_m.is_finite() || self.maps_link_min_spacing_m < 0.0 {
            return Err(RouteError::Config {
                message: format!(
                    "maps_link_min_spacing_m must be a non-negative number, got {}",
                    self.maps_link_min_spacing_m
                ),
            });
        }
        if self.maps_link_chunk_size < 2 {
            return Err(RouteError::Config {
                message: format!(
                    "maps_link_chunk_size must be at least 2, got {}",
                    self.maps_link_chunk_size
                ),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(-23.5505, -46.6333).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(GeoPoint::new(91.0, 0.0).is_finite());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_midpoint() {
        let a = GeoPoint::new(-23.0, -46.0);
        let b = GeoPoint::new(-23.1, -46.1);
        let m = a.midpoint(&b);
        assert!((m.latitude - -23.05).abs() < 1e-12);
        assert!((m.longitude - -46.05).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_and_center() {
        let route = PlannedRoute::new(
            vec![GeoPoint::new(-23.0, -46.0), GeoPoint::new(-23.2, -46.4)],
            vec![],
        );
        let bounds = route.bounds.unwrap();
        assert_eq!(bounds.min_lat, -23.2);
        assert_eq!(bounds.max_lng, -46.0);
        let center = route.center().unwrap();
        assert!((center.latitude - -23.1).abs() < 1e-12);
        assert!((center.longitude - -46.2).abs() < 1e-12);

        assert!(PlannedRoute::new(vec![], vec![]).bounds.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let config = RouteConfig::from_json_str(r#"{"maps_link_chunk_size": 10}"#).unwrap();
        assert_eq!(config.maps_link_chunk_size, 10);
        assert_eq!(config.maps_link_min_spacing_m, 100.0);
        assert_eq!(config.trip_label_prefix, "Trip");

        let err = RouteConfig::from_json_str(r#"{"maps_link_chunk_size": 1}"#).unwrap_err();
        assert!(matches!(err, RouteError::Config { .. }));

        assert!(RouteConfig::from_json_str("not json").is_err());
    }
}
