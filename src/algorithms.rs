//! # Algorithm Toolbox
//!
//! Direct access to the pure stages of the route pipeline. Use these to run
//! a single stage (for example, smoothing an existing polyline) without a
//! [`RouteSession`](crate::RouteSession).
//!
//! ## Pipeline Stages
//!
//! - **KMZ Extraction**: first `.kml` entry of a zip archive
//! - **KML Parsing**: line geometries in document order
//! - **Normalization**: `[lon, lat, alt?]` tuples to `GeoPoint`s
//! - **Smoothing**: one pass of midpoint insertion
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: great-circle distance in kilometers
//! - **Path Length**: summed haversine distance along a path
//! - **Bounds**: bounding box and center for map framing
//!
//! # Example
//!
//! ```rust
//! use techroutes::algorithms::{haversine_distance, smooth_polyline, GeoPoint};
//!
//! let a = GeoPoint::new(0.0, 0.0);
//! let b = GeoPoint::new(0.0, 1.0);
//! assert!((haversine_distance(&a, &b) - 111.19).abs() < 0.01);
//!
//! let smoothed = smooth_polyline(&[a, b]);
//! assert_eq!(smoothed, vec![a, GeoPoint::new(0.0, 0.5), b]);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, GeoPoint, PlannedRoute, RouteConfig};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{haversine_distance, haversine_distance_m, haversine_total};

// =============================================================================
// Pipeline Stages
// =============================================================================

pub use crate::kml::{parse_coordinates, parse_geometries, Geometry, RawCoordinate};
pub use crate::kmz::extract_kml;
pub use crate::normalize::normalize_coordinates;
pub use crate::smoothing::smooth_polyline;

// =============================================================================
// Links
// =============================================================================

pub use crate::links::google_maps_links;
