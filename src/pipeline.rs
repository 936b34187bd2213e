//! KMZ bytes to [`PlannedRoute`]: extract, parse, normalize, smooth.
//!
//! Extraction and parse failures abort the build; no partial route is
//! returned.

use log::debug;

use crate::error::Result;
use crate::{
    extract_kml, normalize_coordinates, parse_coordinates, smooth_polyline, PlannedRoute,
};

/// Build the planned route from a KMZ archive.
pub fn build_route(kmz_bytes: &[u8]) -> Result<PlannedRoute> {
    let kml = extract_kml(kmz_bytes)?;
    build_route_from_kml(&kml)
}

/// Build the planned route from KML text (the part of [`build_route`] after unzipping).
pub fn build_route_from_kml(kml: &str) -> Result<PlannedRoute> {
    let raw = parse_coordinates(kml)?;
    let waypoints = normalize_coordinates(&raw);
    let points = smooth_polyline(&waypoints);

    debug!(
        "[RoutePipeline] {} raw coordinates -> {} waypoints -> {} smoothed points",
        raw.len(),
        waypoints.len(),
        points.len()
    );

    Ok(PlannedRoute::new(points, waypoints))
}
