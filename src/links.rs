//! Google Maps direction links for a planned route.
//!
//! Maps accepts a limited number of stops per directions URL, so the route is
//! thinned to points at least `maps_link_min_spacing_m` apart and split into
//! links of at most `maps_link_chunk_size` stops. Consecutive links share
//! their boundary stop so the legs join up.

use crate::geo_utils::haversine_distance_m;
use crate::{GeoPoint, RouteConfig};

const GOOGLE_MAPS_DIR_URL: &str = "https://www.google.com/maps/dir/";

/// Build Google Maps directions links covering `waypoints` in order.
pub fn google_maps_links(waypoints: &[GeoPoint], config: &RouteConfig) -> Vec<String> {
    let stops = thin_by_spacing(waypoints, config.maps_link_min_spacing_m);
    if stops.is_empty() {
        return Vec::new();
    }

    let chunk_size = config.maps_link_chunk_size.max(2);
    let mut links = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(stops.len());
        links.push(directions_url(&stops[start..end]));
        if end == stops.len() {
            break;
        }
        start = end - 1;
    }
    links
}

/// Keep the first point and every point at least `min_spacing_m` from the
/// last kept one. Non-finite points are skipped.
fn thin_by_spacing(points: &[GeoPoint], min_spacing_m: f64) -> Vec<GeoPoint> {
    let mut kept: Vec<GeoPoint> = Vec::new();
    for p in points.iter().filter(|p| p.is_finite()) {
        match kept.last() {
            Some(last) if haversine_distance_m(last, p) < min_spacing_m => {}
            _ => kept.push(*p),
        }
    }
    kept
}

fn directions_url(stops: &[GeoPoint]) -> String {
    let path: Vec<String> = stops
        .iter()
        .map(|p| format!("{},{}", p.latitude, p.longitude))
        .collect();
    format!("{}{}", GOOGLE_MAPS_DIR_URL, path.join("/"))
}
