//! HTTP capabilities: KMZ download and OSRM driving directions.
//!
//! - `HttpKmzSource` fetches route files over plain GET
//! - `OsrmDirections` asks an OSRM-compatible server for a driving route
//!   between two points, retrying with exponential backoff on 429

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::directions::DirectionsProvider;
use crate::error::{Result, RouteError};
use crate::session::KmzSource;
use crate::GeoPoint;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;

/// Public OSRM demo server
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| RouteError::fetch(format!("Failed to create HTTP client: {}", e), None))
}

/// Exponential backoff: 1s, 2s, 4s...
fn backoff(retry: u32) -> Duration {
    Duration::from_millis(1000 * (1 << (retry - 1).min(4)))
}

// ============================================================================
// KMZ download
// ============================================================================

/// Downloads KMZ files over HTTP(S).
pub struct HttpKmzSource {
    client: Client,
}

impl HttpKmzSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RouteError::fetch(e.to_string(), None))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RouteError::fetch(
                format!("HTTP {} for {}", status, url),
                Some(status.as_u16()),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RouteError::fetch(e.to_string(), None))?;
        debug!("[HttpKmzSource] Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

impl KmzSource for HttpKmzSource {
    fn fetch_bytes<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        self.fetch(url).boxed()
    }
}

// ============================================================================
// OSRM directions
// ============================================================================

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lon, lat]`
    coordinates: Vec<[f64; 2]>,
}

/// Driving directions from an OSRM `/route/v1/driving` endpoint.
pub struct OsrmDirections {
    client: Client,
    base_url: String,
}

impl OsrmDirections {
    /// Client for the server at `base_url`, e.g. [`DEFAULT_OSRM_URL`].
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, start: GeoPoint, end: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, start.longitude, start.latitude, end.longitude, end.latitude
        )
    }

    async fn fetch(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>> {
        let url = self.route_url(start, end);
        let mut retries = 0;

        loop {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| RouteError::routing(e.to_string(), None))?;
            let status = resp.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(RouteError::routing(
                        "Max retries exceeded (429)",
                        Some(status.as_u16()),
                    ));
                }
                let wait = backoff(retries);
                warn!("[OsrmDirections] 429, retry {} after {:?}", retries, wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(RouteError::routing(
                    format!("HTTP {}", status),
                    Some(status.as_u16()),
                ));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| RouteError::routing(e.to_string(), Some(status.as_u16())))?;
            return parse_osrm_route(&body);
        }
    }
}

impl DirectionsProvider for OsrmDirections {
    fn fetch_directions(
        &self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<GeoPoint>>> {
        self.fetch(start, end).boxed()
    }
}

/// Points of the first route in an OSRM response body.
fn parse_osrm_route(body: &str) -> Result<Vec<GeoPoint>> {
    let data: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| RouteError::routing(format!("Parse error: {}", e), None))?;

    if data.code != "Ok" {
        let message = match data.message {
            Some(m) => format!("{}: {}", data.code, m),
            None => data.code,
        };
        return Err(RouteError::routing(message, None));
    }

    let route = data
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RouteError::routing("response contained no routes", None))?;

    Ok(route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| GeoPoint::new(lat, lon))
        .collect())
}
