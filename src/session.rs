//! Route-viewing session.
//!
//! Owns everything that lives for one route-viewing session: the current
//! planned route, the track recorder and the last known user location.
//! There is no global instance; hosts create one and pass it around.
//!
//! ## Stale sources
//!
//! Every build takes a ticket from a monotonically increasing generation
//! counter. A build publishes its route only if its ticket is still the
//! newest when it finishes, so a slow build for an old source can never
//! overwrite the route of a newer one. The route is swapped wholesale behind
//! an `Arc`; readers see either the old or the new route, never a mix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::{debug, info, warn};

use crate::directions::{route_segments, DirectionsProvider, SegmentOutcome};
use crate::error::{Result, RouteError};
use crate::tracking::{PositionSource, TrackRecorder, TrackingState};
use crate::trip::{default_label, TripSink, TripSummary};
use crate::{
    build_route, extract_kml, google_maps_links, normalize_coordinates, parse_coordinates,
    GeoPoint, PlannedRoute, PositionErrorKind, RouteConfig,
};

/// Capability that retrieves the KMZ file for a URL.
pub trait KmzSource {
    fn fetch_bytes<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// What happened to a build once it finished.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// The build was the newest and its route is now current
    Published(Arc<PlannedRoute>),
    /// A newer build started meanwhile; this result was discarded
    Superseded,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RouteSession {
    config: RouteConfig,
    generation: AtomicU64,
    route: Mutex<Option<Arc<PlannedRoute>>>,
    segments: Mutex<Vec<SegmentOutcome>>,
    recorder: Mutex<TrackRecorder>,
    user_location: Mutex<Option<GeoPoint>>,
}

impl Default for RouteSession {
    fn default() -> Self {
        Self::new(RouteConfig::default())
    }
}

impl RouteSession {
    pub fn new(config: RouteConfig) -> Self {
        Self {
            config,
            generation: AtomicU64::new(0),
            route: Mutex::new(None),
            segments: Mutex::new(Vec::new()),
            recorder: Mutex::new(TrackRecorder::new()),
            user_location: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// The current planned route, if a build has been published.
    pub fn planned_route(&self) -> Option<Arc<PlannedRoute>> {
        lock(&self.route).clone()
    }

    /// Per-segment outcomes of the last published routed build.
    pub fn segment_outcomes(&self) -> Vec<SegmentOutcome> {
        lock(&self.segments).clone()
    }

    /// Google Maps directions links for the current route's waypoints.
    pub fn google_maps_links(&self) -> Vec<String> {
        match self.planned_route() {
            Some(route) => google_maps_links(&route.waypoints, &self.config),
            None => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Route builds
    // ------------------------------------------------------------------------

    /// Fetch a KMZ and build the smoothed route from it.
    ///
    /// A failed build of the newest source clears the current route and
    /// returns the error. Results of superseded builds, successful or not,
    /// are discarded.
    pub async fn load_kmz<S>(&self, source: &S, url: &str) -> Result<BuildOutcome>
    where
        S: KmzSource + ?Sized,
    {
        let ticket = self.next_ticket();
        info!("[RouteSession] Build {} started for {}", ticket, url);

        let result = match source.fetch_bytes(url).await {
            Ok(bytes) if !self.is_stale(ticket) => build_route(&bytes),
            Ok(_) => return Ok(self.superseded(ticket)),
            Err(e) => Err(e),
        };

        match result {
            Ok(route) => Ok(self.publish(ticket, route, Vec::new())),
            Err(e) => self.fail(ticket, e),
        }
    }

    /// Route consecutive waypoint pairs through `provider` and publish the
    /// stitched path. Failed pairs leave gaps; this never fails outright.
    pub async fn load_routed<P>(&self, waypoints: &[GeoPoint], provider: &P) -> BuildOutcome
    where
        P: DirectionsProvider + ?Sized,
    {
        let ticket = self.next_ticket();
        info!(
            "[RouteSession] Build {} started for {} routed waypoints",
            ticket,
            waypoints.len()
        );
        self.route_and_publish(ticket, waypoints.to_vec(), provider)
            .await
    }

    /// Fetch a KMZ and route between its normalized waypoints instead of
    /// smoothing them.
    pub async fn load_kmz_routed<S, P>(
        &self,
        source: &S,
        url: &str,
        provider: &P,
    ) -> Result<BuildOutcome>
    where
        S: KmzSource + ?Sized,
        P: DirectionsProvider + ?Sized,
    {
        let ticket = self.next_ticket();
        info!("[RouteSession] Routed build {} started for {}", ticket, url);

        let waypoints = match source.fetch_bytes(url).await {
            Ok(_) if self.is_stale(ticket) => return Ok(self.superseded(ticket)),
            Ok(bytes) => extract_kml(&bytes)
                .and_then(|kml| parse_coordinates(&kml))
                .map(|raw| normalize_coordinates(&raw)),
            Err(e) => Err(e),
        };

        match waypoints {
            Ok(waypoints) => Ok(self.route_and_publish(ticket, waypoints, provider).await),
            Err(e) => self.fail(ticket, e),
        }
    }

    async fn route_and_publish<P>(
        &self,
        ticket: u64,
        waypoints: Vec<GeoPoint>,
        provider: &P,
    ) -> BuildOutcome
    where
        P: DirectionsProvider + ?Sized,
    {
        match route_segments(&waypoints, provider, || self.is_stale(ticket)).await {
            Some(path) => {
                let segments = path.segments.clone();
                self.publish(ticket, path.into_planned_route(waypoints), segments)
            }
            None => self.superseded(ticket),
        }
    }

    fn next_ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_stale(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != ticket
    }

    fn publish(
        &self,
        ticket: u64,
        route: PlannedRoute,
        segments: Vec<SegmentOutcome>,
    ) -> BuildOutcome {
        let mut current = lock(&self.route);
        // Checked under the route lock so a newer build cannot publish in between
        if self.is_stale(ticket) {
            drop(current);
            return self.superseded(ticket);
        }
        let route = Arc::new(route);
        *current = Some(Arc::clone(&route));
        *lock(&self.segments) = segments;
        debug!(
            "[RouteSession] Build {} published ({} points)",
            ticket,
            route.points.len()
        );
        BuildOutcome::Published(route)
    }

    fn fail(&self, ticket: u64, error: RouteError) -> Result<BuildOutcome> {
        let mut current = lock(&self.route);
        if self.is_stale(ticket) {
            drop(current);
            debug!("[RouteSession] Build {} failed after being superseded: {}", ticket, error);
            return Ok(self.superseded(ticket));
        }
        *current = None;
        lock(&self.segments).clear();
        warn!("[RouteSession] Build {} failed: {}", ticket, error);
        Err(error)
    }

    fn superseded(&self, ticket: u64) -> BuildOutcome {
        info!(
            "[RouteSession] Build {} superseded by build {}, result discarded",
            ticket,
            self.generation.load(Ordering::SeqCst)
        );
        BuildOutcome::Superseded
    }

    // ------------------------------------------------------------------------
    // Location and tracking
    // ------------------------------------------------------------------------

    /// One-shot position fix, stored as the user location for map centering.
    pub async fn locate<S>(&self, source: &S) -> Result<GeoPoint>
    where
        S: PositionSource + ?Sized,
    {
        let point = source.current_position().await?;
        if !point.is_valid() {
            return Err(RouteError::position(
                PositionErrorKind::Unavailable,
                format!(
                    "invalid fix ({}, {})",
                    point.latitude, point.longitude
                ),
            ));
        }
        *lock(&self.user_location) = Some(point);
        Ok(point)
    }

    pub fn user_location(&self) -> Option<GeoPoint> {
        *lock(&self.user_location)
    }

    pub fn start_tracking<S>(&self, source: &S) -> Result<DateTime<Utc>>
    where
        S: PositionSource + ?Sized,
    {
        lock(&self.recorder).start(source)
    }

    /// Stop tracking, summarize the trip and hand it to `sink`.
    ///
    /// The summary is returned even if the sink fails to store it; the
    /// failure is logged so the caller can retry with the returned value.
    pub fn stop_tracking(&self, note: Option<String>, sink: &dyn TripSink) -> Result<TripSummary> {
        let track = lock(&self.recorder).stop()?;
        let label = default_label(&self.config.trip_label_prefix, track.started_at);
        let summary = TripSummary::from_track(track, label, note);

        if let Err(e) = sink.save_trip_summary(&summary) {
            warn!("[RouteSession] Failed to save trip '{}': {}", summary.label, e);
        }
        info!(
            "[RouteSession] Trip '{}' finished: {:.3} km, {} points",
            summary.label,
            summary.distance_km,
            summary.path.len()
        );
        Ok(summary)
    }

    pub fn tracking_state(&self) -> TrackingState {
        lock(&self.recorder).state()
    }

    /// Path recorded so far in the active tracking session.
    pub fn recorded_path(&self) -> Vec<GeoPoint> {
        lock(&self.recorder).path()
    }

    /// Share link for a trip, using the configured messaging endpoint.
    pub fn share_link(&self, summary: &TripSummary) -> String {
        summary.share_link(&self.config.share_base_url)
    }
}
