//! Segment routing through an external directions service.
//!
//! For each consecutive waypoint pair the provider is asked for a driving
//! route; the returned point sequences are concatenated in pair order.
//! Requests go out one at a time. A failed pair is logged, recorded in the
//! per-segment outcomes and contributes no points; later pairs still run.

use std::time::Instant;

use futures::future::BoxFuture;
use log::{debug, info, warn};

use crate::error::Result;
use crate::{GeoPoint, PlannedRoute};

/// External driving-directions capability.
///
/// Implementations return the ordered points of a route from `start` to
/// `end`, or [`RouteError::Routing`](crate::RouteError::Routing) on a
/// non-success response.
pub trait DirectionsProvider {
    fn fetch_directions(&self, start: GeoPoint, end: GeoPoint)
        -> BoxFuture<'_, Result<Vec<GeoPoint>>>;
}

/// Result of routing one waypoint pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentResult {
    Routed(Vec<GeoPoint>),
    Failed(String),
}

/// Outcome for the pair `waypoints[index] -> waypoints[index + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOutcome {
    pub index: usize,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub result: SegmentResult,
}

impl SegmentOutcome {
    pub fn is_routed(&self) -> bool {
        matches!(self.result, SegmentResult::Routed(_))
    }
}

/// Concatenated routed path plus per-segment diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPath {
    /// Points of all successful segments, in waypoint-pair order
    pub points: Vec<GeoPoint>,
    /// One outcome per waypoint pair, in order
    pub segments: Vec<SegmentOutcome>,
}

impl RoutedPath {
    fn from_segments(segments: Vec<SegmentOutcome>) -> Self {
        let points = segments
            .iter()
            .filter_map(|s| match &s.result {
                SegmentResult::Routed(points) => Some(points.iter().copied()),
                SegmentResult::Failed(_) => None,
            })
            .flatten()
            .collect();
        Self { points, segments }
    }

    pub fn succeeded_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_routed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.segments.len() - self.succeeded_count()
    }

    /// Failed segments with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&SegmentOutcome, &str)> {
        self.segments.iter().filter_map(|s| match &s.result {
            SegmentResult::Failed(reason) => Some((s, reason.as_str())),
            SegmentResult::Routed(_) => None,
        })
    }

    /// Convert to a planned route anchored at the given waypoints.
    pub fn into_planned_route(self, waypoints: Vec<GeoPoint>) -> PlannedRoute {
        PlannedRoute::new(self.points, waypoints)
    }
}

/// Route every consecutive waypoint pair and stitch the results together.
///
/// Never fails: per-pair errors reduce completeness of the output only.
/// Fewer than two waypoints yields an empty path.
pub async fn build_routed_path<P>(waypoints: &[GeoPoint], provider: &P) -> RoutedPath
where
    P: DirectionsProvider + ?Sized,
{
    match route_segments(waypoints, provider, || false).await {
        Some(path) => path,
        None => RoutedPath::from_segments(Vec::new()),
    }
}

/// Same as [`build_routed_path`], but checks `is_stale` before each request
/// and gives up with `None` once it returns true.
pub(crate) async fn route_segments<P, F>(
    waypoints: &[GeoPoint],
    provider: &P,
    is_stale: F,
) -> Option<RoutedPath>
where
    P: DirectionsProvider + ?Sized,
    F: Fn() -> bool,
{
    let total = waypoints.len().saturating_sub(1);
    let start_time = Instant::now();
    let mut segments = Vec::with_capacity(total);

    for (index, pair) in waypoints.windows(2).enumerate() {
        if is_stale() {
            debug!(
                "[SegmentRouter] Source replaced, abandoning after {}/{} segments",
                index, total
            );
            return None;
        }

        let (start, end) = (pair[0], pair[1]);
        let result = match provider.fetch_directions(start, end).await {
            Ok(points) => {
                let routed: Vec<GeoPoint> = points.into_iter().filter(|p| p.is_finite()).collect();
                debug!(
                    "[SegmentRouter] Segment {}/{}: {} points",
                    index + 1,
                    total,
                    routed.len()
                );
                SegmentResult::Routed(routed)
            }
            Err(e) => {
                warn!(
                    "[SegmentRouter] Segment {}/{} ({:.6},{:.6} -> {:.6},{:.6}) failed: {}",
                    index + 1,
                    total,
                    start.latitude,
                    start.longitude,
                    end.latitude,
                    end.longitude,
                    e
                );
                SegmentResult::Failed(e.to_string())
            }
        };

        segments.push(SegmentOutcome {
            index,
            start,
            end,
            result,
        });
    }

    let path = RoutedPath::from_segments(segments);
    info!(
        "[SegmentRouter] Completed: {}/{} segments routed ({} points) in {:.2}s",
        path.succeeded_count(),
        total,
        path.points.len(),
        start_time.elapsed().as_secs_f64()
    );
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteError;
    use futures::FutureExt;
    use std::sync::Mutex;

    /// Returns `[start, midpoint, end]`, failing for the listed pair indices.
    struct FakeDirections {
        waypoints: Vec<GeoPoint>,
        failing: Vec<usize>,
        calls: Mutex<Vec<usize>>,
    }

    impl FakeDirections {
        fn new(waypoints: &[GeoPoint], failing: &[usize]) -> Self {
            Self {
                waypoints: waypoints.to_vec(),
                failing: failing.to_vec(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl DirectionsProvider for FakeDirections {
        fn fetch_directions(
            &self,
            start: GeoPoint,
            end: GeoPoint,
        ) -> BoxFuture<'_, Result<Vec<GeoPoint>>> {
            let index = self
                .waypoints
                .iter()
                .position(|w| *w == start)
                .unwrap_or(usize::MAX);
            self.calls.lock().unwrap().push(index);
            let fail = self.failing.contains(&index);
            async move {
                if fail {
                    Err(RouteError::routing("HTTP 500", Some(500)))
                } else {
                    Ok(vec![start, start.midpoint(&end), end])
                }
            }
            .boxed()
        }
    }

    fn waypoints(n: usize) -> Vec<GeoPoint> {
        (0..n).map(|i| GeoPoint::new(i as f64, i as f64 * 2.0)).collect()
    }

    #[tokio::test]
    async fn test_all_segments_in_order() {
        let wps = waypoints(4);
        let provider = FakeDirections::new(&wps, &[]);
        let path = build_routed_path(&wps, &provider).await;

        assert_eq!(path.segments.len(), 3);
        assert_eq!(path.failed_count(), 0);
        assert_eq!(path.points.len(), 9);
        for (i, chunk) in path.points.chunks(3).enumerate() {
            assert_eq!(chunk[0], wps[i]);
            assert_eq!(chunk[2], wps[i + 1]);
        }
        assert_eq!(*provider.calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failed_segment_is_skipped() {
        let wps = waypoints(5);
        let provider = FakeDirections::new(&wps, &[1]);
        let path = build_routed_path(&wps, &provider).await;

        assert_eq!(path.segments.len(), 4);
        assert_eq!(path.succeeded_count(), 3);
        assert_eq!(path.failed_count(), 1);
        assert_eq!(path.points.len(), 9);
        assert_eq!(path.points[0], wps[0]);
        assert_eq!(path.points[2], wps[1]);
        // segment 1 missing: next points start at waypoint 2
        assert_eq!(path.points[3], wps[2]);
        assert_eq!(path.points[8], wps[4]);

        let failures: Vec<_> = path.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.index, 1);
        assert!(failures[0].1.contains("500"));
        // later pairs still requested
        assert_eq!(*provider.calls.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_too_few_waypoints() {
        let provider = FakeDirections::new(&[], &[]);
        assert!(build_routed_path(&[], &provider).await.points.is_empty());
        let one = waypoints(1);
        let path = build_routed_path(&one, &provider).await;
        assert!(path.points.is_empty());
        assert!(path.segments.is_empty());
    }

    #[tokio::test]
    async fn test_stale_check_abandons() {
        let wps = waypoints(4);
        let provider = FakeDirections::new(&wps, &[]);
        let checks = Mutex::new(0);
        let result = route_segments(&wps, &provider, || {
            let mut n = checks.lock().unwrap();
            *n += 1;
            *n > 1
        })
        .await;
        assert!(result.is_none());
        assert_eq!(*provider.calls.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_into_planned_route() {
        let wps = waypoints(2);
        let provider = FakeDirections::new(&wps, &[]);
        let route = build_routed_path(&wps, &provider)
            .await
            .into_planned_route(wps.clone());
        assert_eq!(route.waypoints, wps);
        assert_eq!(route.points.len(), 3);
        assert!(route.bounds.is_some());
    }
}
