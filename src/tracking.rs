//! Live track recording.
//!
//! `Idle -> start -> Active -> stop -> Idle`. While active, every sample the
//! position source pushes is appended to the recorded path, unfiltered and in
//! arrival order. Stopping cancels the subscription, and samples still in
//! flight from that subscription are dropped. Each start begins a fresh path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::{debug, info, warn};

use crate::error::{Result, RouteError};
use crate::GeoPoint;

/// Something pushed by a continuous position subscription.
#[derive(Debug, Clone)]
pub enum PositionEvent {
    Sample(GeoPoint),
    /// A stream error, normally [`RouteError::Position`]
    Error(RouteError),
}

/// Callback a position source invokes for every event.
pub type PositionCallback = Arc<dyn Fn(PositionEvent) + Send + Sync>;

/// Device geolocation capability.
pub trait PositionSource {
    /// One-shot position fix.
    fn current_position(&self) -> BoxFuture<'_, Result<GeoPoint>>;

    /// Start pushing events to `on_event` until the returned subscription is
    /// cancelled or dropped. Fails with [`RouteError::Position`] when
    /// location access is denied or unavailable.
    fn subscribe(&self, on_event: PositionCallback) -> Result<Subscription>;
}

/// Cancellation handle for a position subscription. Dropping it cancels.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the action that detaches from the underlying stream.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Active,
}

/// A finished recording, handed to the trip summarizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrack {
    pub path: Vec<GeoPoint>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// State shared with the subscription callback.
#[derive(Default)]
struct RecorderShared {
    /// Bumped on every start; callbacks from older subscriptions are ignored
    session: u64,
    active: bool,
    path: Vec<GeoPoint>,
    last_error: Option<RouteError>,
}

fn lock(shared: &Mutex<RecorderShared>) -> MutexGuard<'_, RecorderShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records the live path between start and stop.
#[derive(Default)]
pub struct TrackRecorder {
    shared: Arc<Mutex<RecorderShared>>,
    subscription: Option<Subscription>,
    started_at: Option<DateTime<Utc>>,
}

impl TrackRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackingState {
        if lock(&self.shared).active {
            TrackingState::Active
        } else {
            TrackingState::Idle
        }
    }

    /// Subscribe to `source` and begin a fresh path.
    ///
    /// Fails if already active, or with the source's error if it refuses the
    /// subscription (the recorder then stays idle).
    pub fn start<S>(&mut self, source: &S) -> Result<DateTime<Utc>>
    where
        S: PositionSource + ?Sized,
    {
        let session = {
            let mut shared = lock(&self.shared);
            if shared.active {
                return Err(RouteError::tracking("tracking is already active"));
            }
            shared.session += 1;
            shared.active = true;
            shared.path.clear();
            shared.last_error = None;
            shared.session
        };

        let shared = Arc::clone(&self.shared);
        let on_event: PositionCallback = Arc::new(move |event| {
            let mut state = lock(&shared);
            if !state.active || state.session != session {
                debug!("[TrackRecorder] Dropping event from finished session {}", session);
                return;
            }
            match event {
                PositionEvent::Sample(point) => state.path.push(point),
                PositionEvent::Error(e) => {
                    warn!("[TrackRecorder] Position stream error: {}", e);
                    state.last_error = Some(e);
                }
            }
        });

        match source.subscribe(on_event) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                lock(&self.shared).active = false;
                warn!("[TrackRecorder] Could not subscribe to positions: {}", e);
                return Err(e);
            }
        }

        let started_at = Utc::now();
        self.started_at = Some(started_at);
        info!("[TrackRecorder] Tracking started (session {})", session);
        Ok(started_at)
    }

    /// Stop accepting samples, detach from the source and return the path.
    pub fn stop(&mut self) -> Result<RecordedTrack> {
        let path = {
            let mut shared = lock(&self.shared);
            if !shared.active {
                return Err(RouteError::tracking("tracking is not active"));
            }
            shared.active = false;
            std::mem::take(&mut shared.path)
        };

        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }

        let ended_at = Utc::now();
        let started_at = self.started_at.take().unwrap_or(ended_at);
        info!("[TrackRecorder] Tracking stopped with {} samples", path.len());

        Ok(RecordedTrack {
            path,
            started_at,
            ended_at,
        })
    }

    /// Snapshot of the path recorded so far in the current session.
    pub fn path(&self) -> Vec<GeoPoint> {
        lock(&self.shared).path.clone()
    }

    /// Most recent stream error of the current session.
    pub fn last_error(&self) -> Option<RouteError> {
        lock(&self.shared).last_error.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
