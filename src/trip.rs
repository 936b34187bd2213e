//! Trip summaries: distance, duration, history and sharing.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteError};
use crate::geo_utils::haversine_total;
use crate::tracking::RecordedTrack;
use crate::GeoPoint;

/// Finalized record of one tracking session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Haversine length of `path` in kilometers
    pub distance_km: f64,
    pub note: Option<String>,
    pub path: Vec<GeoPoint>,
}

impl TripSummary {
    /// Summarize a finished recording. A blank note is stored as `None`.
    pub fn from_track(track: RecordedTrack, label: impl Into<String>, note: Option<String>) -> Self {
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self {
            label: label.into(),
            start_time: track.started_at,
            end_time: track.ended_at,
            distance_km: haversine_total(&track.path),
            note,
            path: track.path,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Human-readable summary for messaging apps.
    pub fn share_message(&self) -> String {
        let mut message = format!(
            "{}\nStart: {}\nDuration: {}\nDistance: {:.2} km",
            self.label,
            self.start_time.format("%Y-%m-%d %H:%M UTC"),
            format_duration(self.duration()),
            self.distance_km
        );
        if let Some(note) = &self.note {
            message.push_str("\nNote: ");
            message.push_str(note);
        }
        message
    }

    /// `base_url?text=<encoded share message>`, e.g. a `https://wa.me/` link.
    pub fn share_link(&self, base_url: &str) -> String {
        format!(
            "{}?text={}",
            base_url,
            urlencoding::encode(&self.share_message())
        )
    }
}

/// Default label: `"<prefix> YYYY-MM-DD HH:MM"` from the trip start.
pub fn default_label(prefix: &str, start_time: DateTime<Utc>) -> String {
    format!("{} {}", prefix, start_time.format("%Y-%m-%d %H:%M"))
}

fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m {:02}s", minutes, seconds)
    }
}

/// Caller-owned storage that finalized trips are handed to.
///
/// The pipeline only writes; it never reads the storage back.
pub trait TripSink {
    fn save_trip_summary(&self, summary: &TripSummary) -> Result<()>;
}

/// In-memory trip history, oldest first, with JSON export.
#[derive(Debug, Default)]
pub struct TripHistory {
    trips: Mutex<Vec<TripSummary>>,
}

impl TripHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a history previously produced by [`TripHistory::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let trips: Vec<TripSummary> = serde_json::from_str(json)
            .map_err(|e| RouteError::storage(format!("invalid trip history: {}", e)))?;
        Ok(Self {
            trips: Mutex::new(trips),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.trips())
            .map_err(|e| RouteError::storage(format!("failed to serialize trip history: {}", e)))
    }

    pub fn trips(&self) -> Vec<TripSummary> {
        self.trips
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.trips.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TripSink for TripHistory {
    fn save_trip_summary(&self, summary: &TripSummary) -> Result<()> {
        self.trips
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
        Ok(())
    }
}
