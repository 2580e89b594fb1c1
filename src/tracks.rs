//! GPS track recording and preprocessing.
//!
//! A [`TrackRecorder`] collects fixes for one walking session and is consumed by
//! [`TrackRecorder::finish`], which produces an immutable [`Track`] with its derived
//! length, speed and quality.
//!
//! [`preprocess_track`] is the first stage of corridor discovery: it rejects tracks that
//! are too short and re-derives speed and quality, so tracks decoded from JSON without
//! those fields are handled the same way as freshly recorded ones.
//!
//! ## Quality
//! Starts at 1.0 and is multiplied down for each defect:
//!
//! | Defect | Default threshold | Factor |
//! |--------|-------------------|--------|
//! | Sparse sampling | < 0.5 points/s | ×0.8 |
//! | Poor accuracy | mean > 15 m | ×0.7 |
//! | Frequent gaps | > 10% of steps longer than 5 s | ×0.8 |
//!
//! Quality only weights a track's points during clustering; it never drops a track.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::polyline_length;
use crate::GeoPoint;

// =============================================================================
// Track
// =============================================================================

/// One recorded walking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    pub session_id: String,
    /// Scenic area the session was recorded in
    #[serde(default)]
    pub scenic_id: String,
    #[serde(default)]
    pub user_id: String,
    /// Unix epoch milliseconds
    #[serde(default)]
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub points: Vec<GeoPoint>,
    /// Meters
    #[serde(default)]
    pub total_length: f64,
    /// Meters per second
    #[serde(default)]
    pub avg_speed: f64,
    #[serde(default = "default_quality")]
    pub quality: f64,
}

fn default_quality() -> f64 {
    1.0
}

impl Track {
    /// Build a track from points alone, deriving length, speed and quality.
    pub fn from_points(session_id: impl Into<String>, points: Vec<GeoPoint>) -> Self {
        let start_time = points.first().and_then(|p| p.timestamp).unwrap_or(0);
        let mut track = Self {
            session_id: session_id.into(),
            scenic_id: String::new(),
            user_id: String::new(),
            start_time,
            end_time: None,
            points,
            total_length: 0.0,
            avg_speed: 0.0,
            quality: 1.0,
        };
        track.refresh_derived(&PreprocessConfig::default());
        track
    }

    /// Duration in seconds.
    ///
    /// Uses the first and last point timestamps when both exist, otherwise
    /// `end_time - start_time`. `None` when neither is available.
    pub fn duration_seconds(&self) -> Option<f64> {
        let first = self.points.first().and_then(|p| p.timestamp);
        let last = self.points.last().and_then(|p| p.timestamp);

        match (first, last, self.end_time) {
            (Some(a), Some(b), _) if b > a => Some((b - a) as f64 / 1000.0),
            (_, _, Some(end)) => Some((end - self.start_time) as f64 / 1000.0),
            (Some(a), Some(b), None) => Some((b - a) as f64 / 1000.0),
            _ => None,
        }
    }

    fn refresh_derived(&mut self, config: &PreprocessConfig) {
        let duration = self.duration_seconds();
        self.total_length = polyline_length(&self.points);
        self.avg_speed = average_speed(self.total_length, duration);
        self.quality = assess_quality(&self.points, duration, config);
    }
}

fn average_speed(length: f64, duration_seconds: Option<f64>) -> f64 {
    match duration_seconds {
        Some(d) if d > 0.0 => length / d,
        _ => 0.0,
    }
}

// =============================================================================
// Recording
// =============================================================================

/// Fix acceptance rules for [`TrackRecorder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Fixes with a worse (larger) accuracy radius are discarded (meters)
    pub max_accuracy: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { max_accuracy: 50.0 }
    }
}

/// Append-only collector for one session's fixes.
///
/// # Example
/// ```
/// use heatline::{GeoPoint, TrackRecorder};
///
/// let mut rec = TrackRecorder::start("s-1", "west-lake", "u-9", 0);
/// assert!(rec.record(GeoPoint::fix(30.2500, 120.1500, 0, Some(5.0))));
/// assert!(!rec.record(GeoPoint::fix(30.2501, 120.1500, 1_000, Some(80.0))));
/// assert!(rec.record(GeoPoint::fix(30.2505, 120.1500, 2_000, Some(5.0))));
///
/// let track = rec.finish(2_000);
/// assert_eq!(track.points.len(), 2);
/// assert!(track.total_length > 50.0);
/// ```
#[derive(Debug, Clone)]
pub struct TrackRecorder {
    config: RecorderConfig,
    session_id: String,
    scenic_id: String,
    user_id: String,
    start_time: i64,
    points: Vec<GeoPoint>,
}

impl TrackRecorder {
    pub fn start(
        session_id: impl Into<String>,
        scenic_id: impl Into<String>,
        user_id: impl Into<String>,
        start_time: i64,
    ) -> Self {
        Self::with_config(session_id, scenic_id, user_id, start_time, RecorderConfig::default())
    }

    pub fn with_config(
        session_id: impl Into<String>,
        scenic_id: impl Into<String>,
        user_id: impl Into<String>,
        start_time: i64,
        config: RecorderConfig,
    ) -> Self {
        Self {
            config,
            session_id: session_id.into(),
            scenic_id: scenic_id.into(),
            user_id: user_id.into(),
            start_time,
            points: Vec::new(),
        }
    }

    /// Append a fix. Returns `false` (and keeps nothing) for invalid coordinates or a
    /// fix less accurate than `max_accuracy`.
    pub fn record(&mut self, point: GeoPoint) -> bool {
        if !point.is_valid() {
            debug!("[Tracks] {}: rejected invalid fix", self.session_id);
            return false;
        }
        if point.accuracy.is_some_and(|a| a > self.config.max_accuracy) {
            debug!(
                "[Tracks] {}: rejected fix with accuracy {:?}m",
                self.session_id, point.accuracy
            );
            return false;
        }
        self.points.push(point);
        true
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Close the session and compute the derived fields.
    pub fn finish(self, end_time: i64) -> Track {
        let mut track = Track {
            session_id: self.session_id,
            scenic_id: self.scenic_id,
            user_id: self.user_id,
            start_time: self.start_time,
            end_time: Some(end_time),
            points: self.points,
            total_length: 0.0,
            avg_speed: 0.0,
            quality: 1.0,
        };
        track.refresh_derived(&PreprocessConfig::default());
        track
    }
}

// =============================================================================
// Preprocessing
// =============================================================================

/// Thresholds for track rejection and quality assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Tracks shorter than this are dropped (meters)
    pub min_track_length: f64,
    /// Points per second below which a track counts as sparse
    pub min_point_density: f64,
    pub sparse_factor: f64,
    /// Mean accuracy above which a track counts as imprecise (meters)
    pub max_mean_accuracy: f64,
    pub imprecise_factor: f64,
    /// Steps longer than this count as gaps (milliseconds)
    pub gap_threshold_ms: i64,
    /// Fraction of steps that may be gaps before the penalty applies
    pub max_gap_ratio: f64,
    pub gappy_factor: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_track_length: 50.0,
            min_point_density: 0.5,
            sparse_factor: 0.8,
            max_mean_accuracy: 15.0,
            imprecise_factor: 0.7,
            gap_threshold_ms: 5_000,
            max_gap_ratio: 0.1,
            gappy_factor: 0.8,
        }
    }
}

/// A track that survived preprocessing, with freshly derived metrics.
#[derive(Debug, Clone, Copy)]
pub struct PreparedTrack<'a> {
    /// Position in the caller's track slice
    pub index: usize,
    pub track: &'a Track,
    pub total_length: f64,
    pub duration_seconds: Option<f64>,
    pub avg_speed: f64,
    pub quality: f64,
}

/// Reject short or degenerate tracks and derive speed and quality.
///
/// Returns `None` for tracks with fewer than two points or shorter than
/// `min_track_length`.
pub fn preprocess_track<'a>(
    index: usize,
    track: &'a Track,
    config: &PreprocessConfig,
) -> Option<PreparedTrack<'a>> {
    if track.points.len() < 2 {
        debug!("[Tracks] {}: dropped, {} point(s)", track.session_id, track.points.len());
        return None;
    }

    let total_length = polyline_length(&track.points);
    if total_length.is_nan() || total_length < config.min_track_length {
        debug!(
            "[Tracks] {}: dropped, {:.1}m < {:.0}m",
            track.session_id, total_length, config.min_track_length
        );
        return None;
    }

    let duration_seconds = track.duration_seconds();
    Some(PreparedTrack {
        index,
        track,
        total_length,
        duration_seconds,
        avg_speed: average_speed(total_length, duration_seconds),
        quality: assess_quality(&track.points, duration_seconds, config),
    })
}

/// Quality score in (0, 1]. See the module docs for the factors.
pub fn assess_quality(
    points: &[GeoPoint],
    duration_seconds: Option<f64>,
    config: &PreprocessConfig,
) -> f64 {
    let mut quality = 1.0;

    if let Some(d) = duration_seconds.filter(|d| *d > 0.0) {
        if (points.len() as f64) / d < config.min_point_density {
            quality *= config.sparse_factor;
        }
    }

    let accuracies: Vec<f64> = points.iter().filter_map(|p| p.accuracy).collect();
    if !accuracies.is_empty() {
        let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        if mean > config.max_mean_accuracy {
            quality *= config.imprecise_factor;
        }
    }

    if points.len() >= 2 {
        let gaps = points
            .windows(2)
            .filter(|w| match (w[0].timestamp, w[1].timestamp) {
                (Some(a), Some(b)) => b - a > config.gap_threshold_ms,
                _ => false,
            })
            .count();
        if gaps as f64 / (points.len() - 1) as f64 > config.max_gap_ratio {
            quality *= config.gappy_factor;
        }
    }

    quality
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points heading north, `step_m` apart and `step_ms` apart in time.
    fn walk(n: usize, step_m: f64, step_ms: i64, accuracy: Option<f64>) -> Vec<GeoPoint> {
        let dlat = step_m / 111_195.0;
        (0..n)
            .map(|i| GeoPoint::fix(30.25 + dlat * i as f64, 120.15, i as i64 * step_ms, accuracy))
            .collect()
    }

    #[test]
    fn test_clean_track_full_quality() {
        let track = Track::from_points("t", walk(60, 1.5, 1_000, Some(5.0)));
        assert_eq!(track.quality, 1.0);
        assert!((track.total_length - 88.5).abs() < 0.5);
        assert!((track.avg_speed - 1.5).abs() < 0.05);
    }

    #[test]
    fn test_quality_factors_compound() {
        // 10 points over 90 s: sparse, every step a gap, poor accuracy
        let points = walk(10, 10.0, 10_000, Some(20.0));
        let q = assess_quality(&points, Some(90.0), &PreprocessConfig::default());
        assert!((q - 0.8 * 0.7 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_quality_without_timing_or_accuracy() {
        let points: Vec<GeoPoint> = (0..5).map(|i| GeoPoint::new(30.0 + i as f64 * 1e-4, 120.0)).collect();
        assert_eq!(assess_quality(&points, None, &PreprocessConfig::default()), 1.0);
    }

    #[test]
    fn test_preprocess_rejects_short_tracks() {
        let config = PreprocessConfig::default();
        let short = Track::from_points("short", walk(10, 2.0, 1_000, None));
        assert!(preprocess_track(0, &short, &config).is_none());

        let single = Track::from_points("single", walk(1, 2.0, 1_000, None));
        assert!(preprocess_track(1, &single, &config).is_none());

        let long = Track::from_points("long", walk(30, 2.0, 1_000, None));
        let prepared = preprocess_track(2, &long, &config).unwrap();
        assert_eq!(prepared.index, 2);
        assert!(prepared.total_length >= 50.0);
        assert_eq!(prepared.duration_seconds, Some(29.0));
    }

    #[test]
    fn test_preprocess_recomputes_missing_fields() {
        let json = r#"{
            "sessionId": "s",
            "startTime": 0,
            "points": [
                {"lat": 30.2500, "lng": 120.15, "timestamp": 0},
                {"lat": 30.2510, "lng": 120.15, "timestamp": 60000}
            ]
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.total_length, 0.0);
        assert_eq!(track.quality, 1.0);

        let prepared = preprocess_track(0, &track, &PreprocessConfig::default()).unwrap();
        assert!(prepared.total_length > 100.0);
        assert!(prepared.avg_speed > 1.0 && prepared.avg_speed < 2.5);
        // 2 points in 60 s is sparse, and the only step is a gap
        assert!((prepared.quality - 0.64).abs() < 1e-9);
    }

    #[test]
    fn test_duration_fallback_and_zero_speed() {
        let mut track = Track::from_points("t", vec![GeoPoint::new(30.0, 120.0), GeoPoint::new(30.001, 120.0)]);
        assert_eq!(track.duration_seconds(), None);
        assert_eq!(track.avg_speed, 0.0);

        track.start_time = 1_000;
        track.end_time = Some(61_000);
        assert_eq!(track.duration_seconds(), Some(60.0));
    }

    #[test]
    fn test_recorder_filters_fixes() {
        let mut rec = TrackRecorder::start("s", "area", "u", 0);
        assert!(rec.is_empty());
        assert!(rec.record(GeoPoint::fix(30.0, 120.0, 0, None)));
        assert!(!rec.record(GeoPoint::fix(f64::NAN, 120.0, 500, None)));
        assert!(!rec.record(GeoPoint::fix(30.0, 200.0, 600, None)));
        assert!(!rec.record(GeoPoint::fix(30.0, 120.0, 700, Some(51.0))));
        assert!(rec.record(GeoPoint::fix(30.0005, 120.0, 1_000, Some(50.0))));
        assert_eq!(rec.len(), 2);
        let kept: Vec<i64> = rec.points().iter().filter_map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![0, 1_000]);

        let track = rec.finish(1_000);
        assert_eq!(track.scenic_id, "area");
        assert_eq!(track.end_time, Some(1_000));
        assert!(track.total_length > 50.0);
        assert!(track.quality > 0.0 && track.quality <= 1.0);
    }

    #[test]
    fn test_recorder_custom_accuracy() {
        let strict = RecorderConfig { max_accuracy: 10.0 };
        let mut rec = TrackRecorder::with_config("s", "a", "u", 0, strict);
        assert!(!rec.record(GeoPoint::fix(30.0, 120.0, 0, Some(12.0))));
        assert!(rec.record(GeoPoint::fix(30.0, 120.0, 0, Some(8.0))));
    }
}
