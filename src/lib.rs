//! # Heatline
//!
//! Accessibility "heat" lines for an accessibility-travel app.
//!
//! This library provides:
//! - Per-profile heat scoring of OpenStreetMap path segments
//! - Corridor discovery from recorded GPS tracks (DBSCAN over track points)
//! - JSON payload decoding/encoding for the app and its backend
//!
//! | Pipeline | Input | Output |
//! |----------|-------|--------|
//! | Static   | `PathSegment` + `FacilityPoint` + `ScoringContext` | `ScoredSegment` |
//! | Tracks   | `Track` (+ optional `Bounds`) | `CorridorHeatline` sorted by heat |
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel scoring and per-area clustering with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use heatline::{GeoPoint, HeatScorer, PathSegment, ScoringContext, UserType, Weather, WayTags};
//!
//! let segment = PathSegment::new(
//!     "Riverside footway",
//!     vec![GeoPoint::new(51.5074, -0.1278), GeoPoint::new(51.5078, -0.1278)],
//!     WayTags { highway: "footway".into(), ..WayTags::default() },
//! );
//!
//! let scorer = HeatScorer::default();
//! let ctx = ScoringContext::new(UserType::Elderly, 10, Weather::Cloudy);
//! let scored = scorer.score_all(&[segment], &[], &ctx);
//!
//! assert_eq!(scored.len(), 1);
//! assert!((0.1..=1.0).contains(&scored[0].heat));
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{HeatlineError, Result};

pub mod geo_utils;

pub mod osm;
pub use osm::{
    FacilityCategory, FacilityPoint, HighwayType, OsmInputs, OverpassResponse, PathSegment,
    WayTags, WheelchairAccess,
};

pub mod scoring;
pub use scoring::{
    HeatScorer, ScoreBreakdown, ScoredSegment, ScoringContext, ScoringTables, Season, UserType,
    Weather,
};

pub mod tracks;
pub use tracks::{preprocess_track, PreparedTrack, PreprocessConfig, RecorderConfig, Track, TrackRecorder};

pub mod clustering;
pub use clustering::{dbscan, Cluster, ClusterPoint};

pub mod corridors;
pub use corridors::{
    analyze_by_scenic_area, analyze_tracks_to_heatlines, find_corridors, AccessibilityHeuristic,
    ClusterConfig, Corridor, CorridorHeatline, TrackClusterer,
};
#[cfg(feature = "parallel")]
pub use corridors::analyze_by_scenic_area_parallel;

pub mod config;
pub use config::HeatlineConfig;

pub mod payload;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("Heatline"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS fix or map vertex.
///
/// Only latitude and longitude are required. Recorded fixes also carry accuracy
/// (meters), speed (m/s), heading (degrees) and a Unix timestamp in milliseconds.
///
/// # Example
/// ```
/// use heatline::GeoPoint;
/// let point = GeoPoint::new(30.2590, 120.1300);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl GeoPoint {
    /// Create a bare coordinate with no fix metadata.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// Create a recorded fix with a timestamp (ms) and optional accuracy (m).
    pub fn fix(latitude: f64, longitude: f64, timestamp: i64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Geographic bounding box used to restrict track analysis to an area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points, `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Inclusive containment check.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;

    /// Score OSM segments for one context.
    ///
    /// `segments_json` is an array of segments, `facilities_json` an array of facilities
    /// (may be `"[]"`), `context_json` a scoring context. Returns the scored segments as JSON.
    #[uniffi::export]
    pub fn score_segments_json(
        segments_json: String,
        facilities_json: String,
        context_json: String,
    ) -> std::result::Result<String, HeatlineError> {
        init_logging();
        let segments = payload::segments_from_json(&segments_json)?;
        let facilities = payload::facilities_from_json(&facilities_json)?;
        let context = payload::context_from_json(&context_json)?;

        info!(
            "[Heatline] score_segments_json: {} segments, {} facilities",
            segments.len(),
            facilities.len()
        );

        let scored = HeatScorer::default().score_all_parallel(&segments, &facilities, &context);
        payload::to_json(&scored)
    }

    /// Turn recorded tracks into corridor heat-lines.
    ///
    /// `config_json` may be empty to use the defaults.
    #[uniffi::export]
    pub fn analyze_tracks_json(
        tracks_json: String,
        bounds: Option<Bounds>,
        config_json: String,
    ) -> std::result::Result<String, HeatlineError> {
        init_logging();
        let tracks = payload::tracks_from_json(&tracks_json)?;
        let config = if config_json.trim().is_empty() {
            HeatlineConfig::default()
        } else {
            HeatlineConfig::from_json(&config_json)?
        };

        info!("[Heatline] analyze_tracks_json: {} tracks", tracks.len());

        let heatlines = analyze_tracks_to_heatlines(&tracks, bounds.as_ref(), &config.clustering);
        payload::to_json(&heatlines)
    }

    /// Get default configuration as JSON.
    #[uniffi::export]
    pub fn default_config_json() -> std::result::Result<String, HeatlineError> {
        init_logging();
        info!("[Heatline] default_config_json called");
        HeatlineConfig::default().to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geopoint_validity() {
        assert!(GeoPoint::new(0.0, 0.0).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_geopoint_json_aliases() {
        let p: GeoPoint = serde_json::from_str(r#"{"lat": 30.1, "lng": 120.2}"#).unwrap();
        assert_eq!(p, GeoPoint::new(30.1, 120.2));

        let p: GeoPoint =
            serde_json::from_str(r#"{"latitude": 30.1, "lon": 120.2, "timestamp": 1700000000000}"#)
                .unwrap();
        assert_eq!(p.timestamp, Some(1_700_000_000_000));
        assert_eq!(p.accuracy, None);

        let out = serde_json::to_string(&GeoPoint::new(1.0, 2.0)).unwrap();
        assert_eq!(out, r#"{"latitude":1.0,"longitude":2.0}"#);
    }

    #[test]
    fn test_bounds() {
        assert!(Bounds::from_points(&[]).is_none());

        let b = Bounds::from_points(&[GeoPoint::new(10.0, 20.0), GeoPoint::new(12.0, 24.0)]).unwrap();
        assert_eq!(b.min_lat, 10.0);
        assert_eq!(b.max_lng, 24.0);
        assert_eq!(b.center(), GeoPoint::new(11.0, 22.0));
        assert!(b.contains(&GeoPoint::new(10.0, 24.0)));
        assert!(!b.contains(&GeoPoint::new(12.1, 22.0)));
    }

    #[test]
    fn test_bounds_json_camel_case() {
        let b: Bounds =
            serde_json::from_str(r#"{"minLat": 1, "maxLat": 2, "minLng": 3, "maxLng": 4}"#).unwrap();
        assert_eq!(b.max_lng, 4.0);
    }
}
