//! JSON boundary with the app and its backend.
//!
//! | Function | Payload |
//! |----------|---------|
//! | [`segments_from_json`] | `[{name, points, tags}]` |
//! | [`facilities_from_json`] | `[{lat, lng, category, name?}]` |
//! | [`osm_from_json`] | raw Overpass `out geom;` document |
//! | [`tracks_from_json`] | `[{sessionId, scenicId, ..., points}]` |
//! | [`context_from_json`] | `{userType, hourOfDay, weather, season?, preferences?}` |
//! | [`to_json`] | any result list |
//!
//! Track decoding is tolerant: recorded tracks come from phones and local storage, so a
//! fix without a latitude or longitude is dropped with a warning instead of failing the
//! whole payload. Everything else is decoded strictly.

use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::osm::{FacilityPoint, OsmInputs, OverpassResponse, PathSegment};
use crate::scoring::ScoringContext;
use crate::tracks::Track;
use crate::GeoPoint;

pub fn segments_from_json(json: &str) -> Result<Vec<PathSegment>> {
    Ok(serde_json::from_str(json)?)
}

pub fn facilities_from_json(json: &str) -> Result<Vec<FacilityPoint>> {
    Ok(serde_json::from_str(json)?)
}

/// Segments and facilities straight from an Overpass response.
pub fn osm_from_json(json: &str) -> Result<OsmInputs> {
    Ok(OverpassResponse::from_json(json)?.into_inputs())
}

pub fn context_from_json(json: &str) -> Result<ScoringContext> {
    Ok(serde_json::from_str(json)?)
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

// =============================================================================
// Tracks
// =============================================================================

/// A recorded fix as stored by the app; coordinates may be missing.
#[derive(Debug, Deserialize)]
struct RawPoint {
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon")]
    longitude: Option<f64>,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    timestamp: Option<i64>,
}

impl RawPoint {
    fn into_point(self) -> Option<GeoPoint> {
        Some(GeoPoint {
            latitude: self.latitude?,
            longitude: self.longitude?,
            accuracy: self.accuracy,
            speed: self.speed,
            heading: self.heading,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrack {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    scenic_id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default, deserialize_with = "lenient_millis")]
    start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    end_time: Option<i64>,
    #[serde(default)]
    points: Vec<RawPoint>,
    #[serde(default)]
    total_length: f64,
    #[serde(default)]
    avg_speed: f64,
    #[serde(default)]
    quality: Option<f64>,
}

/// Millisecond timestamps sometimes arrive as floats (`1.7e12`).
fn lenient_millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).map(|v| v as i64))
}

/// Decode recorded tracks, dropping fixes without coordinates and tracks left with
/// fewer than two fixes.
pub fn tracks_from_json(json: &str) -> Result<Vec<Track>> {
    let raw: Vec<RawTrack> = serde_json::from_str(json)?;
    let total = raw.len();
    let mut dropped_points = 0usize;

    let tracks: Vec<Track> = raw
        .into_iter()
        .filter_map(|rt| {
            let received = rt.points.len();
            let points: Vec<GeoPoint> = rt.points.into_iter().filter_map(RawPoint::into_point).collect();

            if points.len() < received {
                warn!(
                    "[Payload] Track {}: dropped {} fix(es) without coordinates",
                    rt.session_id,
                    received - points.len()
                );
                dropped_points += received - points.len();
            }
            if points.len() < 2 {
                warn!("[Payload] Track {}: dropped, {} usable fix(es)", rt.session_id, points.len());
                return None;
            }

            let start_time = rt
                .start_time
                .or_else(|| points.first().and_then(|p| p.timestamp))
                .unwrap_or(0);
            Some(Track {
                session_id: rt.session_id,
                scenic_id: rt.scenic_id,
                user_id: rt.user_id,
                start_time,
                end_time: rt.end_time,
                points,
                total_length: rt.total_length,
                avg_speed: rt.avg_speed,
                quality: rt.quality.unwrap_or(1.0),
            })
        })
        .collect();

    info!(
        "[Payload] Decoded {}/{} tracks ({} fixes dropped)",
        tracks.len(),
        total,
        dropped_points
    );
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeatlineError;
    use crate::osm::{FacilityCategory, HighwayType, WheelchairAccess};
    use crate::scoring::{HeatScorer, UserType, Weather};

    #[test]
    fn test_tracks_tolerate_missing_coordinates() {
        let json = r#"[
            {
                "sessionId": "s1",
                "scenicId": "lake",
                "startTime": 1700000000000,
                "points": [
                    {"lat": 30.25, "lng": 120.15, "timestamp": 1700000000000},
                    {"lat": 30.2501, "timestamp": 1700000001000},
                    {"lng": 120.15},
                    {"latitude": 30.2502, "longitude": 120.15, "timestamp": 1.700000002e12}
                ]
            },
            {
                "sessionId": "s2",
                "points": [{"lat": 30.0, "lng": 120.0}, {"lat": null, "lng": 120.0}]
            }
        ]"#;

        let tracks = tracks_from_json(json).unwrap();
        assert_eq!(tracks.len(), 1);

        let t = &tracks[0];
        assert_eq!(t.session_id, "s1");
        assert_eq!(t.scenic_id, "lake");
        assert_eq!(t.points.len(), 2);
        assert_eq!(t.points[1].timestamp, Some(1_700_000_002_000));
        assert_eq!(t.quality, 1.0);
    }

    #[test]
    fn test_tracks_start_time_fallback() {
        let json = r#"[{"points": [
            {"lat": 30.0, "lng": 120.0, "timestamp": 5000},
            {"lat": 30.001, "lng": 120.0, "timestamp": 9000}
        ]}]"#;
        let tracks = tracks_from_json(json).unwrap();
        assert_eq!(tracks[0].start_time, 5000);
        assert_eq!(tracks[0].duration_seconds(), Some(4.0));
    }

    #[test]
    fn test_tracks_reject_non_array() {
        assert!(matches!(tracks_from_json(r#"{"points": []}"#), Err(HeatlineError::Json(_))));
        assert!(tracks_from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_segments_and_facilities() {
        let segments = segments_from_json(
            r#"[{
                "name": "Boardwalk",
                "points": [{"lat": 30.25, "lng": 120.15}, {"lat": 30.2504, "lng": 120.15}],
                "tags": {"highway": "footway", "wheelchair": "limited", "incline": "4%"}
            }]"#,
        )
        .unwrap();
        assert_eq!(segments[0].tags.highway, HighwayType::Footway);
        assert_eq!(segments[0].tags.wheelchair, WheelchairAccess::Limited);

        let facilities =
            facilities_from_json(r#"[{"lat": 30.2502, "lng": 120.15, "category": "toilet"}]"#).unwrap();
        assert_eq!(facilities[0].category, FacilityCategory::Toilet);
    }

    #[test]
    fn test_scored_output_keys() {
        let segments = segments_from_json(
            r#"[{"name": "x", "points": [{"lat": 30.25, "lng": 120.15}, {"lat": 30.2504, "lng": 120.15}],
                 "tags": {"highway": "steps"}}]"#,
        )
        .unwrap();
        let ctx = context_from_json(r#"{"userType": "wheelchair", "hourOfDay": 15, "weather": "sunny"}"#).unwrap();
        assert_eq!(ctx.user_type, UserType::Wheelchair);
        assert_eq!(ctx.weather, Weather::Sunny);

        let scored = HeatScorer::default().score_all(&segments, &[], &ctx);
        let json = to_json(&scored).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let first = &value[0];
        assert_eq!(first["roadType"], "steps");
        assert_eq!(first["accessibility"], "unknown");
        assert_eq!(first["coordinates"][0][0], 120.15);
        assert!(first["lengthMeters"].as_f64().unwrap() > 40.0);
        assert!(first["breakdown"]["rawHeat"].is_number());
    }

    #[test]
    fn test_osm_from_json() {
        let json = r#"{"elements": [
            {"type": "way", "id": 7, "tags": {"highway": "path", "name": "Ridge"},
             "geometry": [{"lat": 30.0, "lon": 120.0}, {"lat": 30.001, "lon": 120.0}]},
            {"type": "node", "id": 8, "lat": 30.0005, "lon": 120.0, "tags": {"amenity": "bench"}}
        ]}"#;
        let inputs = osm_from_json(json).unwrap();
        assert_eq!(inputs.segments.len(), 1);
        assert_eq!(inputs.facilities.len(), 1);
    }

    #[test]
    fn test_context_rejects_unknown_profile() {
        let err = context_from_json(r#"{"userType": "astronaut", "hourOfDay": 1}"#);
        assert!(err.is_err());
    }
}
