//! # Corridor Discovery
//!
//! Turns recorded GPS tracks into ranked "corridor" heat-lines: places many people
//! actually walk through.
//!
//! ## Algorithm
//! 1. Preprocess tracks (drop short ones, derive speed and quality)
//! 2. Flatten surviving points, weighted by their track's quality
//! 3. DBSCAN (`eps` 5 m, `min_pts` 3)
//! 4. One corridor per cluster passed by at least two distinct tracks
//! 5. Confidence, heat and an accessibility label per corridor
//! 6. Drop low-confidence corridors, optionally merge near-duplicates, sort by heat
//!
//! The corridor path is the cluster's points in timestamp order, thinned so consecutive
//! kept points are at least `path_spacing_meters` apart. It is a simplified centreline,
//! not a fitted curve.
//!
//! The accessibility label is a speed proxy (slow passage reads as easier terrain), not
//! ground truth. See [`AccessibilityHeuristic`].

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::clustering::{dbscan, Cluster, ClusterPoint};
use crate::error::{HeatlineError, Result};
use crate::geo_utils::{haversine_distance, weighted_centroid};
use crate::osm::WheelchairAccess;
use crate::tracks::{preprocess_track, PreparedTrack, PreprocessConfig, Track};
use crate::{Bounds, GeoPoint};

// =============================================================================
// Configuration
// =============================================================================

/// Maps the mean speed of a corridor's tracks to a wheelchair label.
///
/// The score starts at `base_score` and gains `slow_bonus` when the mean speed is
/// below `slow_speed_threshold`. With the defaults the score tops out at 0.7, so the
/// label is `limited` for slow corridors and `no` otherwise.
///
/// The mean only covers tracks with a known, positive duration. A corridor whose
/// tracks carry no timing has no mean speed and never gets the slow bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityHeuristic {
    pub base_score: f64,
    /// m/s
    pub slow_speed_threshold: f64,
    pub slow_bonus: f64,
    pub yes_above: f64,
    pub limited_above: f64,
}

impl Default for AccessibilityHeuristic {
    fn default() -> Self {
        Self {
            base_score: 0.5,
            slow_speed_threshold: 1.5,
            slow_bonus: 0.2,
            yes_above: 0.8,
            limited_above: 0.5,
        }
    }
}

impl AccessibilityHeuristic {
    pub fn score(&self, mean_speed: Option<f64>) -> f64 {
        match mean_speed {
            Some(speed) if speed < self.slow_speed_threshold => self.base_score + self.slow_bonus,
            _ => self.base_score,
        }
    }

    pub fn classify(&self, mean_speed: Option<f64>) -> WheelchairAccess {
        let score = self.score(mean_speed);
        if score > self.yes_above {
            WheelchairAccess::Yes
        } else if score > self.limited_above {
            WheelchairAccess::Limited
        } else {
            WheelchairAccess::No
        }
    }
}

/// Configuration for corridor discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// DBSCAN neighbourhood radius (meters)
    pub eps_meters: f64,
    /// Neighbours (excluding the point itself) needed for a core point
    pub min_pts: usize,
    /// Distinct tracks a cluster needs to become a corridor
    pub min_tracks_per_corridor: usize,
    /// Corridors below this confidence are dropped
    pub min_confidence: f64,
    /// Minimum spacing of the thinned corridor path (meters)
    pub path_spacing_meters: f64,
    /// Merge corridors whose centres are this close. `None` disables merging.
    pub merge_distance_meters: Option<f64>,
    pub preprocess: PreprocessConfig,
    pub accessibility: AccessibilityHeuristic,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps_meters: 5.0,
            min_pts: 3,
            min_tracks_per_corridor: 2,
            min_confidence: 0.7,
            path_spacing_meters: 5.0,
            merge_distance_meters: None,
            preprocess: PreprocessConfig::default(),
            accessibility: AccessibilityHeuristic::default(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.eps_meters.is_finite() && self.eps_meters > 0.0) {
            return Err(HeatlineError::config(
                "eps_meters",
                format!("must be positive, got {}", self.eps_meters),
            ));
        }
        if self.min_pts == 0 {
            return Err(HeatlineError::config("min_pts", "must be at least 1"));
        }
        if self.min_tracks_per_corridor == 0 {
            return Err(HeatlineError::config("min_tracks_per_corridor", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(HeatlineError::config(
                "min_confidence",
                format!("must be within [0, 1], got {}", self.min_confidence),
            ));
        }
        if self.path_spacing_meters.is_nan() || self.path_spacing_meters < 0.0 {
            return Err(HeatlineError::config(
                "path_spacing_meters",
                format!("must be non-negative, got {}", self.path_spacing_meters),
            ));
        }
        if let Some(d) = self.merge_distance_meters {
            if !(d.is_finite() && d > 0.0) {
                return Err(HeatlineError::config(
                    "merge_distance_meters",
                    format!("must be positive when set, got {}", d),
                ));
            }
        }
        if self.preprocess.min_track_length.is_nan() || self.preprocess.min_track_length < 0.0 {
            return Err(HeatlineError::config(
                "preprocess.min_track_length",
                format!("must be non-negative, got {}", self.preprocess.min_track_length),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Output Types
// =============================================================================

/// A popular walking corridor derived from one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corridor {
    pub id: String,
    /// Quality-weighted centroid of the cluster
    pub center: GeoPoint,
    /// Thinned centreline in timestamp order
    pub path: Vec<GeoPoint>,
    /// Twice the mean member distance from the centre (meters)
    pub width: f64,
    pub track_count: usize,
    pub point_count: usize,
    pub avg_quality: f64,
    /// Mean of the passing tracks' average speeds (m/s), over tracks with timing only
    pub avg_speed: Option<f64>,
    pub confidence: f64,
    pub heat: f64,
    pub accessibility: WheelchairAccess,
}

/// Corridor as a map heat-line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorHeatline {
    pub id: String,
    pub name: String,
    /// `[lng, lat]` pairs
    pub coordinates: Vec<[f64; 2]>,
    pub heat: f64,
    pub accessibility: WheelchairAccess,
    /// Always `"corridor"`
    pub category: String,
    pub confidence: f64,
    pub track_count: usize,
    pub width: f64,
}

impl Corridor {
    pub fn to_heatline(&self) -> CorridorHeatline {
        CorridorHeatline {
            id: self.id.clone(),
            name: format!("Popular corridor ({} tracks)", self.track_count),
            coordinates: self.path.iter().map(|p| [p.longitude, p.latitude]).collect(),
            heat: self.heat,
            accessibility: self.accessibility,
            category: "corridor".to_string(),
            confidence: self.confidence,
            track_count: self.track_count,
            width: self.width,
        }
    }
}

/// `0.5 + min(tracks×0.1, 0.3) + avg_quality×0.2 + min(points_per_track×0.01, 0.1)`, in [0, 1].
pub fn corridor_confidence(track_count: usize, avg_quality: f64, point_count: usize) -> f64 {
    if track_count == 0 {
        return 0.0;
    }
    let tc = track_count as f64;
    let density = point_count as f64 / tc;
    let confidence = 0.5 + (tc * 0.1).min(0.3) + avg_quality * 0.2 + (density * 0.01).min(0.1);
    confidence.clamp(0.0, 1.0)
}

/// `0.3 + min(tracks×0.1, 0.4) + confidence×0.3`, in [0.1, 1].
pub fn corridor_heat(track_count: usize, confidence: f64) -> f64 {
    let heat = 0.3 + (track_count as f64 * 0.1).min(0.4) + confidence * 0.3;
    heat.clamp(0.1, 1.0)
}

// =============================================================================
// Clusterer
// =============================================================================

/// Corridor discovery with a fixed configuration.
///
/// # Example
/// ```
/// use heatline::{ClusterConfig, TrackClusterer};
///
/// let clusterer = TrackClusterer::new(ClusterConfig::default());
/// assert!(clusterer.analyze(&[], None).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TrackClusterer {
    config: ClusterConfig,
}

impl TrackClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Corridor heat-lines, hottest first.
    pub fn analyze(&self, tracks: &[Track], bounds: Option<&Bounds>) -> Vec<CorridorHeatline> {
        analyze_tracks_to_heatlines(tracks, bounds, &self.config)
    }

    /// Full corridor records, hottest first.
    pub fn find_corridors(&self, tracks: &[Track], bounds: Option<&Bounds>) -> Vec<Corridor> {
        find_corridors(tracks, bounds, &self.config)
    }
}

/// Run the whole pipeline and return heat-lines, hottest first.
///
/// Zero tracks, or tracks that are all too short, give an empty result.
pub fn analyze_tracks_to_heatlines(
    tracks: &[Track],
    bounds: Option<&Bounds>,
    config: &ClusterConfig,
) -> Vec<CorridorHeatline> {
    find_corridors(tracks, bounds, config)
        .iter()
        .map(Corridor::to_heatline)
        .collect()
}

/// Run the whole pipeline and return corridors, hottest first.
pub fn find_corridors(
    tracks: &[Track],
    bounds: Option<&Bounds>,
    config: &ClusterConfig,
) -> Vec<Corridor> {
    let refs: Vec<&Track> = tracks.iter().collect();
    run(&refs, bounds, config)
}

/// Independent runs per scenic area, keyed by `scenic_id`.
///
/// Areas whose tracks yield no corridor map to an empty list.
pub fn analyze_by_scenic_area(
    tracks: &[Track],
    config: &ClusterConfig,
) -> BTreeMap<String, Vec<CorridorHeatline>> {
    group_by_scenic(tracks)
        .into_iter()
        .map(|(scenic, group)| (scenic.to_string(), heatlines(&group, config)))
        .collect()
}

/// Same as [`analyze_by_scenic_area`] with one rayon task per area.
#[cfg(feature = "parallel")]
pub fn analyze_by_scenic_area_parallel(
    tracks: &[Track],
    config: &ClusterConfig,
) -> BTreeMap<String, Vec<CorridorHeatline>> {
    group_by_scenic(tracks)
        .into_par_iter()
        .map(|(scenic, group)| (scenic.to_string(), heatlines(&group, config)))
        .collect()
}

fn group_by_scenic(tracks: &[Track]) -> BTreeMap<&str, Vec<&Track>> {
    let mut groups: BTreeMap<&str, Vec<&Track>> = BTreeMap::new();
    for track in tracks {
        groups.entry(track.scenic_id.as_str()).or_default().push(track);
    }
    groups
}

fn heatlines(tracks: &[&Track], config: &ClusterConfig) -> Vec<CorridorHeatline> {
    run(tracks, None, config).iter().map(Corridor::to_heatline).collect()
}

/// One scoped analysis run. All working sets are dropped on return.
fn run(tracks: &[&Track], bounds: Option<&Bounds>, config: &ClusterConfig) -> Vec<Corridor> {
    let start = std::time::Instant::now();

    // Step 1: preprocess
    let prepared: Vec<PreparedTrack> = tracks
        .iter()
        .enumerate()
        .filter_map(|(i, t)| preprocess_track(i, t, &config.preprocess))
        .collect();

    if prepared.is_empty() {
        info!("[Corridors] No usable tracks out of {}", tracks.len());
        return Vec::new();
    }

    // Step 2: flatten points
    let points = extract_points(&prepared, bounds);

    // Step 3: cluster
    let clusters = dbscan(&points, config.eps_meters, config.min_pts);

    // Step 4-5: corridors
    let mut corridors: Vec<Corridor> = clusters
        .iter()
        .filter_map(|c| build_corridor(c, &points, &prepared, config))
        .collect();
    let built = corridors.len();

    // Step 6: filter, merge, sort
    corridors.retain(|c| c.confidence >= config.min_confidence);
    corridors.sort_by(|a, b| b.heat.total_cmp(&a.heat));
    if let Some(distance) = config.merge_distance_meters {
        corridors = merge_nearby_corridors(corridors, distance);
    }

    info!(
        "[Corridors] {} tracks ({} usable), {} points, {} clusters, {} corridors ({} kept) in {:?}",
        tracks.len(),
        prepared.len(),
        points.len(),
        clusters.len(),
        built,
        corridors.len(),
        start.elapsed()
    );

    corridors
}

/// Flatten prepared tracks into one point arena. `ClusterPoint::track` indexes `prepared`.
fn extract_points(prepared: &[PreparedTrack], bounds: Option<&Bounds>) -> Vec<ClusterPoint> {
    let mut points = Vec::new();
    let mut invalid = 0usize;
    let mut outside = 0usize;

    for (k, pt) in prepared.iter().enumerate() {
        for p in &pt.track.points {
            if !p.is_valid() {
                invalid += 1;
                continue;
            }
            if bounds.is_some_and(|b| !b.contains(p)) {
                outside += 1;
                continue;
            }
            points.push(ClusterPoint {
                point: *p,
                track: k,
                weight: pt.quality,
            });
        }
    }

    if invalid > 0 {
        warn!("[Corridors] Skipped {} invalid points", invalid);
    }
    if outside > 0 {
        debug!("[Corridors] Skipped {} points outside bounds", outside);
    }
    points
}

fn build_corridor(
    cluster: &Cluster,
    points: &[ClusterPoint],
    prepared: &[PreparedTrack],
    config: &ClusterConfig,
) -> Option<Corridor> {
    if cluster.len() < config.min_pts {
        return None;
    }

    let members: Vec<&ClusterPoint> = cluster.members.iter().map(|&i| &points[i]).collect();
    let passing: BTreeSet<usize> = members.iter().map(|m| m.track).collect();
    if passing.len() < config.min_tracks_per_corridor {
        debug!(
            "[Corridors] Cluster {} dropped: {} point(s) from {} track(s)",
            cluster.id,
            members.len(),
            passing.len()
        );
        return None;
    }

    let locations: Vec<GeoPoint> = members.iter().map(|m| m.point).collect();
    let weights: Vec<f64> = members.iter().map(|m| m.weight).collect();
    let center = weighted_centroid(&locations, Some(&weights));

    let width = 2.0
        * locations.iter().map(|p| haversine_distance(p, &center)).sum::<f64>()
        / locations.len() as f64;

    let track_count = passing.len();
    let avg_quality = passing.iter().map(|&t| prepared[t].quality).sum::<f64>() / track_count as f64;
    let timed: Vec<f64> = passing
        .iter()
        .map(|&t| &prepared[t])
        .filter(|p| p.duration_seconds.is_some_and(|d| d > 0.0))
        .map(|p| p.avg_speed)
        .collect();
    let avg_speed = (!timed.is_empty()).then(|| timed.iter().sum::<f64>() / timed.len() as f64);

    let confidence = corridor_confidence(track_count, avg_quality, members.len());
    let heat = corridor_heat(track_count, confidence);

    debug!(
        "[Corridors] Cluster {}: {} tracks, {} points, confidence {:.3}, heat {:.3}",
        cluster.id,
        track_count,
        members.len(),
        confidence,
        heat
    );

    Some(Corridor {
        id: format!("corridor_{}", cluster.id),
        center,
        path: thin_path(locations, config.path_spacing_meters),
        width,
        track_count,
        point_count: members.len(),
        avg_quality,
        avg_speed,
        confidence,
        heat,
        accessibility: config.accessibility.classify(avg_speed),
    })
}

/// Sort by timestamp (missing counts as 0) and keep points at least `spacing` from
/// the last kept one.
fn thin_path(mut points: Vec<GeoPoint>, spacing: f64) -> Vec<GeoPoint> {
    points.sort_by_key(|p| p.timestamp.unwrap_or(0));

    let mut path: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for p in points {
        match path.last() {
            Some(last) if haversine_distance(last, &p) < spacing => {}
            _ => path.push(p),
        }
    }
    path
}

/// Drop corridors whose centre lies within `distance` of a hotter kept corridor.
/// Expects `corridors` sorted by heat, descending.
fn merge_nearby_corridors(corridors: Vec<Corridor>, distance: f64) -> Vec<Corridor> {
    if corridors.len() < 2 {
        return corridors;
    }

    let mut keep: Vec<bool> = vec![true; corridors.len()];

    for i in 0..corridors.len() {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..corridors.len() {
            if !keep[j] {
                continue;
            }
            let d = haversine_distance(&corridors[i].center, &corridors[j].center);
            if d <= distance {
                keep[j] = false;
                info!(
                    "[Corridors] Merged {} into {} ({:.1}m apart)",
                    corridors[j].id, corridors[i].id, d
                );
            }
        }
    }

    corridors
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| if k { Some(c) } else { None })
        .collect()
}
