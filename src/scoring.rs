//! # Heat Scoring
//!
//! Maps one [`PathSegment`] plus nearby [`FacilityPoint`]s and a [`ScoringContext`] to a
//! [`ScoredSegment`] whose `heat` lies in `[0.1, 1.0]`.
//!
//! ## Algorithm
//! Starting from a road-type base weight, in this order:
//! 1. base weight by highway type
//! 2. wheelchair tag: `heat * multiplier + bonus`
//! 3. user-type multiplier for the highway type
//! 4. time-of-day multiplier
//! 5. weather multiplier, then season multiplier
//! 6. facility proximity bonus (capped)
//! 7. length penalty (capped)
//! 8. slope penalty (percent or degree thresholds)
//! 9. clamp to `[min_heat, max_heat]`
//!
//! All lookup tables live in [`ScoringTables`], which is plain data injected into
//! [`HeatScorer`]. Missing entries degrade to neutral values; scoring never fails.
//!
//! Heat and accessibility are independent: the wheelchair tag is passed through
//! unchanged and never inferred from heat.

use std::collections::HashMap;

use log::{debug, info};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HeatlineError, Result};
use crate::geo_utils::{haversine_distance, midpoint, Incline};
use crate::osm::{FacilityCategory, FacilityPoint, HighwayType, PathSegment, WheelchairAccess};

// =============================================================================
// Scoring Context
// =============================================================================

/// Disability profile the heat is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum UserType {
    Wheelchair,
    VisualImpaired,
    HearingImpaired,
    Cognitive,
    Elderly,
    Family,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Weather {
    #[default]
    Sunny,
    Cloudy,
    Rainy,
    Snowy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Season {
    Spring,
    #[default]
    Summer,
    Autumn,
    Winter,
}

/// Per-call scoring inputs chosen by the user.
///
/// `preferences` is carried for collaborators (UI toggles and the like) and is not read by
/// the default scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ScoringContext {
    pub user_type: UserType,
    /// Local hour, 0-23 (values above wrap)
    #[serde(alias = "hour")]
    pub hour_of_day: u8,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub season: Season,
    #[serde(default)]
    pub preferences: HashMap<String, String>,
}

impl ScoringContext {
    pub fn new(user_type: UserType, hour_of_day: u8, weather: Weather) -> Self {
        Self {
            user_type,
            hour_of_day,
            weather,
            season: Season::default(),
            preferences: HashMap::new(),
        }
    }
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self::new(UserType::Normal, 12, Weather::Sunny)
    }
}

// =============================================================================
// Scoring Tables
// =============================================================================

/// `heat * multiplier + bonus` applied for one wheelchair tag value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessAdjustment {
    pub multiplier: f64,
    pub bonus: f64,
}

impl AccessAdjustment {
    pub const fn new(multiplier: f64, bonus: f64) -> Self {
        Self { multiplier, bonus }
    }
}

/// Adjustments for each wheelchair tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityTable {
    pub yes: AccessAdjustment,
    pub limited: AccessAdjustment,
    pub no: AccessAdjustment,
    pub unknown: AccessAdjustment,
}

impl AccessibilityTable {
    pub fn get(&self, access: WheelchairAccess) -> AccessAdjustment {
        match access {
            WheelchairAccess::Yes => self.yes,
            WheelchairAccess::Limited => self.limited,
            WheelchairAccess::No => self.no,
            WheelchairAccess::Unknown => self.unknown,
        }
    }
}

impl Default for AccessibilityTable {
    fn default() -> Self {
        Self {
            yes: AccessAdjustment::new(1.3, 0.3),
            limited: AccessAdjustment::new(1.1, 0.1),
            no: AccessAdjustment::new(0.7, -0.3),
            unknown: AccessAdjustment::new(1.0, 0.0),
        }
    }
}

/// A slope threshold: grades strictly above `above` cost `penalty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeStep {
    pub above: f64,
    pub penalty: f64,
}

/// All lookup data used by [`HeatScorer`].
///
/// Deserializes with `#[serde(default)]`, so a config file only needs the entries it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTables {
    /// Base weight per highway type
    pub road_base: HashMap<HighwayType, f64>,
    /// Base weight for highway types not in `road_base`
    pub default_road_base: f64,
    pub accessibility: AccessibilityTable,
    /// Multiplier per (user type, highway type); missing pairs are 1.0
    pub user_type: HashMap<UserType, HashMap<HighwayType, f64>>,
    /// Multiplier per local hour 0-23
    pub time_of_day: [f64; 24],
    /// Missing weather entries are 1.0
    pub weather: HashMap<Weather, f64>,
    /// Missing season entries are 1.0
    pub season: HashMap<Season, f64>,
    /// Bonus weight per facility category
    pub facility_weights: HashMap<FacilityCategory, f64>,
    /// Weight for categories not in `facility_weights`
    pub default_facility_weight: f64,
    /// Facilities farther than this from the segment midpoint are ignored (meters)
    pub facility_radius_meters: f64,
    pub facility_bonus_cap: f64,
    /// Length penalty is `length / length_penalty_scale_meters`, capped
    pub length_penalty_scale_meters: f64,
    pub length_penalty_cap: f64,
    /// Percent-grade steps, checked in order; first match wins
    pub slope_percent_steps: Vec<SlopeStep>,
    /// Degree-grade steps, checked in order; first match wins
    pub slope_degree_steps: Vec<SlopeStep>,
    pub min_heat: f64,
    pub max_heat: f64,
}

impl Default for ScoringTables {
    fn default() -> Self {
        use HighwayType as H;

        let road_base = HashMap::from([
            (H::Pedestrian, 0.9),
            (H::Footway, 0.8),
            (H::LivingStreet, 0.7),
            (H::Path, 0.7),
            (H::Cycleway, 0.6),
            (H::Residential, 0.5),
            (H::Service, 0.4),
            (H::Track, 0.4),
            (H::Unclassified, 0.4),
            (H::Tertiary, 0.3),
            (H::Steps, 0.2),
            (H::Secondary, 0.15),
            (H::Primary, 0.1),
        ]);

        let user_type = HashMap::from([
            (
                UserType::Wheelchair,
                HashMap::from([
                    (H::Pedestrian, 1.0),
                    (H::Footway, 0.9),
                    (H::LivingStreet, 0.8),
                    (H::Residential, 0.7),
                    (H::Cycleway, 0.7),
                    (H::Path, 0.6),
                    (H::Service, 0.6),
                    (H::Secondary, 0.6),
                    (H::Primary, 0.5),
                    (H::Track, 0.3),
                    (H::Steps, 0.1),
                ]),
            ),
            (
                UserType::VisualImpaired,
                HashMap::from([
                    (H::Pedestrian, 1.0),
                    (H::Footway, 0.9),
                    (H::Path, 0.6),
                    (H::Cycleway, 0.5),
                    (H::Track, 0.5),
                    (H::Steps, 0.4),
                    (H::Secondary, 0.4),
                    (H::Primary, 0.3),
                ]),
            ),
            (
                UserType::HearingImpaired,
                HashMap::from([
                    (H::Pedestrian, 1.0),
                    (H::Footway, 1.0),
                    (H::Cycleway, 0.7),
                    (H::Secondary, 0.7),
                    (H::Primary, 0.6),
                ]),
            ),
            (
                UserType::Cognitive,
                HashMap::from([
                    (H::Pedestrian, 1.0),
                    (H::Footway, 0.9),
                    (H::Path, 0.7),
                    (H::Track, 0.6),
                    (H::Secondary, 0.5),
                    (H::Primary, 0.4),
                ]),
            ),
            (
                UserType::Elderly,
                HashMap::from([
                    (H::Pedestrian, 1.0),
                    (H::Footway, 0.9),
                    (H::Path, 0.7),
                    (H::Secondary, 0.6),
                    (H::Track, 0.5),
                    (H::Primary, 0.5),
                    (H::Steps, 0.3),
                ]),
            ),
            (
                UserType::Family,
                HashMap::from([
                    (H::Pedestrian, 1.0),
                    (H::Footway, 0.9),
                    (H::Path, 0.8),
                    (H::Cycleway, 0.8),
                    (H::Secondary, 0.6),
                    (H::Steps, 0.5),
                    (H::Primary, 0.5),
                ]),
            ),
        ]);

        // 22:00-06:00 is night, 14:00-16:00 the afternoon peak
        let time_of_day = [
            0.2, 0.2, 0.2, 0.2, 0.2, 0.2, // 00-05
            0.4, 0.4, // 06-07
            0.6, 0.6, // 08-09
            0.8, 0.8, // 10-11
            0.9, 0.9, // 12-13
            1.0, 1.0, // 14-15
            0.9, 0.9, // 16-17
            0.6, 0.6, // 18-19
            0.4, 0.4, // 20-21
            0.2, 0.2, // 22-23
        ];

        let weather = HashMap::from([
            (Weather::Sunny, 1.0),
            (Weather::Cloudy, 0.9),
            (Weather::Rainy, 0.6),
            (Weather::Snowy, 0.4),
        ]);

        let facility_weights = HashMap::from([
            (FacilityCategory::Toilet, 0.15),
            (FacilityCategory::FirstAid, 0.1),
            (FacilityCategory::Parking, 0.08),
            (FacilityCategory::Information, 0.06),
            (FacilityCategory::Restaurant, 0.05),
            (FacilityCategory::Bench, 0.05),
        ]);

        Self {
            road_base,
            default_road_base: 0.5,
            accessibility: AccessibilityTable::default(),
            user_type,
            time_of_day,
            weather,
            season: HashMap::new(),
            facility_weights,
            default_facility_weight: 0.02,
            facility_radius_meters: 100.0,
            facility_bonus_cap: 0.3,
            length_penalty_scale_meters: 1000.0,
            length_penalty_cap: 0.2,
            slope_percent_steps: vec![
                SlopeStep { above: 8.0, penalty: 0.3 },
                SlopeStep { above: 5.0, penalty: 0.2 },
                SlopeStep { above: 3.0, penalty: 0.1 },
            ],
            slope_degree_steps: vec![
                SlopeStep { above: 5.0, penalty: 0.3 },
                SlopeStep { above: 3.0, penalty: 0.2 },
                SlopeStep { above: 2.0, penalty: 0.1 },
            ],
            min_heat: 0.1,
            max_heat: 1.0,
        }
    }
}

impl ScoringTables {
    pub fn road_base(&self, highway: &HighwayType) -> f64 {
        self.road_base.get(highway).copied().unwrap_or(self.default_road_base)
    }

    pub fn user_type_multiplier(&self, user: UserType, highway: &HighwayType) -> f64 {
        self.user_type
            .get(&user)
            .and_then(|by_road| by_road.get(highway))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn time_multiplier(&self, hour: u8) -> f64 {
        self.time_of_day[usize::from(hour % 24)]
    }

    pub fn weather_multiplier(&self, weather: Weather) -> f64 {
        self.weather.get(&weather).copied().unwrap_or(1.0)
    }

    pub fn season_multiplier(&self, season: Season) -> f64 {
        self.season.get(&season).copied().unwrap_or(1.0)
    }

    pub fn facility_weight(&self, category: &FacilityCategory) -> f64 {
        self.facility_weights
            .get(category)
            .copied()
            .unwrap_or(self.default_facility_weight)
    }

    /// Penalty for a parsed incline; 0 when unknown or below every threshold.
    pub fn slope_penalty(&self, incline: Incline) -> f64 {
        let (steps, grade) = match incline {
            Incline::Percent(v) => (&self.slope_percent_steps, v),
            Incline::Degrees(v) => (&self.slope_degree_steps, v),
            Incline::Unknown => return 0.0,
        };
        steps
            .iter()
            .find(|step| grade > step.above)
            .map_or(0.0, |step| step.penalty)
    }

    pub fn validate(&self) -> Result<()> {
        if !positive(self.facility_radius_meters) {
            return Err(HeatlineError::config(
                "facility_radius_meters",
                format!("must be positive, got {}", self.facility_radius_meters),
            ));
        }
        if !positive(self.length_penalty_scale_meters) {
            return Err(HeatlineError::config(
                "length_penalty_scale_meters",
                format!("must be positive, got {}", self.length_penalty_scale_meters),
            ));
        }
        if self.facility_bonus_cap < 0.0 || self.length_penalty_cap < 0.0 {
            return Err(HeatlineError::config("caps", "bonus and penalty caps must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.min_heat)
            || !(0.0..=1.0).contains(&self.max_heat)
            || self.min_heat > self.max_heat
        {
            return Err(HeatlineError::config(
                "min_heat",
                format!("need 0 <= min_heat <= max_heat <= 1, got {}..{}", self.min_heat, self.max_heat),
            ));
        }
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

// =============================================================================
// Scored Output
// =============================================================================

/// Every intermediate factor of one heat computation, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base: f64,
    pub accessibility_multiplier: f64,
    pub accessibility_bonus: f64,
    pub user_type_multiplier: f64,
    pub time_multiplier: f64,
    pub weather_multiplier: f64,
    pub season_multiplier: f64,
    pub facility_bonus: f64,
    pub length_penalty: f64,
    pub slope_penalty: f64,
    /// Heat before clamping
    pub raw_heat: f64,
}

/// One scored heat-line, ready for a map renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSegment {
    pub name: String,
    /// `[lng, lat]` pairs
    pub coordinates: Vec<[f64; 2]>,
    pub heat: f64,
    /// The input wheelchair tag, unchanged
    pub accessibility: WheelchairAccess,
    pub road_type: String,
    pub length_meters: f64,
    pub breakdown: ScoreBreakdown,
}

// =============================================================================
// Heat Scorer
// =============================================================================

/// Stateless heat scorer over injected [`ScoringTables`].
///
/// # Example
/// ```
/// use heatline::{GeoPoint, HeatScorer, PathSegment, ScoringContext, UserType, Weather, WayTags};
///
/// let tags = WayTags {
///     highway: "pedestrian".into(),
///     wheelchair: "yes".into(),
///     ..WayTags::default()
/// };
/// let segment = PathSegment::new(
///     "Lakeside walk",
///     vec![GeoPoint::new(30.2500, 120.1500), GeoPoint::new(30.2504, 120.1500)],
///     tags,
/// );
///
/// let scorer = HeatScorer::default();
/// let ctx = ScoringContext::new(UserType::Wheelchair, 15, Weather::Sunny);
/// let scored = scorer.score(&segment, &[], &ctx);
/// assert!(scored.heat >= 0.9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeatScorer {
    tables: ScoringTables,
}

impl HeatScorer {
    /// Wrap tables without checking them.
    ///
    /// The tables must pass [`ScoringTables::validate`]: scoring panics in the final clamp
    /// when `min_heat > max_heat` or either bound is NaN. Use [`HeatScorer::try_new`] for
    /// tables from an untrusted source.
    pub fn new(tables: ScoringTables) -> Self {
        Self { tables }
    }

    /// Validate the tables, then wrap them.
    pub fn try_new(tables: ScoringTables) -> Result<Self> {
        tables.validate()?;
        Ok(Self { tables })
    }

    pub fn tables(&self) -> &ScoringTables {
        &self.tables
    }

    /// Score a single segment. Deterministic and infallible.
    pub fn score(
        &self,
        segment: &PathSegment,
        facilities: &[FacilityPoint],
        context: &ScoringContext,
    ) -> ScoredSegment {
        let t = &self.tables;
        let highway = &segment.tags.highway;
        let access = t.accessibility.get(segment.tags.wheelchair);
        let length_meters = segment.length_meters();

        let mut b = ScoreBreakdown {
            base: t.road_base(highway),
            accessibility_multiplier: access.multiplier,
            accessibility_bonus: access.bonus,
            user_type_multiplier: t.user_type_multiplier(context.user_type, highway),
            time_multiplier: t.time_multiplier(context.hour_of_day),
            weather_multiplier: t.weather_multiplier(context.weather),
            season_multiplier: t.season_multiplier(context.season),
            facility_bonus: self.facility_bonus(segment, facilities),
            length_penalty: (length_meters / t.length_penalty_scale_meters).min(t.length_penalty_cap),
            slope_penalty: t.slope_penalty(segment.tags.incline()),
            raw_heat: 0.0,
        };

        let mut heat = b.base;
        heat = heat * b.accessibility_multiplier + b.accessibility_bonus;
        heat *= b.user_type_multiplier;
        heat *= b.time_multiplier;
        heat *= b.weather_multiplier * b.season_multiplier;
        heat += b.facility_bonus;
        heat -= b.length_penalty;
        heat -= b.slope_penalty;
        b.raw_heat = heat;

        ScoredSegment {
            name: segment.name.clone(),
            coordinates: segment.coordinates(),
            heat: heat.clamp(t.min_heat, t.max_heat),
            accessibility: segment.tags.wheelchair,
            road_type: highway.as_str().to_string(),
            length_meters,
            breakdown: b,
        }
    }

    /// Bonus from facilities near the segment midpoint, capped.
    fn facility_bonus(&self, segment: &PathSegment, facilities: &[FacilityPoint]) -> f64 {
        let t = &self.tables;
        let Some(anchor) = midpoint(&segment.points) else {
            return 0.0;
        };

        let bonus: f64 = facilities
            .iter()
            .filter_map(|f| {
                let d = haversine_distance(&anchor, &f.location());
                (d <= t.facility_radius_meters).then(|| {
                    t.facility_weight(&f.category) * (t.facility_radius_meters - d)
                        / t.facility_radius_meters
                })
            })
            .sum();

        bonus.min(t.facility_bonus_cap)
    }

    /// Score every segment with at least two points, preserving input order.
    pub fn score_all(
        &self,
        segments: &[PathSegment],
        facilities: &[FacilityPoint],
        context: &ScoringContext,
    ) -> Vec<ScoredSegment> {
        let start = std::time::Instant::now();

        let scored: Vec<ScoredSegment> = segments
            .iter()
            .filter(|s| usable(s))
            .map(|s| self.score(s, facilities, context))
            .collect();

        info!(
            "[Scoring] Scored {}/{} segments for {:?} in {:?}",
            scored.len(),
            segments.len(),
            context.user_type,
            start.elapsed()
        );
        scored
    }

    /// Same as [`HeatScorer::score_all`] but fans segments out with rayon.
    ///
    /// Segments are independent, so the output equals the sequential result.
    #[cfg(feature = "parallel")]
    pub fn score_all_parallel(
        &self,
        segments: &[PathSegment],
        facilities: &[FacilityPoint],
        context: &ScoringContext,
    ) -> Vec<ScoredSegment> {
        let start = std::time::Instant::now();

        let scored: Vec<ScoredSegment> = segments
            .par_iter()
            .filter(|s| usable(s))
            .map(|s| self.score(s, facilities, context))
            .collect();

        info!(
            "[Scoring] Scored {}/{} segments in parallel for {:?} in {:?}",
            scored.len(),
            segments.len(),
            context.user_type,
            start.elapsed()
        );
        scored
    }
}

fn usable(segment: &PathSegment) -> bool {
    if segment.is_valid() {
        return true;
    }
    debug!(
        "[Scoring] Skipping '{}': {} point(s)",
        segment.name,
        segment.points.len()
    );
    false
}
