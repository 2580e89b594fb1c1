//! OSM-derived input model.
//!
//! Path segments and facilities arrive as Overpass-style JSON with free-form `tags`
//! maps. Every tag is read leniently: unknown values become a neutral variant instead of
//! an error, so one odd way never aborts a scoring batch.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo_utils::{parse_incline, polyline_length, Incline};
use crate::GeoPoint;

// =============================================================================
// Highway Type
// =============================================================================

/// OSM `highway` classification of a way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HighwayType {
    Pedestrian,
    Footway,
    Path,
    Cycleway,
    Service,
    Track,
    Steps,
    LivingStreet,
    Residential,
    Unclassified,
    Tertiary,
    Secondary,
    Primary,
    /// Any other value, kept verbatim (empty when the tag is missing)
    Other(String),
}

impl HighwayType {
    pub fn as_str(&self) -> &str {
        match self {
            HighwayType::Pedestrian => "pedestrian",
            HighwayType::Footway => "footway",
            HighwayType::Path => "path",
            HighwayType::Cycleway => "cycleway",
            HighwayType::Service => "service",
            HighwayType::Track => "track",
            HighwayType::Steps => "steps",
            HighwayType::LivingStreet => "living_street",
            HighwayType::Residential => "residential",
            HighwayType::Unclassified => "unclassified",
            HighwayType::Tertiary => "tertiary",
            HighwayType::Secondary => "secondary",
            HighwayType::Primary => "primary",
            HighwayType::Other(raw) => raw,
        }
    }
}

impl Default for HighwayType {
    fn default() -> Self {
        HighwayType::Other(String::new())
    }
}

impl From<&str> for HighwayType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pedestrian" => HighwayType::Pedestrian,
            "footway" | "sidewalk" | "crossing" => HighwayType::Footway,
            "path" => HighwayType::Path,
            "cycleway" => HighwayType::Cycleway,
            "service" => HighwayType::Service,
            "track" => HighwayType::Track,
            "steps" => HighwayType::Steps,
            "living_street" => HighwayType::LivingStreet,
            "residential" => HighwayType::Residential,
            "unclassified" => HighwayType::Unclassified,
            "tertiary" | "tertiary_link" => HighwayType::Tertiary,
            "secondary" | "secondary_link" => HighwayType::Secondary,
            "primary" | "primary_link" => HighwayType::Primary,
            _ => HighwayType::Other(value.to_string()),
        }
    }
}

impl From<String> for HighwayType {
    fn from(value: String) -> Self {
        HighwayType::from(value.as_str())
    }
}

impl From<HighwayType> for String {
    fn from(value: HighwayType) -> Self {
        match value {
            HighwayType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for HighwayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Wheelchair Access
// =============================================================================

/// Wheelchair usability label of a path.
///
/// Independent of heat: heat says how comfortable a path is, this says whether a
/// wheelchair can physically use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum WheelchairAccess {
    Yes,
    Limited,
    No,
    #[default]
    Unknown,
}

impl WheelchairAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            WheelchairAccess::Yes => "yes",
            WheelchairAccess::Limited => "limited",
            WheelchairAccess::No => "no",
            WheelchairAccess::Unknown => "unknown",
        }
    }
}

impl From<&str> for WheelchairAccess {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "designated" => WheelchairAccess::Yes,
            "limited" => WheelchairAccess::Limited,
            "no" => WheelchairAccess::No,
            _ => WheelchairAccess::Unknown,
        }
    }
}

impl From<String> for WheelchairAccess {
    fn from(value: String) -> Self {
        WheelchairAccess::from(value.as_str())
    }
}

impl From<WheelchairAccess> for String {
    fn from(value: WheelchairAccess) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for WheelchairAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Way Tags & Path Segments
// =============================================================================

/// The subset of OSM way tags the scorer reads. Other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WayTags {
    pub highway: HighwayType,
    pub wheelchair: WheelchairAccess,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lit: Option<String>,
}

impl WayTags {
    /// Read the tags from a raw OSM key/value map.
    pub fn from_osm_tags(tags: &HashMap<String, String>) -> Self {
        Self {
            highway: tags.get("highway").map(|v| HighwayType::from(v.as_str())).unwrap_or_default(),
            wheelchair: tags
                .get("wheelchair")
                .map(|v| WheelchairAccess::from(v.as_str()))
                .unwrap_or_default(),
            surface: tags.get("surface").cloned(),
            width: tags.get("width").cloned(),
            incline: tags.get("incline").cloned(),
            lit: tags.get("lit").cloned(),
        }
    }

    /// Parsed incline; [`Incline::Unknown`] when absent or unparseable.
    pub fn incline(&self) -> Incline {
        self.incline.as_deref().map_or(Incline::Unknown, parse_incline)
    }

    /// Width in meters from values like `"2.5"`, `"2.5 m"` or `"2.5m"`.
    pub fn width_meters(&self) -> Option<f64> {
        let raw = self.width.as_deref()?.trim();
        let number = raw.strip_suffix('m').unwrap_or(raw).trim();
        number.parse::<f64>().ok().filter(|w| w.is_finite() && *w >= 0.0)
    }

    pub fn is_lit(&self) -> bool {
        matches!(
            self.lit.as_deref().map(str::trim),
            Some("yes") | Some("24/7") | Some("automatic")
        )
    }
}

/// A named road or way: ordered points plus tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    #[serde(default)]
    pub name: String,
    /// Ordered geometry; Overpass `geometry` arrays are accepted as-is
    #[serde(alias = "geometry")]
    pub points: Vec<GeoPoint>,
    #[serde(default)]
    pub tags: WayTags,
}

impl PathSegment {
    pub fn new(name: impl Into<String>, points: Vec<GeoPoint>, tags: WayTags) -> Self {
        Self {
            name: name.into(),
            points,
            tags,
        }
    }

    /// A usable segment has at least two points.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn length_meters(&self) -> f64 {
        polyline_length(&self.points)
    }

    /// Geometry as `[lng, lat]` pairs, the order map renderers expect.
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.longitude, p.latitude]).collect()
    }
}

// =============================================================================
// Facilities
// =============================================================================

/// Category of a point facility near a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FacilityCategory {
    Toilet,
    Restaurant,
    Bench,
    Information,
    Parking,
    FirstAid,
    Other(String),
}

impl FacilityCategory {
    pub fn as_str(&self) -> &str {
        match self {
            FacilityCategory::Toilet => "toilet",
            FacilityCategory::Restaurant => "restaurant",
            FacilityCategory::Bench => "bench",
            FacilityCategory::Information => "information",
            FacilityCategory::Parking => "parking",
            FacilityCategory::FirstAid => "first_aid",
            FacilityCategory::Other(raw) => raw,
        }
    }
}

impl From<&str> for FacilityCategory {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "toilet" | "toilets" => FacilityCategory::Toilet,
            "restaurant" | "cafe" | "fast_food" => FacilityCategory::Restaurant,
            "bench" => FacilityCategory::Bench,
            "information" => FacilityCategory::Information,
            "parking" => FacilityCategory::Parking,
            "first_aid" | "firstaid" | "first_aid_kit" | "defibrillator" => FacilityCategory::FirstAid,
            _ => FacilityCategory::Other(value.to_string()),
        }
    }
}

impl From<String> for FacilityCategory {
    fn from(value: String) -> Self {
        FacilityCategory::from(value.as_str())
    }
}

impl From<FacilityCategory> for String {
    fn from(value: FacilityCategory) -> Self {
        match value {
            FacilityCategory::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// A read-only facility location used as a proximity bonus source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityPoint {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
    pub category: FacilityCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FacilityPoint {
    pub fn new(latitude: f64, longitude: f64, category: FacilityCategory) -> Self {
        Self {
            latitude,
            longitude,
            category,
            name: None,
        }
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Map a node's tags to a facility category, if it is one we score.
fn facility_category_from_tags(tags: &HashMap<String, String>) -> Option<FacilityCategory> {
    if let Some(amenity) = tags.get("amenity") {
        let category = FacilityCategory::from(amenity.as_str());
        if !matches!(category, FacilityCategory::Other(_)) {
            return Some(category);
        }
    }
    if tags.get("tourism").map(String::as_str) == Some("information") {
        return Some(FacilityCategory::Information);
    }
    if tags.get("leisure").map(String::as_str) == Some("picnic_table") {
        return Some(FacilityCategory::Bench);
    }
    if let Some(emergency) = tags.get("emergency") {
        if matches!(emergency.as_str(), "first_aid_kit" | "defibrillator" | "first_aid") {
            return Some(FacilityCategory::FirstAid);
        }
    }
    None
}

// =============================================================================
// Overpass Response
// =============================================================================

/// A node position in an Overpass `geometry` array.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverpassCoord {
    pub lat: f64,
    pub lon: f64,
}

/// One element of an Overpass `out geom;` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub geometry: Vec<OverpassCoord>,
}

/// Top-level Overpass JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// Scoring inputs extracted from an Overpass response.
#[derive(Debug, Clone, Default)]
pub struct OsmInputs {
    pub segments: Vec<PathSegment>,
    pub facilities: Vec<FacilityPoint>,
}

impl OverpassResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Split elements into path segments and facilities.
    ///
    /// Ways need a `highway` tag and at least two geometry nodes. Nodes need a tag that maps
    /// to a [`FacilityCategory`]. Everything else is skipped.
    pub fn into_inputs(self) -> OsmInputs {
        let mut inputs = OsmInputs::default();
        let mut skipped = 0usize;

        for element in self.elements {
            match element.kind.as_str() {
                "way" if element.tags.contains_key("highway") && element.geometry.len() >= 2 => {
                    let name = element
                        .tags
                        .get("name")
                        .cloned()
                        .unwrap_or_else(|| format!("way/{}", element.id));
                    let points = element
                        .geometry
                        .iter()
                        .map(|c| GeoPoint::new(c.lat, c.lon))
                        .collect();
                    let tags = WayTags::from_osm_tags(&element.tags);
                    inputs.segments.push(PathSegment::new(name, points, tags));
                }
                "node" => {
                    let position = element.lat.zip(element.lon);
                    match (position, facility_category_from_tags(&element.tags)) {
                        (Some((lat, lon)), Some(category)) => {
                            let mut facility = FacilityPoint::new(lat, lon, category);
                            facility.name = element.tags.get("name").cloned();
                            inputs.facilities.push(facility);
                        }
                        _ => skipped += 1,
                    }
                }
                _ => skipped += 1,
            }
        }

        debug!(
            "[Osm] Extracted {} segments, {} facilities ({} elements skipped)",
            inputs.segments.len(),
            inputs.facilities.len(),
            skipped
        );
        inputs
    }
}
