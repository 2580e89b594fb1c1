//! # Geographic Utilities
//!
//! Stateless geometry shared by heat scoring and track clustering.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`parse_incline`] | Read an OSM `incline` tag as percent or degree grade |
//! | [`weighted_centroid`] | Weighted mean of a point set |
//! | [`midpoint`] | Point halfway along a path |
//! | [`compute_bounds`] | Bounding box of a point set |
//! | [`compute_center`] | Center of a point set's bounding box |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use heatline::{GeoPoint, geo_utils};
//!
//! let path = vec![
//!     GeoPoint::new(30.2590, 120.1480),
//!     GeoPoint::new(30.2595, 120.1480),
//!     GeoPoint::new(30.2600, 120.1480),
//! ];
//!
//! let length = geo_utils::polyline_length(&path);
//! assert!(length > 100.0 && length < 120.0);
//!
//! let slope = geo_utils::parse_incline("6%");
//! assert_eq!(slope, geo_utils::Incline::Percent(6.0));
//! ```
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees). Inputs are not
//! validated: a NaN coordinate yields a NaN distance rather than a panic or an error.

use crate::{Bounds, GeoPoint};
use geo::{Distance, Haversine, Point};

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (spherical Earth, mean radius).
/// The result is symmetric and exactly zero for identical points.
///
/// # Example
///
/// ```rust
/// use heatline::{GeoPoint, geo_utils};
///
/// let a = GeoPoint::new(30.2590, 120.1480);
/// let b = GeoPoint::new(30.2600, 120.1490);
///
/// assert_eq!(geo_utils::haversine_distance(&a, &a), 0.0);
/// assert_eq!(
///     geo_utils::haversine_distance(&a, &b),
///     geo_utils::haversine_distance(&b, &a),
/// );
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a path in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// paths return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees of longitude at a given latitude.
///
/// At the equator this is also the latitude scale. The value grows without bound
/// toward the poles, so callers building search boxes must handle polar latitudes.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let meters_per_degree = 111_320.0 * latitude.to_radians().cos().abs();
    meters / meters_per_degree
}

// =============================================================================
// Incline Parsing
// =============================================================================

/// A parsed OSM `incline` value.
///
/// Percent and degree grades are kept apart because they are penalised with
/// different thresholds. Magnitudes are absolute: uphill and downhill read the same.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Incline {
    /// Grade in percent, e.g. `"5%"`
    Percent(f64),
    /// Grade in degrees, e.g. `"3°"`
    Degrees(f64),
    /// Missing or unparseable (`"up"`, `"steep"`, `""`)
    Unknown,
}

impl Incline {
    /// Numeric magnitude, 0.0 when unknown.
    pub fn magnitude(&self) -> f64 {
        match self {
            Incline::Percent(v) | Incline::Degrees(v) => *v,
            Incline::Unknown => 0.0,
        }
    }
}

/// Parse an incline string such as `"5%"`, `"-8 %"`, `"3°"` or `"2deg"`.
///
/// A bare number is read as percent, OSM's default unit. Anything that does not parse
/// to a finite number is [`Incline::Unknown`].
///
/// # Example
///
/// ```rust
/// use heatline::geo_utils::{parse_incline, Incline};
///
/// assert_eq!(parse_incline("-5%"), Incline::Percent(5.0));
/// assert_eq!(parse_incline("3°"), Incline::Degrees(3.0));
/// assert_eq!(parse_incline("up"), Incline::Unknown);
/// assert_eq!(parse_incline("up").magnitude(), 0.0);
/// ```
pub fn parse_incline(raw: &str) -> Incline {
    let s = raw.trim();
    if s.is_empty() {
        return Incline::Unknown;
    }

    let (number, degrees) = if let Some(n) = s.strip_suffix('%') {
        (n, false)
    } else if let Some(n) = s.strip_suffix('°') {
        (n, true)
    } else if let Some(n) = s.strip_suffix("deg") {
        (n, true)
    } else {
        (s, false)
    };

    match number.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if degrees {
                Incline::Degrees(v.abs())
            } else {
                Incline::Percent(v.abs())
            }
        }
        _ => Incline::Unknown,
    }
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a point set.
///
/// For empty input, returns a bounds with MIN/MAX values that contain nothing.
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Center of the bounding box of a point set; (0, 0) for empty input.
pub fn compute_center(points: &[GeoPoint]) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }
    compute_bounds(points).center()
}

/// Weighted arithmetic mean of latitude and longitude.
///
/// With `weights == None` every point weighs 1. Missing trailing weights also count as 1.
/// Returns (0, 0) for empty input or when the weights sum to zero.
///
/// Like [`compute_bounds`], this is a planar mean and is only meaningful for small areas
/// that do not cross the antimeridian.
///
/// # Example
///
/// ```rust
/// use heatline::{GeoPoint, geo_utils};
///
/// let points = vec![GeoPoint::new(10.0, 20.0), GeoPoint::new(12.0, 22.0)];
///
/// let uniform = geo_utils::weighted_centroid(&points, None);
/// assert!((uniform.latitude - 11.0).abs() < 1e-9);
///
/// let skewed = geo_utils::weighted_centroid(&points, Some(&[3.0, 1.0]));
/// assert!((skewed.latitude - 10.5).abs() < 1e-9);
/// ```
pub fn weighted_centroid(points: &[GeoPoint], weights: Option<&[f64]>) -> GeoPoint {
    let mut sum_lat = 0.0;
    let mut sum_lng = 0.0;
    let mut total = 0.0;

    for (i, p) in points.iter().enumerate() {
        let w = weights.and_then(|ws| ws.get(i).copied()).unwrap_or(1.0);
        sum_lat += p.latitude * w;
        sum_lng += p.longitude * w;
        total += w;
    }

    if total == 0.0 {
        return GeoPoint::new(0.0, 0.0);
    }

    GeoPoint::new(sum_lat / total, sum_lng / total)
}

/// Point halfway along a path's length, `None` for an empty path.
///
/// Walks the legs until the cumulative haversine length reaches half the total, then
/// interpolates linearly in degrees inside that leg. A single point, or a path whose
/// legs are all zero length, returns its first point.
///
/// # Example
///
/// ```rust
/// use heatline::{GeoPoint, geo_utils};
///
/// let way = vec![GeoPoint::new(30.0, 120.0), GeoPoint::new(30.002, 120.0)];
/// let mid = geo_utils::midpoint(&way).unwrap();
/// assert!((mid.latitude - 30.001).abs() < 1e-9);
/// ```
pub fn midpoint(points: &[GeoPoint]) -> Option<GeoPoint> {
    let first = *points.first()?;
    let half = polyline_length(points) / 2.0;

    let mut walked = 0.0;
    for w in points.windows(2) {
        let leg = haversine_distance(&w[0], &w[1]);
        if leg > 0.0 && walked + leg >= half {
            let t = (half - walked) / leg;
            return Some(GeoPoint::new(
                w[0].latitude + (w[1].latitude - w[0].latitude) * t,
                w[0].longitude + (w[1].longitude - w[0].longitude) * t,
            ));
        }
        walked += leg;
    }

    Some(first)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(30.2590, 120.1480);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let a = GeoPoint::new(30.2590, 120.1480);
        let b = GeoPoint::new(30.2712, 120.1633);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_haversine_nan_propagates() {
        let a = GeoPoint::new(f64::NAN, 120.0);
        let b = GeoPoint::new(30.0, 120.0);
        assert!(haversine_distance(&a, &b).is_nan());
    }

    #[test]
    fn test_polyline_length_short_inputs() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GeoPoint::new(30.0, 120.0)]), 0.0);
    }

    #[test]
    fn test_polyline_length_sums_segments() {
        let track = vec![
            GeoPoint::new(30.0, 120.0),
            GeoPoint::new(30.001, 120.0),
            GeoPoint::new(30.002, 120.0),
        ];
        let total = polyline_length(&track);
        let first = haversine_distance(&track[0], &track[1]);
        let second = haversine_distance(&track[1], &track[2]);
        assert!(approx_eq(total, first + second, 1e-9));
        assert!(approx_eq(total, 222.4, 1.0));
    }

    #[test]
    fn test_parse_incline_units() {
        assert_eq!(parse_incline("5%"), Incline::Percent(5.0));
        assert_eq!(parse_incline(" -8 % "), Incline::Percent(8.0));
        assert_eq!(parse_incline("12"), Incline::Percent(12.0));
        assert_eq!(parse_incline("3°"), Incline::Degrees(3.0));
        assert_eq!(parse_incline("2.5deg"), Incline::Degrees(2.5));
    }

    #[test]
    fn test_parse_incline_garbage() {
        assert_eq!(parse_incline(""), Incline::Unknown);
        assert_eq!(parse_incline("up"), Incline::Unknown);
        assert_eq!(parse_incline("%"), Incline::Unknown);
        assert_eq!(parse_incline("NaN%"), Incline::Unknown);
        assert_eq!(parse_incline("steep°"), Incline::Unknown);
    }

    #[test]
    fn test_compute_bounds() {
        let points = vec![
            GeoPoint::new(30.50, 120.13),
            GeoPoint::new(30.51, 120.12),
            GeoPoint::new(30.505, 120.125),
        ];
        let bounds = compute_bounds(&points);
        assert_eq!(bounds.min_lat, 30.50);
        assert_eq!(bounds.max_lat, 30.51);
        assert_eq!(bounds.min_lng, 120.12);
        assert_eq!(bounds.max_lng, 120.13);
    }

    #[test]
    fn test_compute_center() {
        let points = vec![GeoPoint::new(10.0, 20.0), GeoPoint::new(12.0, 26.0), GeoPoint::new(11.5, 21.0)];
        assert_eq!(compute_center(&points), GeoPoint::new(11.0, 23.0));
        assert_eq!(compute_center(&[]), GeoPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_weighted_centroid_uniform_and_weighted() {
        let points = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(4.0, 8.0)];

        let uniform = weighted_centroid(&points, None);
        assert!(approx_eq(uniform.latitude, 2.0, 1e-12));
        assert!(approx_eq(uniform.longitude, 4.0, 1e-12));

        let weighted = weighted_centroid(&points, Some(&[1.0, 3.0]));
        assert!(approx_eq(weighted.latitude, 3.0, 1e-12));
        assert!(approx_eq(weighted.longitude, 6.0, 1e-12));
    }

    #[test]
    fn test_weighted_centroid_degenerate() {
        let empty = weighted_centroid(&[], None);
        assert_eq!((empty.latitude, empty.longitude), (0.0, 0.0));

        let zero = weighted_centroid(&[GeoPoint::new(1.0, 1.0)], Some(&[0.0]));
        assert_eq!((zero.latitude, zero.longitude), (0.0, 0.0));
    }

    #[test]
    fn test_midpoint() {
        assert!(midpoint(&[]).is_none());
        let single = GeoPoint::new(5.0, 6.0);
        assert_eq!(midpoint(&[single]), Some(single));
        assert_eq!(midpoint(&[single, single]), Some(single));

        let path = vec![
            GeoPoint::new(10.0, 20.0),
            GeoPoint::new(10.001, 20.0),
            GeoPoint::new(10.002, 20.0),
        ];
        let mid = midpoint(&path).unwrap();
        assert!(approx_eq(mid.latitude, 10.001, 1e-9));
    }

    #[test]
    fn test_midpoint_two_point_way_is_halfway() {
        let way = vec![GeoPoint::new(30.25, 120.15), GeoPoint::new(30.2516, 120.15)];
        let mid = midpoint(&way).unwrap();
        assert!(approx_eq(mid.latitude, 30.2508, 1e-9));
        assert!(approx_eq(
            haversine_distance(&way[0], &mid),
            haversine_distance(&mid, &way[1]),
            0.01
        ));
    }

    #[test]
    fn test_midpoint_uneven_legs() {
        // 10 m leg then 90 m leg: halfway (50 m) falls 40 m into the second leg
        let d = 1.0 / 111_195.0;
        let path = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(10.0 * d, 0.0),
            GeoPoint::new(100.0 * d, 0.0),
        ];
        let mid = midpoint(&path).unwrap();
        assert!(approx_eq(haversine_distance(&path[0], &mid), 50.0, 0.01));
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));

        let deg_45 = meters_to_degrees(111_320.0, 45.0);
        assert!(deg_45 > 1.0);

        // No floor near the pole: 5 m at 87.5° is about 0.001°
        let polar = meters_to_degrees(5.0, 87.5);
        assert!(approx_eq(polar, 5.0 / (111_320.0 * 87.5f64.to_radians().cos()), 1e-12));
        assert!(polar > 1e-3);
    }
}
