//! # Density Clustering
//!
//! DBSCAN over track points with haversine distances.
//!
//! ## Algorithm
//! 1. Index all points in an R-tree keyed on `[lat, lng]`
//! 2. For each unvisited point, find neighbours within `eps` (the point itself excluded)
//! 3. Points with at least `min_pts` neighbours seed a cluster, expanded breadth-first
//!    from an explicit FIFO worklist
//! 4. Points reached from a core point join the cluster even if they were earlier marked
//!    as noise; their own neighbourhood is not searched again
//!
//! `visited` and `clustered` are tracked separately so a border point is claimed by the
//! first cluster that reaches it and never reassigned.

use std::collections::VecDeque;

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::GeoPoint;

/// Envelope slack over the degree conversion, so the R-tree pre-filter never
/// undershoots the exact haversine radius.
const ENVELOPE_MARGIN: f64 = 1.5;

/// One point in a clustering run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterPoint {
    pub point: GeoPoint,
    /// Index of the owning track in the run's track list
    pub track: usize,
    /// Contribution to weighted centroids (the owning track's quality)
    pub weight: f64,
}

/// Indices into the clustered point slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// =============================================================================
// R-tree Indexed Point for Spatial Queries
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

/// Neighbour lookup over one run's points.
struct NeighborIndex<'a> {
    points: &'a [ClusterPoint],
    tree: RTree<IndexedPoint>,
}

impl<'a> NeighborIndex<'a> {
    fn build(points: &'a [ClusterPoint]) -> Self {
        let indexed: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.point.is_valid())
            .map(|(i, p)| IndexedPoint {
                idx: i,
                lat: p.point.latitude,
                lng: p.point.longitude,
            })
            .collect();
        Self {
            points,
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Indices within `eps` meters of `idx`, excluding `idx`, in ascending order.
    fn neighbors(&self, idx: usize, eps: f64) -> Vec<usize> {
        let center = &self.points[idx].point;
        if !center.is_valid() {
            return Vec::new();
        }

        let mut found: Vec<usize> = search_envelopes(center, eps)
            .iter()
            .flat_map(|envelope| self.tree.locate_in_envelope(envelope))
            .filter(|ip| ip.idx != idx)
            .filter(|ip| haversine_distance(center, &self.points[ip.idx].point) <= eps)
            .map(|ip| ip.idx)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// Degree boxes covering every point within `eps` meters of `center`.
///
/// The longitude half-width is sized at the most poleward latitude the circle reaches.
/// When that reaches a pole, or the half-width spans the globe, the box is the full
/// longitude band. A box crossing ±180° gets a mirrored twin shifted by 360°.
fn search_envelopes(center: &GeoPoint, eps: f64) -> Vec<AABB<[f64; 2]>> {
    let lat_pad = meters_to_degrees(eps, 0.0) * ENVELOPE_MARGIN;
    let min_lat = (center.latitude - lat_pad).max(-90.0);
    let max_lat = (center.latitude + lat_pad).min(90.0);

    let edge = center.latitude.abs() + lat_pad;
    let lng_pad = if edge < 90.0 {
        meters_to_degrees(eps, edge) * ENVELOPE_MARGIN
    } else {
        f64::INFINITY
    };

    if lng_pad >= 180.0 {
        return vec![AABB::from_corners([min_lat, -180.0], [max_lat, 180.0])];
    }

    let west = center.longitude - lng_pad;
    let east = center.longitude + lng_pad;
    let mut envelopes = vec![AABB::from_corners([min_lat, west], [max_lat, east])];
    if west < -180.0 {
        envelopes.push(AABB::from_corners([min_lat, west + 360.0], [max_lat, east + 360.0]));
    }
    if east > 180.0 {
        envelopes.push(AABB::from_corners([min_lat, west - 360.0], [max_lat, east - 360.0]));
    }
    envelopes
}

/// Reference neighbour scan, O(n) per query. Same contract as the indexed search.
pub fn neighbors_brute_force(points: &[ClusterPoint], idx: usize, eps: f64) -> Vec<usize> {
    let center = &points[idx].point;
    points
        .iter()
        .enumerate()
        .filter(|(j, p)| *j != idx && haversine_distance(center, &p.point) <= eps)
        .map(|(j, _)| j)
        .collect()
}

// =============================================================================
// DBSCAN
// =============================================================================

/// Cluster `points` with DBSCAN.
///
/// A point is core when it has at least `min_pts` other points within `eps_meters`.
/// Noise is simply left out of the result. Clusters are numbered in discovery order.
pub fn dbscan(points: &[ClusterPoint], eps_meters: f64, min_pts: usize) -> Vec<Cluster> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }

    let index = NeighborIndex::build(points);
    let mut visited = vec![false; n];
    let mut clustered = vec![false; n];
    let mut clusters = Vec::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for seed in 0..n {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;

        let seed_neighbors = index.neighbors(seed, eps_meters);
        if seed_neighbors.len() < min_pts {
            continue;
        }

        let mut members = vec![seed];
        clustered[seed] = true;
        queue.clear();
        queue.extend(seed_neighbors);

        while let Some(j) = queue.pop_front() {
            if !clustered[j] {
                clustered[j] = true;
                members.push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;

            let nj = index.neighbors(j, eps_meters);
            if nj.len() >= min_pts {
                queue.extend(nj.into_iter().filter(|&k| !visited[k] || !clustered[k]));
            }
        }

        members.sort_unstable();
        debug!(
            "[Clustering] Cluster {} seeded at {} with {} points",
            clusters.len(),
            seed,
            members.len()
        );
        clusters.push(Cluster {
            id: clusters.len(),
            members,
        });
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp(lat: f64, lng: f64, track: usize) -> ClusterPoint {
        ClusterPoint {
            point: GeoPoint::new(lat, lng),
            track,
            weight: 1.0,
        }
    }

    /// `n` points within about a meter of (lat, lng).
    fn blob(lat: f64, lng: f64, n: usize, track: usize) -> Vec<ClusterPoint> {
        (0..n)
            .map(|i| cp(lat + (i as f64) * 2e-6, lng + (i % 2) as f64 * 2e-6, track))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(dbscan(&[], 5.0, 3).is_empty());
    }

    #[test]
    fn test_two_separate_blobs() {
        let mut points = blob(30.25, 120.15, 5, 0);
        points.extend(blob(30.26, 120.15, 4, 1));
        points.push(cp(30.27, 120.15, 2)); // isolated noise

        let clusters = dbscan(&points, 5.0, 3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![0, 1, 2, 3, 4]);
        assert_eq!(clusters[1].members, vec![5, 6, 7, 8]);
        assert_eq!(clusters[1].id, 1);
    }

    #[test]
    fn test_too_sparse_is_noise() {
        // Three points: each has only two neighbours, below min_pts = 3
        let points = blob(30.25, 120.15, 3, 0);
        assert!(dbscan(&points, 5.0, 3).is_empty());
    }

    #[test]
    fn test_noise_adopted_as_border() {
        // Point 0 sits ~4.8 m north of the blob's top point and out of reach of the
        // rest, so it is noise when visited first, then claimed as a border point.
        let mut points = vec![cp(30.250051, 120.15, 0)];
        points.extend(blob(30.25, 120.15, 5, 1));

        let n0 = neighbors_brute_force(&points, 0, 5.0);
        assert!(!n0.is_empty() && n0.len() < 3);

        let clusters = dbscan(&points, 5.0, 3);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].members.contains(&0));
    }

    #[test]
    fn test_no_point_in_two_clusters() {
        let mut points = blob(30.25, 120.15, 6, 0);
        points.extend(blob(30.25003, 120.15, 6, 1));
        points.extend(blob(30.30, 120.15, 6, 2));

        let clusters = dbscan(&points, 5.0, 3);
        let mut seen = vec![false; points.len()];
        for c in &clusters {
            for &m in &c.members {
                assert!(!seen[m], "point {} clustered twice", m);
                seen[m] = true;
            }
        }
    }

    #[test]
    fn test_rtree_matches_brute_force() {
        // Deterministic scatter over ~40 m, dense enough for many neighbour pairs
        let points: Vec<ClusterPoint> = (0..200)
            .map(|i| {
                let a = (i * 37 % 101) as f64 / 101.0;
                let b = (i * 53 % 97) as f64 / 97.0;
                cp(51.5 + a * 3.6e-4, -0.12 + b * 5.8e-4, i % 7)
            })
            .collect();
        assert_index_matches_brute_force(&points);
    }

    fn assert_index_matches_brute_force(points: &[ClusterPoint]) {
        let index = NeighborIndex::build(points);
        for eps in [2.0, 5.0, 12.0] {
            for i in 0..points.len() {
                assert_eq!(
                    index.neighbors(i, eps),
                    neighbors_brute_force(points, i, eps),
                    "point {} at eps {}",
                    i,
                    eps
                );
            }
        }
    }

    #[test]
    fn test_rtree_matches_brute_force_across_antimeridian() {
        // Scatter over ~10 m either side of 180° longitude (Taveuni, Fiji)
        let points: Vec<ClusterPoint> = (0..80)
            .map(|i| {
                let a = (i * 37 % 101) as f64 / 101.0;
                let b = (i * 53 % 97) as f64 / 97.0;
                let mut lng = 179.99995 + b * 1e-4;
                if lng > 180.0 {
                    lng -= 360.0;
                }
                cp(-16.8 + a * 1e-4, lng, i % 5)
            })
            .collect();
        assert!(points.iter().any(|p| p.point.longitude < 0.0));
        assert_index_matches_brute_force(&points);
    }

    #[test]
    fn test_cluster_straddling_antimeridian() {
        let points = vec![
            cp(-16.8, 179.999995, 0),
            cp(-16.8, -179.999995, 1),
            cp(-16.800005, 179.999995, 2),
            cp(-16.800005, -179.999995, 3),
        ];
        assert_eq!(NeighborIndex::build(&points).neighbors(0, 5.0), vec![1, 2, 3]);

        let clusters = dbscan(&points, 5.0, 3);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_rtree_matches_brute_force_near_poles() {
        // 2e-3° of longitude is about 11.6 m at 87°
        let mut points: Vec<ClusterPoint> = (0..80)
            .map(|i| {
                let a = (i * 37 % 101) as f64 / 101.0;
                let b = (i * 53 % 97) as f64 / 97.0;
                cp(87.0 + a * 1e-4, 10.0 + b * 2e-3, i % 5)
            })
            .collect();
        // Two fixes 4 m apart at 87.5°
        points.push(cp(87.5, 40.0, 5));
        points.push(cp(87.5, 40.0 + 4.0 / 4850.0, 6));
        // Fixes ringing both poles on opposite meridians
        points.push(cp(90.0, 0.0, 7));
        points.push(cp(89.99997, 45.0, 7));
        points.push(cp(89.99997, -135.0, 7));
        points.push(cp(-90.0, -10.0, 8));
        points.push(cp(-89.99998, 170.0, 8));

        let n = points.len();
        let index = NeighborIndex::build(&points);
        assert_eq!(index.neighbors(n - 7, 5.0), vec![n - 6]);
        assert_eq!(index.neighbors(n - 5, 5.0), vec![n - 4, n - 3]);
        assert_eq!(index.neighbors(n - 3, 12.0), vec![n - 5, n - 4]);
        assert_index_matches_brute_force(&points);
    }

    #[test]
    fn test_invalid_points_are_ignored() {
        let mut points = blob(30.25, 120.15, 5, 0);
        points.push(cp(f64::NAN, 120.15, 1));

        let clusters = dbscan(&points, 5.0, 3);
        assert_eq!(clusters.len(), 1);
        assert!(!clusters[0].members.contains(&5));
    }
}
