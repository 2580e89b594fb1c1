//! Benchmark sequential vs parallel scoring over a synthetic street grid.
//!
//! Run with: cargo run --release --example batch_scoring --features parallel

use std::time::Instant;

use heatline::{GeoPoint, HeatScorer, PathSegment, ScoringContext, UserType, WayTags, Weather};

const HIGHWAYS: [&str; 8] = [
    "pedestrian", "footway", "path", "residential", "service", "steps", "secondary", "primary",
];
const ACCESS: [&str; 4] = ["yes", "limited", "no", ""];
const INCLINES: [&str; 4] = ["0%", "4%", "7%", "3°"];

fn main() {
    let mut segments = Vec::new();
    for row in 0..200 {
        for col in 0..100 {
            let lat = 30.20 + row as f64 * 5e-4;
            let lng = 120.10 + col as f64 * 5e-4;
            let i = row * 100 + col;
            let tags = WayTags {
                highway: HIGHWAYS[i % HIGHWAYS.len()].into(),
                wheelchair: ACCESS[i % ACCESS.len()].into(),
                incline: Some(INCLINES[i % INCLINES.len()].to_string()),
                ..WayTags::default()
            };
            let points = vec![
                GeoPoint::new(lat, lng),
                GeoPoint::new(lat + 2.5e-4, lng),
                GeoPoint::new(lat + 5e-4, lng),
            ];
            segments.push(PathSegment::new(format!("street-{}", i), points, tags));
        }
    }

    let scorer = HeatScorer::default();
    let ctx = ScoringContext::new(UserType::Wheelchair, 14, Weather::Cloudy);

    let start = Instant::now();
    let sequential = scorer.score_all(&segments, &[], &ctx);
    let seq_time = start.elapsed();

    let start = Instant::now();
    let parallel = scorer.score_all_parallel(&segments, &[], &ctx);
    let par_time = start.elapsed();

    assert_eq!(sequential, parallel);

    let mean = sequential.iter().map(|s| s.heat).sum::<f64>() / sequential.len() as f64;
    println!("Scored {} segments (mean heat {:.3})", sequential.len(), mean);
    println!("  sequential: {:?}", seq_time);
    println!("  parallel:   {:?}", par_time);
}
