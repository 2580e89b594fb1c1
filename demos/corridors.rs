//! Find popular walking corridors in synthetic GPS tracks.
//!
//! Run with: cargo run --example corridors

use heatline::{
    find_corridors, payload, ClusterConfig, GeoPoint, Track, TrackRecorder,
};

/// A walk along a shared boardwalk (with a little GPS jitter) before heading off
/// in its own direction.
fn walk(session: &str, jitter: f64, heading_deg: f64) -> Track {
    let mut rec = TrackRecorder::start(session, "west-lake", "demo-user", 0);
    let mut t = 0i64;

    // 20 m of boardwalk, one fix per second at ~1 m/s
    for i in 0..20 {
        let lat = 30.2500 + i as f64 * 9e-6 + jitter;
        rec.record(GeoPoint::fix(lat, 120.1500 + jitter, t, Some(5.0)));
        t += 1_000;
    }

    // Then 60 m in a different direction
    let (dlat, dlng) = (heading_deg.to_radians().cos(), heading_deg.to_radians().sin());
    for i in 1..=60 {
        let lat = 30.25018 + dlat * i as f64 * 9e-6;
        let lng = 120.1500 + dlng * i as f64 * 1.04e-5;
        rec.record(GeoPoint::fix(lat, lng, t, Some(5.0)));
        t += 1_000;
    }

    if let Some(last) = rec.points().last() {
        println!("{}: last fix at {:.6}, {:.6}", session, last.latitude, last.longitude);
    }

    rec.finish(t)
}

fn main() {
    let tracks = vec![
        walk("morning", 0.0, 0.0),
        walk("noon", 4e-6, 90.0),
        walk("evening", -3e-6, 200.0),
    ];

    for t in &tracks {
        println!(
            "{}: {} fixes, {:.0}m, {:.2} m/s, quality {:.2}",
            t.session_id,
            t.points.len(),
            t.total_length,
            t.avg_speed,
            t.quality
        );
    }

    let config = ClusterConfig::default();
    let corridors = find_corridors(&tracks, None, &config);

    println!("\n{} corridor(s):", corridors.len());
    for c in &corridors {
        println!(
            "  {} heat {:.2} confidence {:.2} tracks {} points {} width {:.1}m access {}",
            c.id,
            c.heat,
            c.confidence,
            c.track_count,
            c.point_count,
            c.width,
            c.accessibility
        );
    }

    let heatlines: Vec<_> = corridors.iter().map(|c| c.to_heatline()).collect();
    match payload::to_json(&heatlines) {
        Ok(json) => println!("\n{}", json),
        Err(e) => eprintln!("encode failed: {}", e),
    }
}
