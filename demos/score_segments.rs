//! Score a handful of paths around a lake for different user profiles.
//!
//! Run with: cargo run --example score_segments

use heatline::{
    FacilityCategory, FacilityPoint, GeoPoint, HeatScorer, PathSegment, ScoringContext, UserType,
    WayTags, Weather,
};

fn way(name: &str, highway: &str, wheelchair: &str, incline: Option<&str>, points: &[(f64, f64)]) -> PathSegment {
    let tags = WayTags {
        highway: highway.into(),
        wheelchair: wheelchair.into(),
        incline: incline.map(str::to_string),
        ..WayTags::default()
    };
    let points = points.iter().map(|&(lat, lng)| GeoPoint::new(lat, lng)).collect();
    PathSegment::new(name, points, tags)
}

fn main() {
    let segments = vec![
        way("Lakeside promenade", "pedestrian", "yes", None, &[(30.2590, 120.1300), (30.2594, 120.1304), (30.2598, 120.1309)]),
        way("Temple steps", "steps", "no", Some("25%"), &[(30.2410, 120.1290), (30.2413, 120.1292)]),
        way("Hill trail", "path", "limited", Some("6%"), &[(30.2450, 120.1200), (30.2460, 120.1210), (30.2470, 120.1225)]),
        way("Ring road", "primary", "", None, &[(30.2600, 120.1400), (30.2650, 120.1450)]),
    ];

    let facilities = vec![
        FacilityPoint::new(30.2594, 120.1305, FacilityCategory::Toilet),
        FacilityPoint::new(30.2595, 120.1303, FacilityCategory::Bench),
    ];

    let scorer = HeatScorer::default();

    for (user, hour, weather) in [
        (UserType::Wheelchair, 15, Weather::Sunny),
        (UserType::Elderly, 9, Weather::Cloudy),
        (UserType::Normal, 23, Weather::Rainy),
    ] {
        let ctx = ScoringContext::new(user, hour, weather);
        println!("{:?} at {:02}:00, {:?}", user, hour, weather);

        for s in scorer.score_all(&segments, &facilities, &ctx) {
            println!(
                "  {:<20} heat {:.2}  access {:<8} {:>6.0}m  (raw {:.2}, facilities +{:.2}, slope -{:.1})",
                s.name,
                s.heat,
                s.accessibility.as_str(),
                s.length_meters,
                s.breakdown.raw_heat,
                s.breakdown.facility_bonus,
                s.breakdown.slope_penalty
            );
        }
        println!();
    }
}
