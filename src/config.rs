//! Top-level configuration.
//!
//! Every section has a `Default` matching the documented behaviour, and every struct
//! deserializes with `#[serde(default)]`, so a config file only lists what it changes:
//!
//! ```json
//! { "clustering": { "min_confidence": 0.8 }, "scoring": { "facility_radius_meters": 150 } }
//! ```

use log::info;
use serde::{Deserialize, Serialize};

use crate::corridors::ClusterConfig;
use crate::error::Result;
use crate::scoring::{HeatScorer, ScoringTables};
use crate::tracks::RecorderConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatlineConfig {
    pub scoring: ScoringTables,
    pub clustering: ClusterConfig,
    pub recorder: RecorderConfig,
}

impl HeatlineConfig {
    /// Parse and validate a (possibly partial) JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        info!(
            "[Config] Loaded: eps {}m, min_pts {}, min_confidence {}",
            config.clustering.eps_meters, config.clustering.min_pts, config.clustering.min_confidence
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.clustering.validate()?;
        if self.recorder.max_accuracy.is_nan() || self.recorder.max_accuracy <= 0.0 {
            return Err(crate::HeatlineError::config(
                "recorder.max_accuracy",
                format!("must be positive, got {}", self.recorder.max_accuracy),
            ));
        }
        Ok(())
    }

    /// A scorer over this config's tables.
    pub fn scorer(&self) -> HeatScorer {
        HeatScorer::new(self.scoring.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeatlineError;
    use crate::osm::HighwayType;

    #[test]
    fn test_empty_json_is_default() {
        let config = HeatlineConfig::from_json("{}").unwrap();
        assert_eq!(config, HeatlineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "clustering": { "min_confidence": 0.8, "merge_distance_meters": 25.0 },
            "scoring": { "road_base": { "steps": 0.05 }, "facility_radius_meters": 150 }
        }"#;
        let config = HeatlineConfig::from_json(json).unwrap();

        assert_eq!(config.clustering.min_confidence, 0.8);
        assert_eq!(config.clustering.merge_distance_meters, Some(25.0));
        assert_eq!(config.clustering.eps_meters, 5.0);
        assert_eq!(config.scoring.facility_radius_meters, 150.0);
        // A provided map replaces the default map wholesale
        assert_eq!(config.scoring.road_base(&HighwayType::Steps), 0.05);
        assert_eq!(config.scoring.road_base(&HighwayType::Pedestrian), 0.5);
    }

    #[test]
    fn test_rejects_non_positive_eps() {
        let err = HeatlineConfig::from_json(r#"{"clustering": {"eps_meters": 0}}"#).unwrap_err();
        match err {
            HeatlineError::InvalidConfig { field, .. } => assert_eq!(field, "eps_meters"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_bad_recorder() {
        let err = HeatlineConfig::from_json(r#"{"recorder": {"max_accuracy": -1}}"#).unwrap_err();
        assert!(err.to_string().contains("recorder.max_accuracy"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            HeatlineConfig::from_json("{ not json"),
            Err(HeatlineError::Json(_))
        ));
    }

    #[test]
    fn test_json_round_trip_of_defaults() {
        let json = HeatlineConfig::default().to_json().unwrap();
        let back = HeatlineConfig::from_json(&json).unwrap();
        assert_eq!(back, HeatlineConfig::default());
    }
}
