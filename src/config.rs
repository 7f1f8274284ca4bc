use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::EncoderConfig;
use crate::source::DetectionConfig;
use crate::train::TrainConfig;

/// All settings for one extraction + training run.
///
/// Extraction and training read the same file so that the encoder settings
/// cannot differ between the two stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub encoder: EncoderConfig,
    pub detection: DetectionConfig,
    pub training: TrainConfig,
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.detection.validate()?;
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.encoder.hand_weight, 1.0);
        assert_eq!(config.encoder.face_weight, 0.1);
        assert_eq!(config.encoder.pose_weight, 0.3);
        assert_eq!(config.encoder.face_indices, vec![1, 4, 10]);
        assert_eq!(config.detection.min_confidence, 0.6);
        assert_eq!(config.training.test_ratio, 0.2);
        assert_eq!(config.training.forest.n_trees, 100);
        assert_eq!(config.training.forest.seed, 42);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{ "encoder": { "pose_weight": 0.5 }, "training": { "forest": { "n_trees": 25 } } }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.encoder.pose_weight, 0.5);
        assert_eq!(config.encoder.hand_weight, 1.0);
        assert_eq!(config.training.forest.n_trees, 25);
        assert_eq!(config.training.forest.seed, 42);
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "training": { "test_ratio": 0.0 } }"#).unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(Error::InvalidConfig(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(Error::Config(_))));
    }
}
