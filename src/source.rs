//! Landmark detection input.
//!
//! Detection is done by an external model. The pipeline only needs its
//! per-image output, which it obtains through the [`LandmarkSource`] trait.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Detections, GroupKind, LandmarkGroup, Point};

/// A decoded input image and where it came from.
pub struct SourceImage {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl SourceImage {
    /// Decode the image at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let image = image::open(&path)?;
        Ok(Self { path, image })
    }
}

/// Anything that can produce landmark groups for a single still image.
///
/// Every call is independent; implementations must not track state between
/// images.
pub trait LandmarkSource {
    fn detect(&mut self, image: &SourceImage) -> Result<Detections>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Groups reported with a lower score are treated as not detected.
    pub min_confidence: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

/// One group as written by the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarGroup {
    #[serde(default = "full_score")]
    pub score: f32,
    /// `[x, y]` or `[x, y, z]` per landmark. Depth is ignored.
    pub points: Vec<Vec<f32>>,
}

fn full_score() -> f32 {
    1.0
}

/// Detector output file for one image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarFile {
    pub left_hand: Option<SidecarGroup>,
    pub right_hand: Option<SidecarGroup>,
    pub face: Option<SidecarGroup>,
    pub pose: Option<SidecarGroup>,
}

impl SidecarFile {
    fn group(&self, kind: GroupKind) -> Option<&SidecarGroup> {
        match kind {
            GroupKind::LeftHand => self.left_hand.as_ref(),
            GroupKind::RightHand => self.right_hand.as_ref(),
            GroupKind::Face => self.face.as_ref(),
            GroupKind::Pose => self.pose.as_ref(),
        }
    }

    /// Convert to validated detections, dropping groups scored below
    /// `min_confidence`.
    pub fn into_detections(self, min_confidence: f32) -> Result<Detections> {
        let mut detections = Detections::new();
        for kind in GroupKind::ALL {
            let Some(group) = self.group(kind) else {
                continue;
            };
            if group.score < min_confidence {
                log::debug!(
                    "dropping {} group with score {:.2} < {:.2}",
                    kind,
                    group.score,
                    min_confidence
                );
                continue;
            }
            let mut points = Vec::with_capacity(group.points.len());
            for coords in &group.points {
                match coords.as_slice() {
                    [x, y, ..] => points.push(Point::new(*x, *y)),
                    _ => {
                        return Err(Error::InvalidDetection {
                            kind,
                            expected: 2,
                            actual: coords.len(),
                        })
                    }
                }
            }
            detections.insert(kind, LandmarkGroup::new(points))?;
        }
        Ok(detections)
    }
}

/// Reads detector results stored next to each image as
/// `<stem>.landmarks.json`.
#[derive(Debug, Clone)]
pub struct SidecarSource {
    config: DetectionConfig,
}

impl SidecarSource {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        image_path.with_extension("landmarks.json")
    }
}

impl LandmarkSource for SidecarSource {
    fn detect(&mut self, image: &SourceImage) -> Result<Detections> {
        let path = Self::sidecar_path(&image.path);
        if !path.is_file() {
            return Err(Error::MissingDetections(image.path.clone()));
        }
        let reader = BufReader::new(File::open(&path)?);
        let file: SidecarFile = serde_json::from_reader(reader)?;
        file.into_detections(self.config.min_confidence)
    }
}
