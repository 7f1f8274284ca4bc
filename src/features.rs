use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{
    min_corner, Detections, GroupKind, Point, FACE_MESH_POINTS, HAND_POINTS, POSE_POINTS,
};

/// A flat feature vector: interleaved `x, y` values per landmark, groups in
/// [`GroupKind::ALL`] order.
pub type FeatureVector = Vec<f32>;

/// Settings that determine the layout and scale of feature vectors.
///
/// A model is only valid for vectors produced with the configuration it was
/// trained with, so this is stored alongside trained models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Weight applied to both hand groups.
    pub hand_weight: f32,
    /// Weight applied to the face subset.
    pub face_weight: f32,
    /// Weight applied to the pose group.
    pub pose_weight: f32,
    /// Face mesh indices to encode, in output order.
    pub face_indices: Vec<usize>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            hand_weight: 1.0,
            face_weight: 0.1,
            pose_weight: 0.3,
            face_indices: vec![1, 4, 10],
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("hand_weight", self.hand_weight),
            ("face_weight", self.face_weight),
            ("pose_weight", self.pose_weight),
        ] {
            if !weight.is_finite() {
                return Err(Error::InvalidConfig(format!("{name} must be finite, got {weight}")));
            }
        }
        if self.face_indices.is_empty() {
            return Err(Error::InvalidConfig("face_indices must not be empty".into()));
        }
        if let Some(&idx) = self.face_indices.iter().find(|&&i| i >= FACE_MESH_POINTS) {
            return Err(Error::InvalidConfig(format!(
                "face index {idx} is outside the {FACE_MESH_POINTS}-point face mesh"
            )));
        }
        Ok(())
    }

    pub fn weight(&self, kind: GroupKind) -> f32 {
        match kind {
            GroupKind::LeftHand | GroupKind::RightHand => self.hand_weight,
            GroupKind::Face => self.face_weight,
            GroupKind::Pose => self.pose_weight,
        }
    }

    /// Number of landmarks a group contributes to the feature vector.
    pub fn encoded_points(&self, kind: GroupKind) -> usize {
        match kind {
            GroupKind::LeftHand | GroupKind::RightHand => HAND_POINTS,
            GroupKind::Face => self.face_indices.len(),
            GroupKind::Pose => POSE_POINTS,
        }
    }

    /// Total feature vector length.
    pub fn feature_len(&self) -> usize {
        GroupKind::ALL
            .iter()
            .map(|&kind| self.encoded_points(kind) * 2)
            .sum()
    }

    /// Columns occupied by `kind` in a feature vector.
    pub fn segment(&self, kind: GroupKind) -> Range<usize> {
        let start: usize = GroupKind::ALL
            .iter()
            .take_while(|&&k| k != kind)
            .map(|&k| self.encoded_points(k) * 2)
            .sum();
        start..start + self.encoded_points(kind) * 2
    }
}

/// Turns per-image detections into fixed-length feature vectors.
///
/// Each present group is translated so that its bounding box starts at the
/// origin (per image, per group), then scaled by the group's weight. Absent
/// groups are filled with zeros, so every vector has the same length.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn feature_len(&self) -> usize {
        self.config.feature_len()
    }

    pub fn encode(&self, detections: &Detections) -> FeatureVector {
        let mut out = Vec::with_capacity(self.feature_len());

        for kind in GroupKind::ALL {
            let weight = self.config.weight(kind);
            match detections.get(kind) {
                Some(group) if kind == GroupKind::Face => {
                    let subset: Vec<Point> =
                        self.config.face_indices.iter().map(|&i| group[i]).collect();
                    push_normalized(&mut out, &subset, weight);
                }
                Some(group) => push_normalized(&mut out, &group.points, weight),
                None => {
                    let width = self.config.encoded_points(kind) * 2;
                    out.resize(out.len() + width, 0.0);
                }
            }
        }

        debug_assert_eq!(out.len(), self.feature_len());
        out
    }
}

fn push_normalized(out: &mut Vec<f32>, points: &[Point], weight: f32) {
    let origin = min_corner(points);
    for p in points {
        let shifted = (*p - origin) * weight;
        out.push(shifted.x);
        out.push(shifted.y);
    }
}
