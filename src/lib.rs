//! # gesture-forest
//!
//! Landmark feature extraction and random forest training for hand gesture
//! and sign recognition.
//!
//! This crate provides:
//! - **Feature Encoding**: fixed-length vectors from hand, face and pose
//!   landmarks, normalized per image and per group
//! - **Dataset Building**: encoding a `root/<label>/<image>` tree into a
//!   feature matrix with a parallel label column
//! - **Training**: stratified train/test split, bagged decision trees and an
//!   accuracy report
//!
//! Landmark detection itself is done by an external model; its output is read
//! through the [`LandmarkSource`] trait.
//!
//! ## Feature Layout
//!
//! Groups are encoded in the order left hand, right hand, face subset, pose.
//! For a detected group the per-axis minimum over its points is subtracted
//! from every point, the result is scaled by the group weight and written as
//! interleaved `x, y` pairs. Undetected groups are written as zeros, so every
//! vector has the same length: `2 * (21 + 21 + face_indices.len() + 33)`.
//!
//! ## Quick Start
//!
//! ```rust
//! use gesture_forest::{
//!     Detections, EncoderConfig, FeatureEncoder, GroupKind, LandmarkGroup, Point,
//! };
//!
//! let encoder = FeatureEncoder::new(EncoderConfig::default()).unwrap();
//!
//! let hand = LandmarkGroup::new(
//!     (0..21).map(|i| Point::new(0.4 + i as f32 * 0.01, 0.6)).collect(),
//! );
//! let detections = Detections::new()
//!     .with(GroupKind::RightHand, hand)
//!     .unwrap();
//!
//! let features = encoder.encode(&detections);
//! assert_eq!(features.len(), 156);
//! ```
//!
//! ## Custom Landmark Sources
//!
//! Implement [`LandmarkSource`] to plug in a detector:
//!
//! ```rust
//! use gesture_forest::{Detections, LandmarkSource, Result, SourceImage};
//!
//! struct NoDetector;
//!
//! impl LandmarkSource for NoDetector {
//!     fn detect(&mut self, _image: &SourceImage) -> Result<Detections> {
//!         // Every group absent: the image encodes to all zeros.
//!         Ok(Detections::new())
//!     }
//! }
//! ```

mod config;
mod dataset;
mod error;
mod features;
mod metrics;
mod model;
mod source;
mod split;
mod train;
mod tree;
mod types;

pub use config::PipelineConfig;
pub use dataset::{BuildReport, Dataset, DatasetBuilder, LabeledSample};
pub use error::{Error, Result};
pub use features::{EncoderConfig, FeatureEncoder, FeatureVector};
pub use metrics::{accuracy, per_label_scores, LabelScore};
pub use model::{ForestConfig, GestureModel, RandomForest};
pub use source::{
    DetectionConfig, LandmarkSource, SidecarFile, SidecarGroup, SidecarSource, SourceImage,
};
pub use split::{stratified_split, Split};
pub use train::{train, TrainConfig, TrainOutcome};
pub use tree::{DecisionTree, TrainingSet, TreeConfig, TreeNode};
pub use types::{
    min_corner, Detections, GroupKind, LandmarkGroup, Point, FACE_MESH_POINTS, HAND_POINTS,
    POSE_POINTS,
};
