use std::path::PathBuf;

use thiserror::Error;

use crate::types::GroupKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid {kind} landmarks: got {actual} points, need {expected}")]
    InvalidDetection {
        kind: GroupKind,
        expected: usize,
        actual: usize,
    },

    #[error("No landmark detections found for {0}")]
    MissingDetections(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feature vector has length {actual}, expected {expected}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("Dataset contains no samples")]
    EmptyDataset,

    #[error("Corrupt dataset: {0}")]
    CorruptDataset(String),

    #[error("Label {label:?} has {count} sample(s); stratified split needs at least 2 per label")]
    InsufficientSamples { label: String, count: usize },

    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

pub type Result<T> = std::result::Result<T, Error>;
