use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::ArrayView2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{EncoderConfig, FeatureEncoder};
use crate::tree::{argmax, DecisionTree, TrainingSet, TreeConfig};
use crate::types::Detections;

/// Random forest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest.
    pub n_trees: usize,
    /// Train each tree on a bootstrap resample of the rows.
    pub bootstrap: bool,
    /// Tree `i` is grown from `seed + i`.
    pub seed: u64,
    pub tree: TreeConfig,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            bootstrap: true,
            seed: 42,
            tree: TreeConfig::default(),
        }
    }
}

/// An ensemble of classification trees voting on a class index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    num_features: usize,
    num_classes: usize,
}

impl RandomForest {
    /// Fit a forest on `features` (one row per sample) and class indices in
    /// `0..num_classes`.
    pub fn fit<'a>(
        features: ArrayView2<'a, f32>,
        classes: &'a [u32],
        num_classes: usize,
        config: &ForestConfig,
    ) -> Result<Self> {
        let n = features.nrows();
        if n == 0 {
            return Err(Error::EmptyDataset);
        }
        if classes.len() != n {
            return Err(Error::CorruptDataset(format!(
                "{} feature rows but {} class labels",
                n,
                classes.len()
            )));
        }
        if config.n_trees == 0 {
            return Err(Error::InvalidConfig("n_trees must be at least 1".into()));
        }

        let data = TrainingSet {
            features,
            classes,
            num_classes,
        };
        let all_rows: Vec<usize> = (0..n).collect();

        let mut trees = Vec::with_capacity(config.n_trees);
        for i in 0..config.n_trees {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
            let rows: Vec<usize> = if config.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                all_rows.clone()
            };
            trees.push(DecisionTree::fit(&data, &rows, &config.tree, &mut rng));
        }

        log::debug!(
            "fitted {} trees on {} rows x {} features (mean depth {:.1})",
            trees.len(),
            n,
            features.ncols(),
            trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(Self {
            trees,
            num_features: features.ncols(),
            num_classes,
        })
    }

    /// Check the forest's shape and every tree against it.
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::InvalidModel("forest has no trees".into()));
        }
        if self.num_classes == 0 {
            return Err(Error::InvalidModel("forest has no classes".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.num_features, self.num_classes)
                .map_err(|e| match e {
                    Error::InvalidModel(msg) => Error::InvalidModel(format!("tree {i}: {msg}")),
                    other => other,
                })?;
        }
        Ok(())
    }

    /// Vote counts per class for one sample.
    ///
    /// `features` must hold [`num_features`](Self::num_features) values.
    pub fn votes(&self, features: &[f32]) -> Vec<usize> {
        let mut votes = vec![0usize; self.num_classes];
        for tree in &self.trees {
            votes[tree.predict(features) as usize] += 1;
        }
        votes
    }

    /// Majority vote; ties go to the lowest class index.
    pub fn predict(&self, features: &[f32]) -> u32 {
        argmax(&self.votes(features))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// A trained gesture classifier.
///
/// Besides the forest, the model stores its label names and the encoder
/// configuration used to produce its training vectors, so that images can be
/// classified later with exactly the same encoding.
///
/// # Usage
///
/// ```ignore
/// let model = GestureModel::load("model.bin")?;
/// let label = model.classify(&detections);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureModel {
    encoder: EncoderConfig,
    /// Sorted label names; class index `i` is `labels[i]`.
    labels: Vec<String>,
    forest: RandomForest,
}

impl GestureModel {
    pub fn new(encoder: EncoderConfig, labels: Vec<String>, forest: RandomForest) -> Result<Self> {
        let model = Self {
            encoder,
            labels,
            forest,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        self.encoder
            .validate()
            .map_err(|e| Error::InvalidModel(e.to_string()))?;
        if self.forest.num_features() != self.encoder.feature_len() {
            return Err(Error::InvalidModel(format!(
                "forest expects {} features but the encoder produces {}",
                self.forest.num_features(),
                self.encoder.feature_len()
            )));
        }
        if self.forest.num_classes() != self.labels.len() {
            return Err(Error::InvalidModel(format!(
                "forest has {} classes but {} labels are stored",
                self.forest.num_classes(),
                self.labels.len()
            )));
        }
        self.forest.validate()
    }

    /// Load a model from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Save the model to a binary file, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn encoder_config(&self) -> &EncoderConfig {
        &self.encoder
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Predict the label of an encoded feature vector.
    pub fn predict(&self, features: &[f32]) -> Result<&str> {
        if features.len() != self.forest.num_features() {
            return Err(Error::FeatureLength {
                expected: self.forest.num_features(),
                actual: features.len(),
            });
        }
        Ok(&self.labels[self.forest.predict(features) as usize])
    }

    /// Encode detections with the training-time encoder and predict a label.
    pub fn classify(&self, detections: &Detections) -> Result<&str> {
        let encoder = FeatureEncoder::new(self.encoder.clone())?;
        self.predict(&encoder.encode(detections))
    }
}
