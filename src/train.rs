use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::metrics::{accuracy, per_label_scores, LabelScore};
use crate::model::{ForestConfig, GestureModel, RandomForest};
use crate::split::stratified_split;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Share of each label held out for evaluation.
    pub test_ratio: f64,
    /// Seed for the train/test shuffle.
    pub split_seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            split_seed: 42,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "test_ratio must be within (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(Error::InvalidConfig("n_trees must be at least 1".into()));
        }
        Ok(())
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: GestureModel,
    /// Exact-match accuracy on the held-out rows, in [0, 1].
    pub accuracy: f64,
    pub per_label: Vec<LabelScore>,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl TrainOutcome {
    /// One-line accuracy report, e.g.
    /// `87.50% of samples were classified correctly!`.
    pub fn summary(&self) -> String {
        format!(
            "{:.2}% of samples were classified correctly!",
            self.accuracy * 100.0
        )
    }
}

/// Split `dataset`, fit a random forest on the training rows and score it on
/// the held-out rows.
///
/// The model keeps the encoder configuration stored in the dataset.
pub fn train(dataset: &Dataset, config: &TrainConfig) -> Result<TrainOutcome> {
    config.validate()?;

    let split = stratified_split(dataset, config.test_ratio, config.split_seed)?;
    let labels: Vec<String> = dataset
        .label_counts()
        .keys()
        .map(|label| label.to_string())
        .collect();
    let classes = class_indices(&labels, split.train.labels())?;

    log::info!(
        "training {} trees on {} rows ({} labels), testing on {} rows",
        config.forest.n_trees,
        split.train.num_samples(),
        labels.len(),
        split.test.num_samples()
    );
    let forest = RandomForest::fit(
        split.train.features().view(),
        &classes,
        labels.len(),
        &config.forest,
    )?;
    let model = GestureModel::new(dataset.encoder().clone(), labels, forest)?;

    let mut predicted = Vec::with_capacity(split.test.num_samples());
    for row in split.test.features().rows() {
        let row = row.to_vec();
        predicted.push(model.predict(&row)?.to_string());
    }
    let truth = split.test.labels();
    let accuracy = accuracy(&predicted, truth);
    let per_label = per_label_scores(&predicted, truth);
    for score in &per_label {
        log::info!(
            "  {:<16} {:>3}/{:<3} correct ({:.1}%)",
            score.label,
            score.correct,
            score.support,
            score.recall() * 100.0
        );
    }

    Ok(TrainOutcome {
        model,
        accuracy,
        per_label,
        train_rows: split.train.num_samples(),
        test_rows: split.test.num_samples(),
    })
}

/// Map label names to their index in the sorted `labels` list.
fn class_indices(labels: &[String], rows: &[String]) -> Result<Vec<u32>> {
    rows.iter()
        .map(|row| {
            labels
                .binary_search(row)
                .map(|i| i as u32)
                .map_err(|_| Error::CorruptDataset(format!("label {row:?} has no class index")))
        })
        .collect()
}
