use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// A train/test partition of a dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// Partition `dataset` so each label keeps roughly the same share of samples
/// in both halves.
///
/// Every label needs at least two samples: one for each side. For a label
/// with `n` samples, `round(n * test_ratio)` of them (at least one, at most
/// `n - 1`) go to the test set.
pub fn stratified_split(dataset: &Dataset, test_ratio: f64, seed: u64) -> Result<Split> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "test_ratio must be within (0, 1), got {test_ratio}"
        )));
    }
    if dataset.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let counts = dataset.label_counts();
    if let Some((label, &count)) = counts.iter().find(|(_, count)| **count < 2) {
        return Err(Error::InsufficientSamples {
            label: label.to_string(),
            count,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(dataset.num_samples());
    let mut test = Vec::new();

    for (label, &count) in &counts {
        let mut rows: Vec<usize> = dataset
            .labels()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_str() == *label)
            .map(|(i, _)| i)
            .collect();
        rows.shuffle(&mut rng);

        let n_test = ((count as f64 * test_ratio).round() as usize).clamp(1, count - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    log::debug!("split: {} train / {} test rows", train.len(), test.len());

    Ok(Split {
        train: dataset.subset(&train),
        test: dataset.subset(&test),
    })
}
