//! Classification scores.

use std::collections::BTreeMap;

/// Fraction of predictions that equal the true label.
///
/// Returns 0.0 for empty input.
pub fn accuracy<P, T>(predicted: &[P], truth: &[T]) -> f64
where
    P: PartialEq<T>,
{
    debug_assert_eq!(predicted.len(), truth.len());
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(truth).filter(|(p, t)| *p == *t).count();
    correct as f64 / truth.len() as f64
}

/// Test results for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    /// Test samples carrying this label.
    pub support: usize,
    /// Of those, how many were predicted correctly.
    pub correct: usize,
}

impl LabelScore {
    pub fn recall(&self) -> f64 {
        ratio(self.correct, self.support)
    }
}

/// Per-label recall, in label order.
pub fn per_label_scores<S: AsRef<str>>(predicted: &[S], truth: &[S]) -> Vec<LabelScore> {
    let mut scores: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (p, t) in predicted.iter().zip(truth) {
        let entry = scores.entry(t.as_ref()).or_insert((0, 0));
        entry.0 += 1;
        if p.as_ref() == t.as_ref() {
            entry.1 += 1;
        }
    }
    scores
        .into_iter()
        .map(|(label, (support, correct))| LabelScore {
            label: label.to_string(),
            support,
            correct,
        })
        .collect()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
