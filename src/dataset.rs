use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use image::ImageFormat;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{EncoderConfig, FeatureEncoder, FeatureVector};
use crate::source::{LandmarkSource, SourceImage};

/// One encoded image and the label of the directory it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: String,
}

/// Feature matrix (one row per sample) with a parallel label column.
///
/// The encoder configuration that produced the rows travels with them, so a
/// model trained on the dataset can encode new images the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    encoder: EncoderConfig,
    features: Array2<f32>,
    labels: Vec<String>,
}

impl Dataset {
    /// Create an empty dataset for vectors produced with `encoder`.
    pub fn new(encoder: EncoderConfig) -> Self {
        let width = encoder.feature_len();
        Self {
            encoder,
            features: Array2::zeros((0, width)),
            labels: Vec::new(),
        }
    }

    pub fn from_parts(
        encoder: EncoderConfig,
        features: Array2<f32>,
        labels: Vec<String>,
    ) -> Result<Self> {
        encoder
            .validate()
            .map_err(|e| Error::CorruptDataset(e.to_string()))?;
        if features.ncols() != encoder.feature_len() {
            return Err(Error::CorruptDataset(format!(
                "rows have {} features but the stored encoder produces {}",
                features.ncols(),
                encoder.feature_len()
            )));
        }
        if features.nrows() != labels.len() {
            return Err(Error::CorruptDataset(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self {
            encoder,
            features,
            labels,
        })
    }

    pub fn push(&mut self, sample: LabeledSample) -> Result<()> {
        if sample.features.len() != self.feature_len() {
            return Err(Error::FeatureLength {
                expected: self.feature_len(),
                actual: sample.features.len(),
            });
        }
        self.features
            .push_row(ArrayView1::from(sample.features.as_slice()))
            .map_err(|e| Error::CorruptDataset(e.to_string()))?;
        self.labels.push(sample.label);
        Ok(())
    }

    pub fn num_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_len(&self) -> usize {
        self.features.ncols()
    }

    /// Encoder settings the rows were produced with.
    pub fn encoder(&self) -> &EncoderConfig {
        &self.encoder
    }

    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of samples per label, in label order.
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Copy the given rows, in the given order, into a new dataset.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            encoder: self.encoder.clone(),
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let dataset: Self = bincode::deserialize(&bytes)?;
        Self::from_parts(dataset.encoder, dataset.features, dataset.labels)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

/// Counts collected while building a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Images that were encoded into the dataset.
    pub images: usize,
    /// Files with an image extension that could not be decoded.
    pub unreadable: usize,
    /// Files that are not images (detector sidecars, notes, ...).
    pub ignored: usize,
    /// Encoded images per label.
    pub per_label: BTreeMap<String, usize>,
}

/// Walks a `root/<label>/<image>` tree and encodes every readable image.
pub struct DatasetBuilder {
    encoder: FeatureEncoder,
}

impl DatasetBuilder {
    pub fn new(encoder: FeatureEncoder) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Build a dataset from every label directory under `root`.
    ///
    /// Directories and files are visited in name order. Images that fail to
    /// decode are skipped; detector and I/O errors abort the build.
    pub fn build<P, S>(&self, root: P, source: &mut S) -> Result<(Dataset, BuildReport)>
    where
        P: AsRef<Path>,
        S: LandmarkSource,
    {
        let mut dataset = Dataset::new(self.encoder.config().clone());
        let mut report = BuildReport::default();

        for label_dir in sorted_entries(root.as_ref())? {
            if !label_dir.is_dir() {
                continue;
            }
            let Some(label) = label_dir.file_name().and_then(|n| n.to_str()) else {
                log::warn!("skipping directory with non UTF-8 name: {}", label_dir.display());
                continue;
            };
            let label = label.to_string();
            let count = self.build_label(&label_dir, &label, source, &mut dataset, &mut report)?;
            log::info!("label {:?}: {} image(s)", label, count);
            report.per_label.insert(label, count);
        }

        log::info!(
            "encoded {} image(s), skipped {} unreadable, ignored {} other file(s)",
            report.images,
            report.unreadable,
            report.ignored
        );
        Ok((dataset, report))
    }

    fn build_label<S: LandmarkSource>(
        &self,
        dir: &Path,
        label: &str,
        source: &mut S,
        dataset: &mut Dataset,
        report: &mut BuildReport,
    ) -> Result<usize> {
        let mut count = 0;

        for path in sorted_entries(dir)? {
            if !path.is_file() {
                continue;
            }
            if ImageFormat::from_path(&path).is_err() {
                log::debug!("ignoring non-image file {}", path.display());
                report.ignored += 1;
                continue;
            }
            let image = match SourceImage::open(&path) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("skipping {}: {}", path.display(), e);
                    report.unreadable += 1;
                    continue;
                }
            };

            let detections = source.detect(&image)?;
            log::debug!(
                "{}: detected {:?}",
                path.display(),
                detections.present().collect::<Vec<_>>()
            );
            dataset.push(LabeledSample {
                features: self.encoder.encode(&detections),
                label: label.to_string(),
            })?;
            count += 1;
            report.images += 1;
        }

        Ok(count)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}
