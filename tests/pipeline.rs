//! End-to-end tests: image tree -> dataset -> model.

use std::fs;
use std::path::Path;

use gesture_forest::{
    train, Dataset, DatasetBuilder, DetectionConfig, Detections, EncoderConfig, Error,
    FeatureEncoder, GestureModel, GroupKind, LandmarkGroup, LandmarkSource, Point, Result,
    SidecarSource, SourceImage, TrainConfig,
};

/// Detector stand-in: images under `A/` show a right hand, images under `B/`
/// show a body pose. Coordinates vary slightly per image.
struct ScriptedSource {
    calls: usize,
}

impl LandmarkSource for ScriptedSource {
    fn detect(&mut self, image: &SourceImage) -> Result<Detections> {
        self.calls += 1;
        let jitter = self.calls as f32 * 0.003;
        let label = image
            .path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        match label {
            "A" => Detections::new().with(
                GroupKind::RightHand,
                LandmarkGroup::new(
                    (0..21)
                        .map(|i| Point::new(0.5 + i as f32 * (0.01 + jitter), 0.4 + (i % 4) as f32 * 0.03))
                        .collect(),
                ),
            ),
            "B" => Detections::new().with(
                GroupKind::Pose,
                LandmarkGroup::new(
                    (0..33)
                        .map(|i| Point::new(0.2 + (i % 6) as f32 * 0.07, 0.1 + i as f32 * (0.02 + jitter)))
                        .collect(),
                ),
            ),
            _ => Ok(Detections::new()),
        }
    }
}

fn write_png(path: &Path, shade: u8) {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([shade, shade / 2, 255 - shade]));
    img.save(path).unwrap();
}

fn image_tree(root: &Path) {
    for label in ["A", "B"] {
        let dir = root.join(label);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..5u8 {
            write_png(&dir.join(format!("img_{i}.png")), i * 40);
        }
    }
}

#[test]
fn two_label_scenario() {
    let root = tempfile::tempdir().unwrap();
    image_tree(root.path());
    // Noise the builder has to cope with.
    fs::write(root.path().join("README.txt"), "not a label").unwrap();
    fs::write(root.path().join("A").join("broken.png"), b"not a png").unwrap();
    fs::write(root.path().join("B").join("notes.txt"), "ignored").unwrap();

    let encoder = FeatureEncoder::new(EncoderConfig::default()).unwrap();
    let config = encoder.config().clone();
    let mut source = ScriptedSource { calls: 0 };
    let (dataset, report) = DatasetBuilder::new(encoder)
        .build(root.path(), &mut source)
        .unwrap();

    assert_eq!(dataset.num_samples(), 10);
    assert_eq!(dataset.feature_len(), config.feature_len());
    assert_eq!(source.calls, 10);
    assert_eq!(report.images, 10);
    assert_eq!(report.unreadable, 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.per_label["A"], 5);
    assert_eq!(report.per_label["B"], 5);

    for (row, label) in dataset.features().rows().into_iter().zip(dataset.labels()) {
        let row = row.to_vec();
        let zero = |kind| row[config.segment(kind)].iter().all(|&x| x == 0.0);
        assert!(zero(GroupKind::LeftHand));
        assert!(zero(GroupKind::Face));
        match label.as_str() {
            "A" => {
                assert!(!zero(GroupKind::RightHand));
                assert!(zero(GroupKind::Pose));
            }
            "B" => {
                assert!(zero(GroupKind::RightHand));
                assert!(!zero(GroupKind::Pose));
            }
            other => panic!("unexpected label {other}"),
        }
    }

    // Persist, reload, train.
    let data_path = root.path().join("data.bin");
    dataset.save(&data_path).unwrap();
    let reloaded = Dataset::load(&data_path).unwrap();
    assert_eq!(reloaded, dataset);
    assert_eq!(reloaded.encoder(), &config);

    let outcome = train(&reloaded, &TrainConfig::default()).unwrap();
    assert!((0.0..=1.0).contains(&outcome.accuracy));
    assert!(outcome
        .summary()
        .ends_with("% of samples were classified correctly!"));
    assert_eq!(outcome.test_rows, 2);

    let model_path = root.path().join("model.bin");
    outcome.model.save(&model_path).unwrap();
    let model = GestureModel::load(&model_path).unwrap();
    assert_eq!(model.encoder_config(), &config);
    assert_eq!(model.labels(), &["A", "B"]);
}

#[test]
fn class_with_one_image_cannot_be_split() {
    let root = tempfile::tempdir().unwrap();
    image_tree(root.path());
    fs::remove_dir_all(root.path().join("B")).unwrap();
    fs::create_dir_all(root.path().join("B")).unwrap();
    write_png(&root.path().join("B").join("only.png"), 10);

    let encoder = FeatureEncoder::new(EncoderConfig::default()).unwrap();
    let (dataset, _) = DatasetBuilder::new(encoder)
        .build(root.path(), &mut ScriptedSource { calls: 0 })
        .unwrap();

    match train(&dataset, &TrainConfig::default()) {
        Err(Error::InsufficientSamples { label, count }) => {
            assert_eq!(label, "B");
            assert_eq!(count, 1);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("training should fail"),
    }
}

fn sidecar_json(kind: &str, n: usize, score: f32, offset: f32) -> String {
    let points: Vec<String> = (0..n)
        .map(|i| format!("[{}, {}, 0.0]", offset + i as f32 * 0.01, 0.3 + (i % 3) as f32 * 0.05))
        .collect();
    format!(
        r#"{{ "{kind}": {{ "score": {score}, "points": [{}] }} }}"#,
        points.join(",")
    )
}

#[test]
fn sidecar_source_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    image_tree(root.path());
    for i in 0..5u8 {
        let a = root.path().join("A").join(format!("img_{i}.png"));
        fs::write(
            SidecarSource::sidecar_path(&a),
            sidecar_json("left_hand", 21, 0.9, 0.1 + i as f32 * 0.01),
        )
        .unwrap();
        // Low score: treated as not detected.
        let b = root.path().join("B").join(format!("img_{i}.png"));
        fs::write(
            SidecarSource::sidecar_path(&b),
            sidecar_json("pose", 33, 0.2, 0.5),
        )
        .unwrap();
    }

    let encoder = FeatureEncoder::new(EncoderConfig::default()).unwrap();
    let mut source = SidecarSource::new(DetectionConfig::default()).unwrap();
    let (dataset, report) = DatasetBuilder::new(encoder)
        .build(root.path(), &mut source)
        .unwrap();

    // Sidecars are not images and are not counted as failures.
    assert_eq!(report.images, 10);
    assert_eq!(report.ignored, 10);
    assert_eq!(report.unreadable, 0);

    let b_rows: Vec<usize> = (0..10).filter(|&i| dataset.labels()[i] == "B").collect();
    for i in b_rows {
        assert!(dataset.features().row(i).iter().all(|&x| x == 0.0));
    }

    let outcome = train(&dataset, &TrainConfig::default()).unwrap();
    let image = SourceImage::open(root.path().join("A").join("img_0.png")).unwrap();
    let detections = source.detect(&image).unwrap();
    assert_eq!(outcome.model.classify(&detections).unwrap(), "A");
}

#[test]
fn missing_sidecar_aborts_build() {
    let root = tempfile::tempdir().unwrap();
    image_tree(root.path());

    let encoder = FeatureEncoder::new(EncoderConfig::default()).unwrap();
    let mut source = SidecarSource::new(DetectionConfig::default()).unwrap();
    let err = DatasetBuilder::new(encoder)
        .build(root.path(), &mut source)
        .unwrap_err();
    assert!(matches!(err, Error::MissingDetections(_)));
}

#[test]
fn missing_root_is_an_io_error() {
    let root = tempfile::tempdir().unwrap();
    let encoder = FeatureEncoder::new(EncoderConfig::default()).unwrap();
    let err = DatasetBuilder::new(encoder)
        .build(root.path().join("nope"), &mut ScriptedSource { calls: 0 })
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
