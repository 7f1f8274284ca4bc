//! Command line front end for dataset extraction and training.
//!
//! Usage:
//!   gesture-forest extract ./data -o data.bin     # Encode a labeled image tree
//!   gesture-forest train --dataset data.bin       # Fit and evaluate a model
//!   gesture-forest run ./data                     # Both, in one go
//!   gesture-forest classify photo.png             # Predict one image

use clap::{Parser, Subcommand};
use gesture_forest::{
    train, Dataset, DatasetBuilder, FeatureEncoder, GestureModel, LandmarkSource,
    PipelineConfig, SidecarSource, SourceImage,
};
use log::LevelFilter;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "gesture-forest")]
#[command(author, version, about = "Landmark feature extraction and gesture classifier training", long_about = None)]
struct Args {
    /// Pipeline configuration (JSON). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode every image under DATA_DIR/<label>/ and save the dataset
    Extract {
        /// Directory with one subdirectory per label
        data_dir: PathBuf,

        /// Dataset output file
        #[arg(short, long, default_value = "data.bin")]
        output: PathBuf,
    },

    /// Train a classifier on a saved dataset and report its accuracy
    Train {
        /// Dataset file written by `extract`
        #[arg(long, default_value = "data.bin")]
        dataset: PathBuf,

        /// Model output file
        #[arg(short, long, default_value = "model.bin")]
        output: PathBuf,
    },

    /// Extract, save, reload and train
    Run {
        /// Directory with one subdirectory per label
        data_dir: PathBuf,

        /// Dataset output file
        #[arg(long, default_value = "data.bin")]
        dataset: PathBuf,

        /// Model output file
        #[arg(short, long, default_value = "model.bin")]
        output: PathBuf,
    },

    /// Predict the label of a single image
    Classify {
        /// Input image file (with its detector sidecar next to it)
        image: PathBuf,

        /// Model file written by `train`
        #[arg(short, long, default_value = "model.bin")]
        model: PathBuf,
    },
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter(Some("gesture_forest"), level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            log::debug!("loading configuration from {:?}", path);
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };

    match &args.command {
        Command::Extract { data_dir, output } => extract(&config, data_dir, output),
        Command::Train { dataset, output } => fit(&config, dataset, output),
        Command::Run {
            data_dir,
            dataset,
            output,
        } => {
            extract(&config, data_dir, dataset)?;
            fit(&config, dataset, output)
        }
        Command::Classify { image, model } => classify(&config, image, model),
    }
}

fn extract(
    config: &PipelineConfig,
    data_dir: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let encoder = FeatureEncoder::new(config.encoder.clone())?;
    let mut source = SidecarSource::new(config.detection.clone())?;

    log::info!("extracting features from {:?}...", data_dir);
    let (dataset, report) = DatasetBuilder::new(encoder).build(data_dir, &mut source)?;
    if report.unreadable > 0 {
        log::warn!("{} file(s) could not be read as images", report.unreadable);
    }

    dataset.save(output)?;
    log::info!(
        "saved {} samples x {} features to {:?}",
        dataset.num_samples(),
        dataset.feature_len(),
        output
    );
    Ok(())
}

fn fit(
    config: &PipelineConfig,
    dataset_path: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::load(dataset_path)?;
    log::info!(
        "loaded {} samples from {:?}",
        dataset.num_samples(),
        dataset_path
    );

    if dataset.encoder() != &config.encoder {
        log::warn!(
            "{:?} was extracted with different encoder settings; the model keeps the dataset's",
            dataset_path
        );
    }

    let outcome = train(&dataset, &config.training)?;
    println!("{}", outcome.summary());

    outcome.model.save(output)?;
    log::info!("model written to {:?}", output);
    Ok(())
}

fn classify(
    config: &PipelineConfig,
    image: &Path,
    model_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    // Encoding settings come from the model, not from `config`.
    let model = GestureModel::load(model_path)?;
    log::debug!("model labels: {:?}", model.labels());

    let mut source = SidecarSource::new(config.detection.clone())?;
    let detections = source.detect(&SourceImage::open(image)?)?;
    let label = model.classify(&detections)?;
    println!("{}", label);
    Ok(())
}
