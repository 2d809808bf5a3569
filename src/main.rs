use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use eo_toolbox::{checkpoint, logging, ExperimentConfig};

/// Run remote-sensing classification experiments described by JSON documents.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an experiment document and run its task.
    Run {
        /// Experiment document (JSON).
        config: PathBuf,
    },
    /// Check an experiment document and resolve its class names without running it.
    Validate {
        /// Experiment document (JSON).
        config: PathBuf,
    },
    /// Classify one image with a trained image model.
    PredictImage {
        /// Checkpoint (.tar.gz).
        checkpoint: PathBuf,
        /// Image file.
        image: PathBuf,
    },
    /// Print the metadata stored in a checkpoint archive.
    Inspect {
        /// Checkpoint (.tar.gz).
        checkpoint: PathBuf,
    },
}

fn load(path: &Path) -> anyhow::Result<ExperimentConfig> {
    ExperimentConfig::load(path)
        .with_context(|| format!("reading experiment document {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    match args.command {
        Command::Run { config } => {
            let document = load(&config)?;
            let outcome = eo_toolbox::run_experiment(&document)
                .with_context(|| format!("running {}", config.display()))?;
            println!("{outcome}");
        }
        Command::Validate { config } => {
            let document = load(&config)?;
            let task = eo_toolbox::check_experiment(&document)
                .with_context(|| format!("validating {}", config.display()))?;
            println!("{}: ok ({task:?})", config.display());
        }
        Command::PredictImage { checkpoint, image } => {
            let (prediction, labels) = eo_toolbox::tasks::predict_image(&checkpoint, &image)
                .with_context(|| format!("predicting {}", image.display()))?;
            let predicted: Vec<&str> = prediction
                .predicted
                .iter()
                .filter_map(|&i| labels.get(i).map(String::as_str))
                .collect();
            println!("{}: {}", image.display(), predicted.join(";"));
            for (label, p) in labels.iter().zip(&prediction.probabilities) {
                println!("  {label}: {p:.4}");
            }
        }
        Command::Inspect { checkpoint: path } => {
            let metadata = checkpoint::load_metadata(&path)
                .with_context(|| format!("reading checkpoint {}", path.display()))?;
            println!("{metadata}");
        }
    }
    Ok(())
}
