use crate::data::Species;
use crate::pipeline::PipelineConfig;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SuperFeat: two-state single-cell classifier
#[derive(Parser, Debug)]
#[command(name = "superfeat")]
#[command(about = "Train and apply the SuperFeat cell-state classifier")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a new model
    Train(TrainArgs),

    /// Score an expression matrix with a trained model
    Predict(PredictArgs),
}

/// Training arguments; each flag overrides the config file
#[derive(Parser, Debug, Default)]
pub struct TrainArgs {
    /// JSON pipeline configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Species of the default gene list (human, mouse)
    #[arg(short, long)]
    pub species: Option<String>,

    /// Gene list file, overriding the species default
    #[arg(short, long)]
    pub genes: Option<PathBuf>,

    /// Expression matrix (genes x samples)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Sample metadata with a group column
    #[arg(short, long)]
    pub info: Option<PathBuf>,

    /// Metadata column holding the class label
    #[arg(long)]
    pub label_column: Option<String>,

    /// Output directory for weights and the model artifact
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Output directory for reports
    #[arg(long)]
    pub reports_dir: Option<PathBuf>,

    /// Number of training epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Fraction of samples held out for validation
    #[arg(long)]
    pub validation_split: Option<f64>,

    /// L1 coefficient on the hidden weights
    #[arg(long)]
    pub l1: Option<f64>,

    /// Learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pin the model input width
    #[arg(long)]
    pub input_size: Option<usize>,

    /// Skip SVG plots
    #[arg(long)]
    pub no_plots: bool,

    /// Show a progress bar over epochs
    #[arg(long)]
    pub progress: bool,
}

impl TrainArgs {
    /// Load the config file (or defaults) and apply the flags on top
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(species) = &self.species {
            config.species =
                Species::parse(species).ok_or_else(|| anyhow!("Unknown species: {}", species))?;
        }
        if let Some(genes) = &self.genes {
            config.genes = Some(genes.clone());
        }
        if let Some(data) = &self.data {
            config.data = data.clone();
        }
        if let Some(info) = &self.info {
            config.info = info.clone();
        }
        if let Some(column) = &self.label_column {
            config.label_column = column.clone();
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(dir) = &self.reports_dir {
            config.reports_dir = dir.clone();
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(split) = self.validation_split {
            config.training.validation_split = split;
        }
        if let Some(l1) = self.l1 {
            config.model.l1_penalty = l1;
        }
        if let Some(lr) = self.learning_rate {
            config.training.learning_rate = lr;
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
        if let Some(input_size) = self.input_size {
            config.model.input_size = Some(input_size);
        }
        if self.no_plots {
            config.plots = false;
        }
        if self.progress {
            config.progress_bar = true;
        }

        Ok(config)
    }
}

/// Prediction arguments
#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// Expression matrix to score (genes x samples)
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Model artifact (model.mpk)
    #[arg(short, long, default_value = "models/model.mpk")]
    pub model: PathBuf,

    /// Output file for predictions
    #[arg(short, long, default_value = "predictions.csv")]
    pub output: PathBuf,

    /// Output format (csv, json)
    #[arg(short, long, default_value = "csv")]
    pub format: String,

    /// Batch size for prediction
    #[arg(short, long, default_value = "128")]
    pub batch_size: usize,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["superfeat", "train", "--epochs", "10", "--species", "mouse"]);

        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.epochs, Some(10));
                let config = args.to_config().unwrap();
                assert_eq!(config.training.epochs, 10);
                assert_eq!(config.species, Species::Mouse);
                assert_eq!(config.training.batch_size, 128);
                assert!(config.plots);
            }
            _ => panic!("Expected Train command"),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"training": {"epochs": 50, "seed": 7}, "plots": true}"#).unwrap();

        let cli = Cli::parse_from([
            "superfeat",
            "train",
            "--config",
            path.to_str().unwrap(),
            "--epochs",
            "12",
            "--l1",
            "0.05",
            "--no-plots",
            "--label-column",
            "state",
        ]);
        let Commands::Train(args) = cli.command else {
            panic!("Expected Train command");
        };

        let config = args.to_config().unwrap();
        assert_eq!(config.training.epochs, 12);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.model.l1_penalty, 0.05);
        assert_eq!(config.label_column, "state");
        assert!(!config.plots);
    }

    #[test]
    fn test_unknown_species() {
        let args = TrainArgs {
            species: Some("zebrafish".to_string()),
            ..Default::default()
        };
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_predict_args() {
        let cli = Cli::parse_from([
            "superfeat",
            "predict",
            "-i",
            "input.csv",
            "-m",
            "model.mpk",
            "-o",
            "output.json",
            "-f",
            "json",
        ]);

        match cli.command {
            Commands::Predict(args) => {
                assert_eq!(args.input, PathBuf::from("input.csv"));
                assert_eq!(args.model, PathBuf::from("model.mpk"));
                assert_eq!(args.output, PathBuf::from("output.json"));
                assert_eq!(args.format, "json");
                assert_eq!(args.batch_size, 128);
            }
            _ => panic!("Expected Predict command"),
        }
    }
}
