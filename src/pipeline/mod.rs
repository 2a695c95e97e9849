//! End-to-end training run: load, prepare, fit, report, persist.

use crate::data::loader::{assemble_dataset, DataLoader, LoaderConfig};
use crate::data::preprocessing::{LabelEncoder, Preprocessor};
use crate::data::{Species, DEFAULT_CLASSES, GROUP_COLUMN};
use crate::model::checkpoint::{ModelMetadata, ModelSaver, TrainingMetadata};
use crate::model::weights::WeightTable;
use crate::model::ModelConfig;
use crate::report::TrainingReport;
use crate::training::callbacks::{
    HistoryWriterCallback, ProgressBarCallback, ProgressLoggerCallback, TimerCallback,
};
use crate::training::trainer::Trainer;
use crate::training::{TrainingConfig, TrainingHistory};
use crate::utils::{ensure_dir, format_duration, validation};
use crate::TrainingBackend;
use anyhow::{bail, Context, Result};
use burn::module::AutodiffModule;
use burn_ndarray::NdArrayDevice;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Model shape settings exposed in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Pinned input width; the gene-list length when unset
    pub input_size: Option<usize>,
    /// Hidden units
    pub hidden_size: usize,
    /// L1 coefficient on the hidden weights
    pub l1_penalty: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            input_size: None,
            hidden_size: 1,
            l1_penalty: 0.01,
        }
    }
}

/// Everything a training run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Selects the default gene list
    pub species: Species,
    /// Explicit gene list path, overriding the species default
    pub genes: Option<PathBuf>,
    /// Expression matrix (genes x samples)
    pub data: PathBuf,
    /// Sample metadata with the group column
    pub info: PathBuf,
    /// Metadata column holding the class label
    pub label_column: String,
    /// Output directory for weights and the model artifact
    pub models_dir: PathBuf,
    /// Output directory for diagnostics
    pub reports_dir: PathBuf,
    /// Class names in encoding order
    pub classes: Vec<String>,
    pub training: TrainingConfig,
    pub model: ModelSettings,
    /// Render SVG plots
    pub plots: bool,
    /// Show a progress bar instead of per-epoch log lines
    pub progress_bar: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            species: Species::default(),
            genes: None,
            data: PathBuf::from("data/train_data.csv"),
            info: PathBuf::from("data/train_info.csv"),
            label_column: GROUP_COLUMN.to_string(),
            models_dir: PathBuf::from("models"),
            reports_dir: PathBuf::from("reports"),
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            training: TrainingConfig::default(),
            model: ModelSettings::default(),
            plots: true,
            progress_bar: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse config {:?}", path))
    }

    /// Gene list to load
    pub fn gene_list_path(&self) -> PathBuf {
        self.genes
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.species.gene_list_file()))
    }

    /// Model configuration for a gene list of `num_genes`
    pub fn model_config(&self, num_genes: usize) -> ModelConfig {
        ModelConfig::new(self.model.input_size.unwrap_or(num_genes))
            .with_hidden_size(self.model.hidden_size)
            .with_num_classes(self.classes.len())
            .with_l1_penalty(self.model.l1_penalty)
    }

    pub fn validate(&self) -> Result<()> {
        validation::positive(self.training.epochs, "epochs")?;
        validation::positive(self.training.batch_size, "batch_size")?;
        validation::positive(self.training.learning_rate, "learning_rate")?;
        validation::positive(self.model.hidden_size, "hidden_size")?;
        validation::in_range(self.training.validation_split, 0.0, 0.99, "validation_split")?;
        if self.model.l1_penalty < 0.0 {
            bail!("l1_penalty must not be negative, got {}", self.model.l1_penalty);
        }
        if self.classes.len() < 2 {
            bail!("At least two classes are required, got {:?}", self.classes);
        }
        Ok(())
    }
}

/// Files and metrics produced by a run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub weights_path: PathBuf,
    pub bias_path: PathBuf,
    pub model_path: PathBuf,
    pub report_files: Vec<PathBuf>,
    pub history: TrainingHistory,
    pub train_accuracy: f64,
}

/// Run the full training pipeline
pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate().context("Invalid configuration")?;
    ensure_dir(&config.models_dir)?;
    ensure_dir(&config.reports_dir)?;

    let loader = DataLoader::with_config(LoaderConfig {
        label_column: config.label_column.clone(),
        ..LoaderConfig::default()
    });
    let genes = loader.load_gene_list(config.gene_list_path())?;

    let matrix = loader.load_matrix(&config.data)?;
    let mismatches = matrix.count_gene_mismatches(&genes);
    if mismatches > 0 {
        warn!(
            "Expression matrix rows differ from the gene list at {} positions; weights follow matrix row order",
            mismatches
        );
    }
    let metadata = loader.load_metadata(&config.info)?;
    let dataset = assemble_dataset(&matrix, metadata)?;
    drop(matrix);

    let prepared = Preprocessor::new()
        .with_seed(config.training.seed)
        .with_encoder(LabelEncoder::new(config.classes.clone()))
        .prepare(dataset)
        .context("Failed to prepare training data")?;

    let model_config = config.model_config(genes.len());
    let device = NdArrayDevice::default();
    let mut trainer = Trainer::<TrainingBackend>::new(
        config.training.clone(),
        model_config.clone(),
        device.clone(),
    )
    .with_callback(TimerCallback::new())
    .with_callback(HistoryWriterCallback::new(config.reports_dir.join("history.json")));
    trainer = if config.progress_bar {
        trainer.with_callback(ProgressBarCallback::new())
    } else {
        trainer.with_callback(ProgressLoggerCallback::new(1))
    };

    let model = trainer.init_model(genes.len(), prepared.num_classes())?;
    let result = trainer.fit(model, &prepared).context("Training failed")?;
    info!(
        "Trained on {} samples ({} held out) in {}",
        result.train_samples,
        result.val_samples,
        format_duration(result.duration_secs)
    );

    let trained = result.model.valid();

    let report = TrainingReport::from_training(
        &trained,
        &result.history,
        &prepared,
        config.training.batch_size,
        &device,
    )?;
    report.log_summary();
    let report_files = report.write(&config.reports_dir, config.plots)?;

    let table = WeightTable::from_model(&trained, &genes)?;
    for (gene, weight) in table.top_genes(10) {
        info!("  {:>12}: {:+.4}", gene, weight);
    }
    info!(
        "{} of {} gene weights are near zero",
        table.count_near_zero(1e-3),
        genes.len()
    );
    let (weights_path, bias_path) = table.write(&config.models_dir)?;

    let last = result.history.last();
    let metadata = ModelMetadata::new(
        model_config,
        prepared.classes.clone(),
        genes.len(),
        TrainingMetadata {
            learning_rate: config.training.learning_rate,
            batch_size: config.training.batch_size,
            epochs: config.training.epochs,
            validation_split: config.training.validation_split,
            optimizer: "Adam".to_string(),
            final_accuracy: last.map(|r| r.accuracy).unwrap_or(0.0),
            final_val_accuracy: last.and_then(|r| r.val_accuracy),
        },
    );
    let model_path = ModelSaver::save(&trained, config.models_dir.join("model"), &metadata)?;

    Ok(PipelineOutcome {
        weights_path,
        bias_path,
        model_path,
        report_files,
        history: result.history,
        train_accuracy: report.train_accuracy,
    })
}
