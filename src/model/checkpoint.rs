use anyhow::{Context, Result};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::model::architecture::{build, StateClassifier};
use crate::model::ModelConfig;

/// Recorder used for the model artifact
pub type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Artifact metadata stored next to the model weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that produced the artifact
    pub version: String,
    /// Model configuration
    pub model_config: ModelConfig,
    /// Class names in output order
    pub classes: Vec<String>,
    /// Length of the gene list the model was trained on
    pub num_genes: usize,
    /// Training configuration
    pub training: TrainingMetadata,
    /// Seconds since the Unix epoch
    pub created_at: u64,
}

/// Training summary carried in the metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Learning rate
    pub learning_rate: f64,
    /// Batch size
    pub batch_size: usize,
    /// Number of epochs
    pub epochs: usize,
    /// Held-out fraction
    pub validation_split: f64,
    /// Optimizer type
    pub optimizer: String,
    /// Final training accuracy
    pub final_accuracy: f64,
    /// Final validation accuracy, when a validation split was used
    pub final_val_accuracy: Option<f64>,
}

impl ModelMetadata {
    /// Metadata stamped with the current time
    pub fn new(
        model_config: ModelConfig,
        classes: Vec<String>,
        num_genes: usize,
        training: TrainingMetadata,
    ) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            version: crate::VERSION.to_string(),
            model_config,
            classes,
            num_genes,
            training,
            created_at,
        }
    }
}

/// Saves and loads the full model artifact
pub struct ModelSaver;

impl ModelSaver {
    /// Save model weights (`.mpk`) and metadata (`.json`) at `path`
    pub fn save<B: Backend, P: AsRef<Path>>(
        model: &StateClassifier<B>,
        path: P,
        metadata: &ModelMetadata,
    ) -> Result<PathBuf> {
        let path = artifact_path(path.as_ref());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        model
            .clone()
            .save_file(path.clone(), &ModelRecorder::new())
            .context("Failed to save model")?;

        let metadata_path = path.with_extension("json");
        let metadata_json =
            serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
        fs::write(&metadata_path, metadata_json).context("Failed to write metadata file")?;

        info!("Saved model: {:?}", path);
        Ok(path)
    }

    /// Read only the metadata sidecar
    pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<ModelMetadata> {
        let metadata_path = artifact_path(path.as_ref()).with_extension("json");
        let metadata_json = fs::read_to_string(&metadata_path)
            .with_context(|| format!("Failed to read metadata file {:?}", metadata_path))?;
        serde_json::from_str(&metadata_json).context("Failed to parse metadata")
    }

    /// Load model and metadata saved by [`ModelSaver::save`]
    pub fn load<B: Backend, P: AsRef<Path>>(
        path: P,
        device: &B::Device,
    ) -> Result<(StateClassifier<B>, ModelMetadata)> {
        let path = artifact_path(path.as_ref());
        info!("Loading model from {:?}", path);

        let metadata = Self::load_metadata(&path)?;

        let model = build::<B>(&metadata.model_config, device)
            .load_file(path.clone(), &ModelRecorder::new(), device)
            .with_context(|| format!("Failed to load model {:?}", path))?;

        info!(
            "Loaded model: {} genes, classes {:?}",
            metadata.num_genes, metadata.classes
        );
        Ok((model, metadata))
    }
}

/// `path` with `.mpk` appended unless it already ends in `.mpk`
fn artifact_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "mpk") {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".mpk");
    PathBuf::from(name)
}
