//! # SuperFeat: two-state cell classifier
//!
//! SuperFeat trains a small neural classifier that separates two cell states
//! (`state0` / `state1`) in single-cell expression data. The single hidden
//! unit is L1-penalized, so its weights form a sparse per-gene signature that
//! is exported alongside the full model.
//!
//! ## Features
//!
//! - Species-specific gated gene lists (human, mouse)
//! - Seeded joint shuffle, strict label encoding, balanced class weights
//! - Adam training with a trailing validation split and per-epoch history
//! - Training curves, output-weight heatmap and confusion matrix reports
//! - Weight tables (`w1.csv`, `b1.csv`) and a reloadable model artifact
//! - Support for CSV, TSV and gzipped inputs
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use superfeat::data::loader::DataLoader;
//! use superfeat::data::preprocessing::Preprocessor;
//! use superfeat::model::ModelConfig;
//! use superfeat::training::{trainer::Trainer, TrainingConfig};
//! use superfeat::TrainingBackend;
//!
//! let loader = DataLoader::new();
//! let genes = loader.load_gene_list("gated_genes.hs.csv").unwrap();
//! let dataset = loader
//!     .load_dataset("data/train_data.csv", "data/train_info.csv")
//!     .unwrap();
//!
//! let prepared = Preprocessor::new().prepare(dataset).unwrap();
//!
//! let model_config = ModelConfig::for_genes(genes.len());
//! let mut trainer =
//!     Trainer::<TrainingBackend>::new(TrainingConfig::default(), model_config, Default::default());
//! let model = trainer.init_model(genes.len(), prepared.num_classes()).unwrap();
//! let result = trainer.fit(model, &prepared).unwrap();
//! println!("final accuracy: {:?}", result.history.last());
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod report;
pub mod training;
pub mod utils;

use burn::backend::Autodiff;
use burn_ndarray::NdArray;

/// Default backend type
pub type DefaultBackend = NdArray<f32>;

/// Backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Re-export commonly used types
pub use data::loader::DataLoader;
pub use data::{GeneList, LabeledDataset, PreparedData, Species};
pub use error::PipelineError;
pub use model::{architecture::StateClassifier, ModelConfig};
pub use pipeline::{PipelineConfig, PipelineOutcome};
pub use predict::{PredictionResult, Predictor, SamplePrediction};
pub use training::{TrainingConfig, TrainingResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - two-state single-cell classifier",
        NAME, VERSION
    )
}
