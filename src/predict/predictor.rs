use crate::data::loader::DataLoader;
use crate::data::ExpressionMatrix;
use crate::error::PipelineError;
use crate::model::architecture::StateClassifier;
use crate::model::checkpoint::{ModelMetadata, ModelSaver};
use crate::predict::{PredictionResult, SamplePrediction};
use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Scores expression matrices with a trained classifier
pub struct Predictor<B: Backend> {
    model: StateClassifier<B>,
    metadata: ModelMetadata,
    device: B::Device,
    batch_size: usize,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: StateClassifier<B>, metadata: ModelMetadata, device: B::Device) -> Self {
        Self {
            model,
            metadata,
            device,
            batch_size: 128,
        }
    }

    /// Load a saved model artifact
    pub fn from_artifact<P: AsRef<Path>>(path: P, device: B::Device) -> Result<Self> {
        let (model, metadata) = ModelSaver::load::<B, _>(path, &device)?;
        Ok(Self::new(model, metadata, device))
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Score sample rows (samples x genes)
    pub fn predict_rows(&self, sample_ids: Vec<String>, rows: &[Vec<f32>]) -> Result<PredictionResult> {
        if sample_ids.len() != rows.len() {
            return Err(PipelineError::SampleCountMismatch {
                matrix: rows.len(),
                metadata: sample_ids.len(),
            }
            .into());
        }

        let probabilities = self.model.predict_rows(rows, self.batch_size, &self.device)?;
        let classes = &self.metadata.classes;

        let predictions = sample_ids
            .into_iter()
            .zip(probabilities)
            .map(|(sample, probs)| SamplePrediction::new(sample, probs, classes))
            .collect();

        Ok(PredictionResult::new(classes.clone(), predictions))
    }

    /// Score a genes x samples matrix
    pub fn predict_matrix(&self, matrix: &ExpressionMatrix) -> Result<PredictionResult> {
        let (n_genes, n_samples) = matrix.shape();
        let input_size = self.model.input_size();
        if n_genes != input_size {
            return Err(PipelineError::dimension(
                "expression matrix genes vs model input width",
                input_size,
                n_genes,
            )
            .into());
        }
        if n_samples == 0 {
            warn!("Expression matrix has no samples");
        }

        info!("Scoring {} samples", n_samples);
        self.predict_rows(matrix.samples.clone(), &matrix.transpose())
    }

    /// Load a matrix file and score it
    pub fn predict_from_file<P: AsRef<Path>>(&self, path: P) -> Result<PredictionResult> {
        let path = path.as_ref();
        let matrix = DataLoader::new()
            .load_matrix(path)
            .with_context(|| format!("Failed to load input {:?}", path))?;
        self.predict_matrix(&matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::architecture::build;
    use crate::model::checkpoint::TrainingMetadata;
    use crate::model::ModelConfig;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn predictor(num_genes: usize) -> Predictor<TestBackend> {
        let device = Default::default();
        let config = ModelConfig::for_genes(num_genes);
        let model = build::<TestBackend>(&config, &device);
        let metadata = ModelMetadata::new(
            config,
            vec!["state0".to_string(), "state1".to_string()],
            num_genes,
            TrainingMetadata {
                learning_rate: 0.001,
                batch_size: 128,
                epochs: 1,
                validation_split: 0.3,
                optimizer: "Adam".to_string(),
                final_accuracy: 0.5,
                final_val_accuracy: None,
            },
        );
        Predictor::new(model, metadata, device)
    }

    fn matrix(n_genes: usize) -> ExpressionMatrix {
        ExpressionMatrix {
            genes: (0..n_genes).map(|g| format!("g{}", g)).collect(),
            samples: vec!["c1".to_string(), "c2".to_string()],
            values: (0..n_genes).map(|g| vec![g as f32, 1.0]).collect(),
        }
    }

    #[test]
    fn test_predict_matrix() {
        let result = predictor(3).predict_matrix(&matrix(3)).unwrap();

        assert_eq!(result.predictions.len(), 2);
        assert_eq!(result.predictions[0].sample, "c1");
        for pred in &result.predictions {
            let sum: f32 = pred.probabilities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(pred.confidence >= 0.5);
        }
    }

    #[test]
    fn test_predict_rejects_gene_count_mismatch() {
        let err = predictor(3).predict_matrix(&matrix(4)).unwrap_err();
        let err = err.downcast::<PipelineError>().unwrap();
        assert_eq!(
            err,
            PipelineError::dimension("expression matrix genes vs model input width", 3, 4)
        );
    }

    #[test]
    fn test_predict_from_saved_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let source = predictor(3);
        let path =
            ModelSaver::save(&source.model, temp_dir.path().join("model"), source.metadata()).unwrap();

        let data_path = temp_dir.path().join("new_cells.csv");
        std::fs::write(&data_path, ",c1,c2\ng0,0.0,1.0\ng1,1.0,1.0\ng2,2.0,1.0\n").unwrap();

        let loaded = Predictor::<TestBackend>::from_artifact(&path, Default::default())
            .unwrap()
            .with_batch_size(1);
        let expected = source.predict_matrix(&matrix(3)).unwrap();
        let actual = loaded.predict_from_file(&data_path).unwrap();

        assert_eq!(actual.predictions.len(), 2);
        for (a, e) in actual.predictions.iter().zip(&expected.predictions) {
            assert_eq!(a.predicted, e.predicted);
            assert!((a.confidence - e.confidence).abs() < 1e-5);
        }
    }
}
