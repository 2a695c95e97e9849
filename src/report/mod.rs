pub mod plots;

use crate::data::preprocessing::argmax;
use crate::data::PreparedData;
use crate::model::architecture::StateClassifier;
use crate::model::loss::metrics::ConfusionMatrix;
use crate::training::TrainingHistory;
use anyhow::{Context, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Diagnostics derived from a trained model and its training data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Class names in output order
    pub classes: Vec<String>,
    /// Per-epoch metrics
    pub history: TrainingHistory,
    /// Output-layer weights, one row per hidden unit
    pub output_weights: Vec<Vec<f32>>,
    /// Weight from the first hidden unit to the last class
    pub positive_class_weight: Option<f32>,
    /// Confusion counts over the training data
    pub confusion: ConfusionMatrix,
    /// Row-normalized confusion matrix
    pub confusion_normalized: Vec<Vec<f64>>,
    /// Accuracy over the training data
    pub train_accuracy: f64,
}

impl TrainingReport {
    /// Score every training row and collect the report
    pub fn from_training<B: Backend>(
        model: &StateClassifier<B>,
        history: &TrainingHistory,
        data: &PreparedData,
        batch_size: usize,
        device: &B::Device,
    ) -> Result<Self> {
        let probabilities = model
            .predict_rows(&data.features, batch_size, device)
            .context("Failed to score training data")?;
        let predicted: Vec<usize> = probabilities
            .iter()
            .map(|p| argmax(p).unwrap_or(0))
            .collect();

        let confusion = ConfusionMatrix::from_labels(&data.labels, &predicted, data.num_classes());
        let output_weights = model.output_weights()?;
        let positive_class_weight = output_weights.first().and_then(|row| row.last().copied());

        Ok(Self {
            classes: data.classes.clone(),
            history: history.clone(),
            confusion_normalized: confusion.normalized(),
            train_accuracy: confusion.accuracy(),
            confusion,
            output_weights,
            positive_class_weight,
        })
    }

    /// Whether the hidden unit pushes towards the last class
    pub fn positive_class_weight_is_positive(&self) -> bool {
        self.positive_class_weight.map(|w| w > 0.0).unwrap_or(false)
    }

    /// Log the headline numbers
    pub fn log_summary(&self) {
        info!("Training-set accuracy: {:.4}", self.train_accuracy);
        for (class, row) in self.classes.iter().zip(&self.confusion_normalized) {
            let cells: Vec<String> = row.iter().map(|v| format!("{:.3}", v)).collect();
            info!("  {:>8}: [{}]", class, cells.join(", "));
        }

        let positive_class = self.classes.last().map(String::as_str).unwrap_or("?");
        match self.positive_class_weight {
            Some(w) if w > 0.0 => info!("Output weight for {} is positive ({:.4})", positive_class, w),
            Some(w) => warn!(
                "Output weight for {} is not positive ({:.4}); hidden weights are sign-flipped",
                positive_class, w
            ),
            None => warn!("Model has no output weights"),
        }
    }

    /// Write tables (always) and SVG plots (when enabled) under `dir`
    pub fn write<P: AsRef<Path>>(&self, dir: P, render_plots: bool) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))?;

        let mut written = Vec::new();

        let history_path = dir.join("history.csv");
        fs::write(&history_path, self.history.to_csv())
            .with_context(|| format!("Failed to write {:?}", history_path))?;
        written.push(history_path);

        let weights_path = dir.join("output_weights.csv");
        self.write_output_weights(&weights_path)?;
        written.push(weights_path);

        let confusion_path = dir.join("confusion_train.csv");
        self.write_confusion(&confusion_path)?;
        written.push(confusion_path);

        let json_path = dir.join("report.json");
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        fs::write(&json_path, json).with_context(|| format!("Failed to write {:?}", json_path))?;
        written.push(json_path);

        if render_plots {
            written.extend(self.render_plots(dir));
        }

        info!("Wrote {} report files to {:?}", written.len(), dir);
        Ok(written)
    }

    fn write_output_weights(&self, path: &Path) -> Result<()> {
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;

        let mut header = vec!["hidden_unit".to_string()];
        header.extend(self.classes.iter().cloned());
        writer.write_record(&header)?;

        for (unit, row) in self.output_weights.iter().enumerate() {
            let mut record = vec![unit.to_string()];
            record.extend(row.iter().map(|w| w.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush().with_context(|| format!("Failed to flush {:?}", path))?;
        Ok(())
    }

    fn write_confusion(&self, path: &Path) -> Result<()> {
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;

        let mut header = vec!["true".to_string()];
        header.extend(self.classes.iter().cloned());
        writer.write_record(&header)?;

        for (class, row) in self.classes.iter().zip(&self.confusion_normalized) {
            let mut record = vec![class.clone()];
            record.extend(row.iter().map(|v| format!("{:.6}", v)));
            writer.write_record(&record)?;
        }
        writer.flush().with_context(|| format!("Failed to flush {:?}", path))?;
        Ok(())
    }

    /// Plot failures are logged and skipped
    fn render_plots(&self, dir: &Path) -> Vec<PathBuf> {
        let mut rendered = Vec::new();
        let mut attempt = |name: &str, result: Result<()>, path: PathBuf| match result {
            Ok(()) => rendered.push(path),
            Err(e) => warn!("Failed to render {}: {:#}", name, e),
        };

        let path = dir.join("accuracy.svg");
        let result = plots::plot_curves(
            &self.history.accuracy(),
            &self.history.val_accuracy(),
            "accuracy",
            &path,
        );
        attempt("accuracy curve", result, path);

        let path = dir.join("loss.svg");
        let result = plots::plot_curves(&self.history.loss(), &self.history.val_loss(), "loss", &path);
        attempt("loss curve", result, path);

        let path = dir.join("output_weights.svg");
        let values: Vec<Vec<f64>> = self
            .output_weights
            .iter()
            .map(|row| row.iter().map(|&w| w as f64).collect())
            .collect();
        let units: Vec<String> = (0..values.len()).map(|u| format!("hidden {}", u)).collect();
        let result = plots::plot_heatmap(&values, &units, &self.classes, "Output-layer weights", &path);
        attempt("output weight heatmap", result, path);

        let path = dir.join("confusion_train.svg");
        let result = plots::plot_heatmap(
            &self.confusion_normalized,
            &self.classes,
            &self.classes,
            "Confusion matrix (training data)",
            &path,
        );
        attempt("confusion matrix", result, path);

        rendered
    }
}
