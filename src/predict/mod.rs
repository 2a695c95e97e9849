pub mod predictor;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use predictor::Predictor;

/// Prediction for a single sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplePrediction {
    /// Sample ID
    pub sample: String,
    /// Class probabilities in class order
    pub probabilities: Vec<f32>,
    /// Name of the most probable class
    pub predicted: String,
    /// Probability of the predicted class
    pub confidence: f32,
}

impl SamplePrediction {
    /// Build from a probability row; ties resolve to the first class
    pub fn new(sample: String, probabilities: Vec<f32>, classes: &[String]) -> Self {
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        let predicted = classes
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string());

        Self {
            sample,
            probabilities,
            predicted,
            confidence: confidence.max(0.0),
        }
    }
}

/// Predictions for a whole matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Class names in probability order
    pub classes: Vec<String>,
    /// Per-sample predictions, in matrix column order
    pub predictions: Vec<SamplePrediction>,
    /// Summary statistics
    pub summary: PredictionSummary,
}

impl PredictionResult {
    pub fn new(classes: Vec<String>, predictions: Vec<SamplePrediction>) -> Self {
        let summary = PredictionSummary::from_predictions(&predictions, &classes);
        Self {
            classes,
            predictions,
            summary,
        }
    }

    /// Export to CSV format
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("sample,predicted,confidence");
        for class in &self.classes {
            csv.push_str(&format!(",p_{}", class));
        }
        csv.push('\n');

        for pred in &self.predictions {
            csv.push_str(&format!("{},{},{:.6}", pred.sample, pred.predicted, pred.confidence));
            for p in &pred.probabilities {
                csv.push_str(&format!(",{:.6}", p));
            }
            csv.push('\n');
        }
        csv
    }

    /// Write CSV output
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv())
            .with_context(|| format!("Failed to write predictions to {:?}", path))
    }

    /// Write JSON output
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize predictions")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write predictions to {:?}", path))
    }
}

/// Prediction summary statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredictionSummary {
    /// Total number of samples
    pub total_predictions: usize,
    /// Samples per predicted class, in class order
    pub class_counts: Vec<(String, usize)>,
    /// Average confidence
    pub avg_confidence: f64,
}

impl PredictionSummary {
    /// Create summary from predictions
    pub fn from_predictions(predictions: &[SamplePrediction], classes: &[String]) -> Self {
        let total = predictions.len();
        let class_counts = classes
            .iter()
            .map(|class| {
                let count = predictions.iter().filter(|p| &p.predicted == class).count();
                (class.clone(), count)
            })
            .collect();

        let avg_confidence = if total > 0 {
            predictions.iter().map(|p| p.confidence as f64).sum::<f64>() / total as f64
        } else {
            0.0
        };

        Self {
            total_predictions: total,
            class_counts,
            avg_confidence,
        }
    }

    /// Print summary to stdout
    pub fn print(&self) {
        println!("\n=== Prediction Summary ===");
        println!("Total samples: {}", self.total_predictions);
        for (class, count) in &self.class_counts {
            let rate = if self.total_predictions > 0 {
                *count as f64 / self.total_predictions as f64
            } else {
                0.0
            };
            println!("{}: {} ({:.2}%)", class, count, rate * 100.0);
        }
        println!("Average confidence: {:.4}", self.avg_confidence);
        println!("==========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec!["state0".to_string(), "state1".to_string()]
    }

    #[test]
    fn test_sample_prediction() {
        let pred = SamplePrediction::new("cell1".to_string(), vec![0.2, 0.8], &classes());

        assert_eq!(pred.sample, "cell1");
        assert_eq!(pred.predicted, "state1");
        assert_eq!(pred.confidence, 0.8);
    }

    #[test]
    fn test_sample_prediction_tie_picks_first_class() {
        let pred = SamplePrediction::new("cell1".to_string(), vec![0.5, 0.5], &classes());
        assert_eq!(pred.predicted, "state0");
    }

    #[test]
    fn test_prediction_result_summary() {
        let predictions = vec![
            SamplePrediction::new("c1".to_string(), vec![0.9, 0.1], &classes()),
            SamplePrediction::new("c2".to_string(), vec![0.3, 0.7], &classes()),
            SamplePrediction::new("c3".to_string(), vec![0.4, 0.6], &classes()),
        ];

        let result = PredictionResult::new(classes(), predictions);

        assert_eq!(result.summary.total_predictions, 3);
        assert_eq!(
            result.summary.class_counts,
            vec![("state0".to_string(), 1), ("state1".to_string(), 2)]
        );
        assert!((result.summary.avg_confidence - (0.9 + 0.7 + 0.6) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_csv_export() {
        let predictions = vec![SamplePrediction::new(
            "c1".to_string(),
            vec![0.25, 0.75],
            &classes(),
        )];

        let csv = PredictionResult::new(classes(), predictions).to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "sample,predicted,confidence,p_state0,p_state1");
        assert_eq!(lines[1], "c1,state1,0.750000,0.250000,0.750000");
    }

    #[test]
    fn test_json_export() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("predictions.json");
        let predictions = vec![SamplePrediction::new("c1".to_string(), vec![0.6, 0.4], &classes())];

        PredictionResult::new(classes(), predictions).save_json(&path).unwrap();

        let saved: PredictionResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.predictions[0].predicted, "state0");
    }
}
