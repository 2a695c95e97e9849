pub mod callbacks;
pub mod trainer;

use serde::{Deserialize, Serialize};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Fraction of samples held out (taken from the end) for validation
    pub validation_split: f64,
    /// Reshuffle training rows every epoch
    pub shuffle: bool,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam epsilon
    pub epsilon: f32,
    /// Apply balanced class weights to the training loss
    pub use_class_weights: bool,
    /// Random seed for the sample shuffle, initialization and batch order
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 128,
            validation_split: 0.3,
            shuffle: true,
            learning_rate: 0.001,
            epsilon: 1e-7,
            use_class_weights: true,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Create configuration for quick testing
    pub fn quick_test() -> Self {
        Self {
            epochs: 5,
            batch_size: 16,
            learning_rate: 0.01,
            ..Default::default()
        }
    }
}

/// Metrics recorded at the end of an epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    /// Mean training loss (weighted loss plus L1 penalty)
    pub loss: f64,
    /// Training accuracy
    pub accuracy: f64,
    /// Validation loss
    pub val_loss: Option<f64>,
    /// Validation accuracy
    pub val_accuracy: Option<f64>,
}

/// Per-epoch training history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self { epochs: Vec::new() }
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    pub fn loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.loss).collect()
    }

    pub fn accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.accuracy).collect()
    }

    pub fn val_loss(&self) -> Vec<f64> {
        self.epochs.iter().filter_map(|e| e.val_loss).collect()
    }

    pub fn val_accuracy(&self) -> Vec<f64> {
        self.epochs.iter().filter_map(|e| e.val_accuracy).collect()
    }

    /// Render as CSV with a header row
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("epoch,loss,accuracy,val_loss,val_accuracy\n");
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.6}", x)).unwrap_or_default();

        for record in &self.epochs {
            csv.push_str(&format!(
                "{},{:.6},{:.6},{},{}\n",
                record.epoch,
                record.loss,
                record.accuracy,
                fmt(record.val_loss),
                fmt(record.val_accuracy)
            ));
        }
        csv
    }
}

/// Training result
#[derive(Debug)]
pub struct TrainingResult<M> {
    /// Trained model
    pub model: M,
    /// Per-epoch metrics
    pub history: TrainingHistory,
    /// Number of training rows
    pub train_samples: usize,
    /// Number of validation rows
    pub val_samples: usize,
    /// Training duration in seconds
    pub duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 30);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.validation_split, 0.3);
        assert!(config.shuffle);
    }

    #[test]
    fn test_partial_config_json() {
        let config: TrainingConfig = serde_json::from_str(r#"{"epochs": 50}"#).unwrap();
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 128);
    }

    #[test]
    fn test_history_csv() {
        let mut history = TrainingHistory::new();
        history.push(EpochRecord {
            epoch: 1,
            loss: 0.5,
            accuracy: 0.75,
            val_loss: Some(0.6),
            val_accuracy: Some(0.7),
        });
        history.push(EpochRecord {
            epoch: 2,
            loss: 0.4,
            accuracy: 0.8,
            val_loss: None,
            val_accuracy: None,
        });

        let csv = history.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "epoch,loss,accuracy,val_loss,val_accuracy");
        assert_eq!(lines[1], "1,0.500000,0.750000,0.600000,0.700000");
        assert_eq!(lines[2], "2,0.400000,0.800000,,");

        assert_eq!(history.loss(), vec![0.5, 0.4]);
        assert_eq!(history.val_loss(), vec![0.6]);
    }
}
