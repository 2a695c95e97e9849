use crate::data::{LabeledDataset, PreparedData, DEFAULT_CLASSES};
use crate::error::PipelineError;
use crate::utils::random::seeded_rng;
use anyhow::Result;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Strict mapping from class name to class index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Encoder over the given class names; index = position
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// `state0 -> 0`, `state1 -> 1`
    pub fn binary() -> Self {
        Self::new(DEFAULT_CLASSES.iter().map(|s| s.to_string()).collect())
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Encode a label, failing on anything outside the mapping
    pub fn encode(&self, label: &str) -> Result<usize, PipelineError> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| PipelineError::UnknownLabel {
                label: label.to_string(),
                expected: self.classes.clone(),
            })
    }

    pub fn encode_all(&self, labels: &[String]) -> Result<Vec<usize>, PipelineError> {
        labels.iter().map(|l| self.encode(l)).collect()
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

impl Default for LabelEncoder {
    fn default() -> Self {
        Self::binary()
    }
}

/// One-hot rows of width `num_classes`
pub fn one_hot(labels: &[usize], num_classes: usize) -> Result<Vec<Vec<f32>>, PipelineError> {
    labels
        .iter()
        .map(|&label| {
            if label >= num_classes {
                return Err(PipelineError::ClassIndexOutOfRange {
                    index: label,
                    num_classes,
                });
            }
            let mut row = vec![0.0; num_classes];
            row[label] = 1.0;
            Ok(row)
        })
        .collect()
}

/// Index of the largest entry; first one wins on ties
pub fn argmax(row: &[f32]) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Per-class loss weights balancing the class distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights(Vec<f32>);

impl ClassWeights {
    /// `n_samples / (n_classes * count_c)` for every class
    pub fn balanced(labels: &[usize], classes: &[String]) -> Result<Self, PipelineError> {
        let num_classes = classes.len();
        if labels.is_empty() || num_classes == 0 {
            return Err(PipelineError::EmptyInput("no labels to weight".to_string()));
        }

        let mut counts = vec![0usize; num_classes];
        for &label in labels {
            if label >= num_classes {
                return Err(PipelineError::ClassIndexOutOfRange {
                    index: label,
                    num_classes,
                });
            }
            counts[label] += 1;
        }

        if let Some(missing) = counts.iter().position(|&c| c == 0) {
            return Err(PipelineError::MissingClass {
                class: classes[missing].clone(),
            });
        }

        let n = labels.len() as f32;
        let weights = counts
            .iter()
            .map(|&c| n / (num_classes as f32 * c as f32))
            .collect();
        Ok(Self(weights))
    }

    /// Equal weights
    pub fn uniform(num_classes: usize) -> Self {
        Self(vec![1.0; num_classes])
    }

    pub fn get(&self, class: usize) -> Option<f32> {
        self.0.get(class).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reorder features, labels and sample ids with the same seeded permutation
pub fn shuffle_jointly(dataset: LabeledDataset, seed: u64) -> LabeledDataset {
    let mut order: Vec<usize> = (0..dataset.len()).collect();
    let mut rng = seeded_rng(seed);
    order.shuffle(&mut rng);
    debug!("Shuffled {} samples with seed {}", order.len(), seed);

    let LabeledDataset {
        sample_ids,
        features,
        labels,
    } = dataset;

    let mut sample_ids: Vec<Option<String>> = sample_ids.into_iter().map(Some).collect();
    let mut features: Vec<Option<Vec<f32>>> = features.into_iter().map(Some).collect();
    let mut labels: Vec<Option<String>> = labels.into_iter().map(Some).collect();

    LabeledDataset {
        sample_ids: order.iter().filter_map(|&i| sample_ids[i].take()).collect(),
        features: order.iter().filter_map(|&i| features[i].take()).collect(),
        labels: order.iter().filter_map(|&i| labels[i].take()).collect(),
    }
}

/// Index separating training rows from the trailing validation rows
pub fn validation_split_index(n_samples: usize, validation_split: f64) -> Result<usize, PipelineError> {
    if !(0.0..1.0).contains(&validation_split) {
        return Err(PipelineError::InvalidSplit {
            split: validation_split,
            samples: n_samples,
        });
    }
    let split_at = (n_samples as f64 * (1.0 - validation_split)) as usize;
    if split_at == 0 {
        return Err(PipelineError::InvalidSplit {
            split: validation_split,
            samples: n_samples,
        });
    }
    Ok(split_at)
}

/// Turns a labeled dataset into model-ready data
pub struct Preprocessor {
    /// Shuffle seed
    pub seed: u64,
    /// Label encoding
    pub encoder: LabelEncoder,
}

impl Preprocessor {
    /// Create new preprocessor with the binary encoding and seed 0
    pub fn new() -> Self {
        Self {
            seed: 0,
            encoder: LabelEncoder::binary(),
        }
    }

    /// Set shuffle seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set label encoding
    pub fn with_encoder(mut self, encoder: LabelEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Shuffle, encode, one-hot and weight
    pub fn prepare(&self, dataset: LabeledDataset) -> Result<PreparedData> {
        if dataset.is_empty() {
            return Err(PipelineError::EmptyInput("dataset has no samples".to_string()).into());
        }

        let (n_samples, n_genes) = dataset.shape();
        info!("Preparing {} samples x {} genes", n_samples, n_genes);

        let dataset = shuffle_jointly(dataset, self.seed);
        let labels = self.encoder.encode_all(&dataset.labels)?;
        let one_hot = one_hot(&labels, self.encoder.num_classes())?;
        let class_weights = ClassWeights::balanced(&labels, self.encoder.classes())?;

        for (class, weight) in self.encoder.classes().iter().zip(class_weights.as_slice()) {
            info!("Class weight {}: {:.4}", class, weight);
        }

        Ok(PreparedData {
            sample_ids: dataset.sample_ids,
            features: dataset.features,
            labels,
            one_hot,
            class_weights,
            classes: self.encoder.classes().to_vec(),
        })
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
