use crate::data::preprocessing::{validation_split_index, ClassWeights};
use crate::data::PreparedData;
use crate::error::PipelineError;
use crate::model::architecture::{init_model, rows_to_tensor, StateClassifier};
use crate::model::loss::{metrics, WeightedCrossEntropy};
use crate::model::ModelConfig;
use crate::training::callbacks::{CallbackManager, TrainingCallback};
use crate::training::{EpochRecord, TrainingConfig, TrainingHistory, TrainingResult};
use crate::utils::random::seeded_rng;
use anyhow::Result;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::seq::SliceRandom;
use std::time::Instant;
use tracing::{debug, info};

/// Trainer for the cell-state classifier
pub struct Trainer<B: AutodiffBackend> {
    /// Training configuration
    config: TrainingConfig,
    /// Model configuration
    model_config: ModelConfig,
    /// Device
    device: B::Device,
    /// Epoch hooks
    callbacks: CallbackManager,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create new trainer
    pub fn new(config: TrainingConfig, model_config: ModelConfig, device: B::Device) -> Self {
        Self {
            config,
            model_config,
            device,
            callbacks: CallbackManager::new(),
        }
    }

    /// Register an epoch callback
    pub fn with_callback<C: TrainingCallback + 'static>(mut self, callback: C) -> Self {
        self.callbacks.add_callback(callback);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Seed the backend and build a fresh model checked against the data
    pub fn init_model(&self, num_genes: usize, num_classes: usize) -> Result<StateClassifier<B>> {
        B::seed(self.config.seed);
        let model = init_model::<B>(&self.model_config, num_genes, num_classes, &self.device)?;
        info!(
            "Built model: {} inputs -> {} hidden (ReLU, L1 {}) -> {} classes (softmax)",
            self.model_config.input_size,
            self.model_config.hidden_size,
            self.model_config.l1_penalty,
            self.model_config.num_classes
        );
        Ok(model)
    }

    /// Fit `model` on `data`, holding out the trailing validation fraction
    pub fn fit(
        &mut self,
        mut model: StateClassifier<B>,
        data: &PreparedData,
    ) -> Result<TrainingResult<StateClassifier<B>>> {
        if data.is_empty() {
            return Err(PipelineError::EmptyInput("no training samples".to_string()).into());
        }
        if self.config.batch_size == 0 {
            anyhow::bail!("Batch size must be positive");
        }
        if data.num_features() != model.input_size() {
            return Err(PipelineError::dimension(
                "feature width vs model input",
                model.input_size(),
                data.num_features(),
            )
            .into());
        }
        if data.num_classes() != model.num_classes() {
            return Err(PipelineError::dimension(
                "class count vs model output",
                model.num_classes(),
                data.num_classes(),
            )
            .into());
        }

        info!("Starting training with configuration: {:?}", self.config);
        let start_time = Instant::now();

        let split_at = validation_split_index(data.len(), self.config.validation_split)?;
        let mut train_indices: Vec<usize> = (0..split_at).collect();
        let val_indices: Vec<usize> = (split_at..data.len()).collect();
        info!(
            "Train on {} samples, validate on {} samples",
            train_indices.len(),
            val_indices.len()
        );

        let class_weights = if self.config.use_class_weights {
            data.class_weights.clone()
        } else {
            ClassWeights::uniform(data.num_classes())
        };
        let train_loss = WeightedCrossEntropy::<B>::new(class_weights.as_slice(), &self.device);
        let val_loss = WeightedCrossEntropy::<B::InnerBackend>::unweighted(data.num_classes(), &self.device);
        let l1 = self.model_config.l1_penalty;

        let mut optim = AdamConfig::new()
            .with_epsilon(self.config.epsilon)
            .init::<B, StateClassifier<B>>();
        let mut rng = seeded_rng(self.config.seed);
        let mut history = TrainingHistory::new();

        self.callbacks.on_train_begin(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            self.callbacks.on_epoch_begin(epoch);

            if self.config.shuffle {
                train_indices.shuffle(&mut rng);
            }

            let mut loss_sum = 0.0;
            let mut correct = 0.0;

            for (step, batch) in train_indices.chunks(self.config.batch_size).enumerate() {
                let inputs = gather::<B>(&data.features, batch, data.num_features(), &self.device);
                let targets = gather::<B>(&data.one_hot, batch, data.num_classes(), &self.device);

                let logits = model.forward(inputs);
                let batch_accuracy = metrics::accuracy(logits.clone().detach(), targets.clone());
                let loss = train_loss
                    .forward(logits, targets)
                    .add(model.hidden_l1().mul_scalar(l1));

                let loss_value = loss.clone().into_scalar().elem::<f64>();
                debug!("Epoch {} step {} loss {:.6}", epoch, step, loss_value);

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(self.config.learning_rate, model, grads);

                loss_sum += loss_value * batch.len() as f64;
                correct += batch_accuracy * batch.len() as f64;
            }

            let n_train = train_indices.len() as f64;
            let mut record = EpochRecord {
                epoch,
                loss: loss_sum / n_train,
                accuracy: correct / n_train,
                val_loss: None,
                val_accuracy: None,
            };

            if !val_indices.is_empty() {
                let (loss, accuracy) = evaluate(
                    &model.valid(),
                    data,
                    &val_indices,
                    self.config.batch_size,
                    &val_loss,
                    l1,
                    &self.device,
                );
                record.val_loss = Some(loss);
                record.val_accuracy = Some(accuracy);
            }

            history.push(record.clone());
            self.callbacks.on_epoch_end(&record, &history);
        }

        self.callbacks.on_train_end(&history);

        Ok(TrainingResult {
            model,
            history,
            train_samples: train_indices.len(),
            val_samples: val_indices.len(),
            duration_secs: start_time.elapsed().as_secs_f64(),
        })
    }
}

/// Mean loss (plus L1 penalty) and accuracy over `indices`
pub fn evaluate<B: Backend>(
    model: &StateClassifier<B>,
    data: &PreparedData,
    indices: &[usize],
    batch_size: usize,
    loss_fn: &WeightedCrossEntropy<B>,
    l1: f64,
    device: &B::Device,
) -> (f64, f64) {
    if indices.is_empty() {
        return (0.0, 0.0);
    }

    let penalty = model.hidden_l1().mul_scalar(l1).into_scalar().elem::<f64>();
    let mut loss_sum = 0.0;
    let mut correct = 0.0;

    for batch in indices.chunks(batch_size.max(1)) {
        let inputs = gather::<B>(&data.features, batch, data.num_features(), device);
        let targets = gather::<B>(&data.one_hot, batch, data.num_classes(), device);

        let logits = model.forward(inputs);
        correct += metrics::accuracy(logits.clone(), targets.clone()) * batch.len() as f64;
        loss_sum += loss_fn.forward(logits, targets).into_scalar().elem::<f64>() * batch.len() as f64;
    }

    let n = indices.len() as f64;
    (loss_sum / n + penalty, correct / n)
}

fn gather<B: Backend>(rows: &[Vec<f32>], indices: &[usize], width: usize, device: &B::Device) -> Tensor<B, 2> {
    let batch: Vec<&[f32]> = indices.iter().map(|&i| rows[i].as_slice()).collect();
    rows_to_tensor::<B>(&batch, width, device)
}
