use crate::error::PipelineError;
use crate::model::ModelConfig;
use anyhow::{anyhow, Result};
use burn::module::Param;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};

/// Two-layer cell-state classifier
///
/// `input genes -> hidden (linear + ReLU) -> output (linear, softmax over classes)`.
/// The hidden weights are L1-penalized during training, giving one sparse
/// weight per gene.
#[derive(Module, Debug)]
pub struct StateClassifier<B: Backend> {
    /// Gene-level hidden layer
    hidden: Linear<B>,
    /// Class output layer
    output: Linear<B>,
}

/// Classifier output for a batch
#[derive(Debug, Clone)]
pub struct ClassifierOutput<B: Backend> {
    /// Softmax probabilities [batch_size, num_classes]
    pub probabilities: Tensor<B, 2>,
    /// Argmax class per row
    pub predictions: Tensor<B, 1, Int>,
}

impl<B: Backend> StateClassifier<B> {
    /// Forward pass returning logits [batch_size, num_classes]
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.forward(input);
        let x = relu(x);
        self.output.forward(x)
    }

    /// Predict class probabilities and labels
    pub fn predict(&self, input: Tensor<B, 2>) -> ClassifierOutput<B> {
        let probabilities = softmax(self.forward(input), 1);
        let predictions = probabilities.clone().argmax(1).squeeze(1);

        ClassifierOutput {
            probabilities,
            predictions,
        }
    }

    /// Sum of absolute hidden-layer weights
    pub fn hidden_l1(&self) -> Tensor<B, 1> {
        self.hidden.weight.val().abs().sum()
    }

    /// Hidden-layer weights flattened in input order
    pub fn hidden_weights(&self) -> Result<Vec<f32>> {
        tensor_to_vec(self.hidden.weight.val())
    }

    /// Hidden-layer bias
    pub fn hidden_bias(&self) -> Result<Vec<f32>> {
        match &self.hidden.bias {
            Some(bias) => tensor_to_vec(bias.val()),
            None => Ok(Vec::new()),
        }
    }

    /// Output-layer weight matrix, one row per hidden unit
    pub fn output_weights(&self) -> Result<Vec<Vec<f32>>> {
        let weight = self.output.weight.val();
        let [_, num_classes] = weight.dims();
        let flat = tensor_to_vec(weight)?;
        Ok(flat.chunks(num_classes).map(|row| row.to_vec()).collect())
    }

    /// Class probabilities for each row, computed in batches
    pub fn predict_rows(
        &self,
        rows: &[Vec<f32>],
        batch_size: usize,
        device: &B::Device,
    ) -> Result<Vec<Vec<f32>>> {
        let num_features = self.input_size();
        let num_classes = self.num_classes();
        let mut probabilities = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(batch_size.max(1)) {
            if let Some(row) = chunk.iter().find(|r| r.len() != num_features) {
                return Err(PipelineError::dimension("input row width", num_features, row.len()).into());
            }
            let batch: Vec<&[f32]> = chunk.iter().map(Vec::as_slice).collect();
            let input = rows_to_tensor::<B>(&batch, num_features, device);
            let flat = tensor_to_vec(self.predict(input).probabilities)?;
            probabilities.extend(flat.chunks(num_classes).map(|p| p.to_vec()));
        }

        Ok(probabilities)
    }

    /// Input width
    pub fn input_size(&self) -> usize {
        self.hidden.weight.val().dims()[0]
    }

    /// Output width
    pub fn num_classes(&self) -> usize {
        self.output.weight.val().dims()[1]
    }
}

/// Build the classifier after checking it fits the gene list and class count
pub fn init_model<B: Backend>(
    config: &ModelConfig,
    num_genes: usize,
    num_classes: usize,
    device: &B::Device,
) -> Result<StateClassifier<B>, PipelineError> {
    config.validate(num_genes, num_classes)?;
    Ok(build(config, device))
}

/// Build the classifier from its configuration alone
pub fn build<B: Backend>(config: &ModelConfig, device: &B::Device) -> StateClassifier<B> {
    let hidden = glorot_linear(config.input_size, config.hidden_size, device);
    let output = glorot_linear(config.hidden_size, config.num_classes, device);

    StateClassifier { hidden, output }
}

/// Glorot-uniform weights with a zero bias
fn glorot_linear<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    let mut linear = LinearConfig::new(d_input, d_output)
        .with_bias(true)
        .with_initializer(Initializer::XavierUniform { gain: 1.0 })
        .init(device);
    // The initializer also fills the bias
    linear.bias = Some(Param::from_tensor(Tensor::zeros([d_output], device)));
    linear
}

/// Copy any-rank float tensor into a flat vector
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Failed to read tensor data: {:?}", e))
}

/// Build a [rows, cols] tensor from row vectors
pub fn rows_to_tensor<B: Backend>(rows: &[&[f32]], cols: usize, device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), cols]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_model_forward() {
        let device = <TestBackend as Backend>::Device::default();
        let config = ModelConfig::for_genes(5);
        let model = init_model::<TestBackend>(&config, 5, 2, &device).unwrap();

        let input = Tensor::<TestBackend, 2>::zeros([3, 5], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [3, 2]);
        assert_eq!(model.input_size(), 5);
        assert_eq!(model.num_classes(), 2);
    }

    #[test]
    fn test_model_predict_probabilities() {
        let device = <TestBackend as Backend>::Device::default();
        let model = build::<TestBackend>(&ModelConfig::for_genes(4), &device);

        let input = Tensor::<TestBackend, 2>::ones([2, 4], &device);
        let prediction = model.predict(input);

        assert_eq!(prediction.probabilities.dims(), [2, 2]);
        assert_eq!(prediction.predictions.dims(), [2]);

        let probs = tensor_to_vec(prediction.probabilities).unwrap();
        for row in probs.chunks(2) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_init_rejects_class_count_mismatch() {
        let device = <TestBackend as Backend>::Device::default();
        let config = ModelConfig::for_genes(3).with_num_classes(3);

        let err = init_model::<TestBackend>(&config, 3, 2, &device).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_init_rejects_gene_count_mismatch() {
        let device = <TestBackend as Backend>::Device::default();
        let config = ModelConfig::for_genes(19202);

        let err = init_model::<TestBackend>(&config, 3, 2, &device).unwrap_err();
        assert_eq!(
            err,
            PipelineError::dimension("model input width vs gene list length", 19202, 3)
        );
    }

    #[test]
    fn test_weight_shapes() {
        let device = <TestBackend as Backend>::Device::default();
        let model = build::<TestBackend>(&ModelConfig::for_genes(6), &device);

        assert_eq!(model.hidden_weights().unwrap().len(), 6);
        assert_eq!(model.hidden_bias().unwrap().len(), 1);

        let output = model.output_weights().unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].len(), 2);
    }

    #[test]
    fn test_hidden_l1() {
        let device = <TestBackend as Backend>::Device::default();
        let model = build::<TestBackend>(&ModelConfig::for_genes(8), &device);

        let expected: f32 = model.hidden_weights().unwrap().iter().map(|w| w.abs()).sum();
        let l1 = tensor_to_vec(model.hidden_l1()).unwrap();
        assert!((l1[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_biases_start_at_zero() {
        let device = <TestBackend as Backend>::Device::default();
        let model = build::<TestBackend>(&ModelConfig::for_genes(19202), &device);

        assert_eq!(model.hidden_bias().unwrap(), vec![0.0]);
        let output_bias = tensor_to_vec(model.output.bias.as_ref().unwrap().val()).unwrap();
        assert_eq!(output_bias, vec![0.0, 0.0]);

        assert!(model.hidden_weights().unwrap().iter().any(|w| *w != 0.0));
    }
}
