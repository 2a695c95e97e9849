use burn::prelude::*;
use burn::tensor::activation::log_softmax;

/// Categorical cross-entropy with per-class weights
///
/// Each row's loss is scaled by the weight of its true class and the result
/// is averaged over the batch size, so a weighted batch does not rescale the
/// learning rate when the weights are balanced.
#[derive(Clone, Debug)]
pub struct WeightedCrossEntropy<B: Backend> {
    /// Class weights as a column [num_classes, 1]
    weights: Tensor<B, 2>,
}

impl<B: Backend> WeightedCrossEntropy<B> {
    /// Create loss from per-class weights
    pub fn new(class_weights: &[f32], device: &B::Device) -> Self {
        let weights = Tensor::from_data(
            TensorData::new(class_weights.to_vec(), [class_weights.len(), 1]),
            device,
        );
        Self { weights }
    }

    /// Unweighted loss over `num_classes`
    pub fn unweighted(num_classes: usize, device: &B::Device) -> Self {
        Self::new(&vec![1.0; num_classes], device)
    }

    /// Compute mean weighted loss
    ///
    /// # Arguments
    /// * `logits` - Model output logits [batch_size, num_classes]
    /// * `targets` - One-hot targets [batch_size, num_classes]
    pub fn forward(&self, logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let log_probs = log_softmax(logits, 1);
        let per_sample = log_probs.mul(targets.clone()).sum_dim(1).neg();
        let sample_weights = targets.matmul(self.weights.clone());

        per_sample.mul(sample_weights).mean()
    }
}

/// Metrics for evaluation
pub mod metrics {
    use burn::prelude::*;
    use burn::tensor::ElementConversion;

    /// Fraction of rows whose argmax matches the one-hot target
    pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> f64 {
        let [batch_size, _] = logits.dims();
        if batch_size == 0 {
            return 0.0;
        }
        let predictions = logits.argmax(1);
        let truth = targets.argmax(1);
        let correct = predictions
            .equal(truth)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        correct as f64 / batch_size as f64
    }

    /// Confusion counts: `counts[truth][predicted]`
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    pub struct ConfusionMatrix {
        pub counts: Vec<Vec<usize>>,
    }

    impl ConfusionMatrix {
        pub fn from_labels(truth: &[usize], predicted: &[usize], num_classes: usize) -> Self {
            let mut counts = vec![vec![0; num_classes]; num_classes];
            for (&t, &p) in truth.iter().zip(predicted) {
                if t < num_classes && p < num_classes {
                    counts[t][p] += 1;
                }
            }
            Self { counts }
        }

        /// Each row divided by its total; empty rows stay at zero
        pub fn normalized(&self) -> Vec<Vec<f64>> {
            self.counts
                .iter()
                .map(|row| {
                    let total: usize = row.iter().sum();
                    row.iter()
                        .map(|&c| if total > 0 { c as f64 / total as f64 } else { 0.0 })
                        .collect()
                })
                .collect()
        }

        pub fn total(&self) -> usize {
            self.counts.iter().flatten().sum()
        }

        pub fn accuracy(&self) -> f64 {
            let total = self.total();
            if total == 0 {
                return 0.0;
            }
            let correct: usize = (0..self.counts.len()).map(|i| self.counts[i][i]).sum();
            correct as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::metrics::ConfusionMatrix;
    use super::*;
    use crate::model::architecture::tensor_to_vec;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn targets(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0], [2, 2]), device)
    }

    #[test]
    fn test_uniform_loss_matches_cross_entropy() {
        let device = <TestBackend as Backend>::Device::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 2], &device);

        let loss = WeightedCrossEntropy::<TestBackend>::unweighted(2, &device)
            .forward(logits, targets(&device));
        let value = tensor_to_vec(loss).unwrap()[0];

        // Equal logits give -ln(0.5)
        assert!((value - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_class_weights_scale_loss() {
        let device = <TestBackend as Backend>::Device::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 2], &device);

        let loss = WeightedCrossEntropy::<TestBackend>::new(&[1.0, 3.0], &device)
            .forward(logits, targets(&device));
        let value = tensor_to_vec(loss).unwrap()[0];

        // (1 * ln2 + 3 * ln2) / 2
        assert!((value - 2.0 * std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_accuracy() {
        let device = <TestBackend as Backend>::Device::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![2.0f32, 0.0, 3.0, 1.0], [2, 2]),
            &device,
        );

        let acc = metrics::accuracy(logits, targets(&device));
        assert_eq!(acc, 0.5);
    }

    #[test]
    fn test_confusion_matrix() {
        let truth = [0, 0, 0, 1, 1];
        let predicted = [0, 1, 0, 1, 1];
        let cm = ConfusionMatrix::from_labels(&truth, &predicted, 2);

        assert_eq!(cm.counts, vec![vec![2, 1], vec![0, 2]]);
        assert_eq!(cm.total(), 5);
        assert!((cm.accuracy() - 0.8).abs() < 1e-12);

        let normalized = cm.normalized();
        assert!((normalized[0][0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((normalized[0][1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(normalized[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_confusion_matrix_empty_row() {
        let cm = ConfusionMatrix::from_labels(&[0, 0], &[0, 1], 2);
        assert_eq!(cm.normalized()[1], vec![0.0, 0.0]);
    }
}
