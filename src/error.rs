use thiserror::Error;

/// Domain errors raised by the training and inference pipeline.
///
/// These are wrapped in `anyhow::Error` at call sites; tests and callers can
/// recover the variant with `downcast_ref::<PipelineError>()`.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// A label that is not part of the encoding was found in the metadata.
    #[error("Unknown label '{label}', expected one of {expected:?}")]
    UnknownLabel { label: String, expected: Vec<String> },

    /// Integer label outside the encoded class range.
    #[error("Class index {index} out of range for {num_classes} classes")]
    ClassIndexOutOfRange { index: usize, num_classes: usize },

    /// A class of the encoding has no samples, so a balanced weight is undefined.
    #[error("Class '{class}' has no samples in the training data")]
    MissingClass { class: String },

    /// Required column absent from a table.
    #[error("Missing required column '{column}' in {file}")]
    MissingColumn { column: String, file: String },

    /// Metadata rows do not line up with the matrix columns.
    #[error("Sample count mismatch: matrix has {matrix} samples, metadata has {metadata} rows")]
    SampleCountMismatch { matrix: usize, metadata: usize },

    /// Model or input shapes disagree.
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Gene list and hidden-layer weights cannot be paired row by row.
    #[error("Weight alignment error: {genes} genes but {weights} hidden-layer weights")]
    WeightAlignment { genes: usize, weights: usize },

    /// Nothing to work with.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Validation fraction leaves no training rows or is out of range.
    #[error("Invalid validation split {split} for {samples} samples")]
    InvalidSplit { split: f64, samples: usize },
}

impl PipelineError {
    /// Shorthand for a dimension mismatch.
    pub fn dimension(what: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.to_string(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PipelineError::WeightAlignment { genes: 3, weights: 4 };
        assert_eq!(
            err.to_string(),
            "Weight alignment error: 3 genes but 4 hidden-layer weights"
        );

        let err = PipelineError::dimension("model input", 19202, 3);
        assert!(err.to_string().contains("expected 19202, got 3"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = PipelineError::EmptyInput("gene list".to_string()).into();
        let err = err.context("Failed to load genes");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmptyInput(_))
        ));
    }
}
