pub mod architecture;
pub mod checkpoint;
pub mod loss;
pub mod weights;

use crate::error::PipelineError;
use burn::prelude::*;

/// Model configuration
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Number of input genes
    pub input_size: usize,

    /// Number of hidden units
    #[config(default = "1")]
    pub hidden_size: usize,

    /// Number of output classes
    #[config(default = "2")]
    pub num_classes: usize,

    /// L1 penalty coefficient on the hidden-layer weights
    #[config(default = "0.01")]
    pub l1_penalty: f64,
}

impl ModelConfig {
    /// Single-unit binary classifier over `num_genes` inputs
    pub fn for_genes(num_genes: usize) -> Self {
        Self::new(num_genes)
    }

    /// Check the configuration against the gene list and label encoding
    pub fn validate(&self, num_genes: usize, num_classes: usize) -> Result<(), PipelineError> {
        if self.input_size != num_genes {
            return Err(PipelineError::dimension(
                "model input width vs gene list length",
                self.input_size,
                num_genes,
            ));
        }
        if self.num_classes != num_classes {
            return Err(PipelineError::dimension(
                "model output width vs class count",
                self.num_classes,
                num_classes,
            ));
        }
        if self.hidden_size == 0 {
            return Err(PipelineError::dimension("hidden layer width", 1, 0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::for_genes(19202);
        assert_eq!(config.input_size, 19202);
        assert_eq!(config.hidden_size, 1);
        assert_eq!(config.num_classes, 2);
        assert_eq!(config.l1_penalty, 0.01);
    }

    #[test]
    fn test_validate() {
        let config = ModelConfig::for_genes(3);
        assert!(config.validate(3, 2).is_ok());

        assert_eq!(
            config.validate(4, 2),
            Err(PipelineError::dimension(
                "model input width vs gene list length",
                3,
                4
            ))
        );
        assert!(matches!(
            config.validate(3, 3),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = ModelConfig::for_genes(10).with_l1_penalty(0.05);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ModelConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.input_size, 10);
        assert_eq!(parsed.l1_penalty, 0.05);
    }
}
