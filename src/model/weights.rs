//! First-layer weight tables for downstream interpretation.
//!
//! `w1.csv` holds one hidden-layer weight per line in gene-list order and
//! `b1.csv` the hidden bias; both are headerless. Rows are paired with genes by
//! position, so the gene count must equal the weight count exactly.

use crate::data::GeneList;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use burn::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::model::architecture::StateClassifier;

/// Hidden-layer weights paired with the genes they belong to
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    genes: Vec<String>,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl WeightTable {
    /// Pair weights with genes, failing if they cannot be aligned row by row
    pub fn new(genes: &GeneList, weights: Vec<f32>, bias: Vec<f32>) -> Result<Self, PipelineError> {
        if genes.len() != weights.len() {
            return Err(PipelineError::WeightAlignment {
                genes: genes.len(),
                weights: weights.len(),
            });
        }
        Ok(Self {
            genes: genes.as_slice().to_vec(),
            weights,
            bias,
        })
    }

    /// Extract the table from a trained model
    pub fn from_model<B: Backend>(model: &StateClassifier<B>, genes: &GeneList) -> Result<Self> {
        let weights = model.hidden_weights()?;
        let bias = model.hidden_bias()?;
        Ok(Self::new(genes, weights, bias)?)
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Genes ordered by absolute weight, largest first
    pub fn top_genes(&self, n: usize) -> Vec<(&str, f32)> {
        let mut ranked: Vec<(&str, f32)> = self
            .genes
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked.truncate(n);
        ranked
    }

    /// Number of weights that are exactly zero or below `tolerance` in magnitude
    pub fn count_near_zero(&self, tolerance: f32) -> usize {
        self.weights.iter().filter(|w| w.abs() <= tolerance).count()
    }

    /// Write `w1.csv` and `b1.csv` into `dir`, returning their paths
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))?;

        let w1_path = dir.join("w1.csv");
        write_column(&w1_path, &self.weights)?;

        let b1_path = dir.join("b1.csv");
        write_column(&b1_path, &self.bias)?;

        info!(
            "Wrote {} gene weights to {:?} and bias to {:?}",
            self.weights.len(),
            w1_path,
            b1_path
        );
        Ok((w1_path, b1_path))
    }
}

fn write_column(path: &Path, values: &[f32]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    for value in values {
        writer
            .write_record([value.to_string()])
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    writer.flush().with_context(|| format!("Failed to flush {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::architecture::build;
    use crate::model::ModelConfig;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn genes(n: usize) -> GeneList {
        GeneList::new((1..=n).map(|i| format!("g{}", i)).collect())
    }

    #[test]
    fn test_alignment_error_writes_nothing() {
        let err = WeightTable::new(&genes(3), vec![0.1, 0.2, 0.3, 0.4], vec![0.0]).unwrap_err();
        assert_eq!(err, PipelineError::WeightAlignment { genes: 3, weights: 4 });
    }

    #[test]
    fn test_from_model_alignment_error() {
        let device = <TestBackend as Backend>::Device::default();
        let model = build::<TestBackend>(&ModelConfig::for_genes(4), &device);

        let err = WeightTable::from_model(&model, &genes(3)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::WeightAlignment { genes: 3, weights: 4 })
        );
    }

    #[test]
    fn test_write_tables() {
        let temp_dir = TempDir::new().unwrap();
        let table = WeightTable::new(&genes(3), vec![0.5, -0.25, 0.0], vec![0.125]).unwrap();

        let (w1, b1) = table.write(temp_dir.path().join("models")).unwrap();

        assert_eq!(fs::read_to_string(w1).unwrap(), "0.5\n-0.25\n0\n");
        assert_eq!(fs::read_to_string(b1).unwrap(), "0.125\n");
    }

    #[test]
    fn test_top_genes() {
        let table = WeightTable::new(&genes(4), vec![0.1, -0.9, 0.0, 0.4], vec![0.0]).unwrap();

        let top = table.top_genes(2);
        assert_eq!(top, vec![("g2", -0.9), ("g4", 0.4)]);
        assert_eq!(table.count_near_zero(1e-6), 1);
    }
}
