pub mod loader;
pub mod preprocessing;

use serde::{Deserialize, Serialize};

/// Class names of the two cell states, in encoding order
pub const DEFAULT_CLASSES: &[&str] = &["state0", "state1"];

/// Metadata column carrying the class label
pub const GROUP_COLUMN: &str = "group";

/// Species variant of the gated gene list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    #[default]
    Human,
    Mouse,
}

impl Species {
    /// Reference gene-list file name for this species
    pub fn gene_list_file(&self) -> &'static str {
        match self {
            Species::Human => "gated_genes.hs.csv",
            Species::Mouse => "gated_genes.mm.csv",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "hs" | "homo_sapiens" => Some(Species::Human),
            "mouse" | "mm" | "mus_musculus" => Some(Species::Mouse),
            _ => None,
        }
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Species::Human => write!(f, "human"),
            Species::Mouse => write!(f, "mouse"),
        }
    }
}

/// Ordered gene identifiers defining the model input columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneList {
    genes: Vec<String>,
}

impl GeneList {
    pub fn new(genes: Vec<String>) -> Self {
        Self { genes }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.genes
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.genes.iter()
    }
}

/// Expression matrix as read from disk: genes (rows) x samples (columns)
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    /// Row index (gene identifiers)
    pub genes: Vec<String>,
    /// Column header (sample identifiers)
    pub samples: Vec<String>,
    /// Row-major values, one inner vector per gene
    pub values: Vec<Vec<f32>>,
}

impl ExpressionMatrix {
    /// (genes, samples)
    pub fn shape(&self) -> (usize, usize) {
        (self.genes.len(), self.samples.len())
    }

    /// Transpose to samples x genes
    pub fn transpose(&self) -> Vec<Vec<f32>> {
        let (n_genes, n_samples) = self.shape();
        let mut out = vec![Vec::with_capacity(n_genes); n_samples];
        for row in &self.values {
            for (j, &value) in row.iter().enumerate() {
                out[j].push(value);
            }
        }
        out
    }

    /// Number of positions where the matrix row index differs from the gene list
    pub fn count_gene_mismatches(&self, genes: &GeneList) -> usize {
        let paired = self
            .genes
            .iter()
            .zip(genes.iter())
            .filter(|(a, b)| a != b)
            .count();
        paired + self.genes.len().abs_diff(genes.len())
    }
}

/// Per-sample metadata, positionally aligned with the matrix columns
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMetadata {
    /// Value of the group column for each row
    pub groups: Vec<String>,
}

impl SampleMetadata {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Samples x genes features with their string labels and sample ids
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    /// Sample identifiers
    pub sample_ids: Vec<String>,
    /// Feature rows (one per sample)
    pub features: Vec<Vec<f32>>,
    /// Group label per sample
    pub labels: Vec<String>,
}

impl LabeledDataset {
    /// (samples, genes)
    pub fn shape(&self) -> (usize, usize) {
        let n_genes = self.features.first().map(|r| r.len()).unwrap_or(0);
        (self.features.len(), n_genes)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Encoded training data ready for the model
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Sample identifiers, in shuffled order
    pub sample_ids: Vec<String>,
    /// Feature rows (samples x genes)
    pub features: Vec<Vec<f32>>,
    /// Integer class per sample
    pub labels: Vec<usize>,
    /// One-hot rows (samples x classes)
    pub one_hot: Vec<Vec<f32>>,
    /// Balanced class weights
    pub class_weights: preprocessing::ClassWeights,
    /// Class names in encoding order
    pub classes: Vec<String>,
}

impl PreparedData {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Samples per class index
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for &label in &self.labels {
            if label < counts.len() {
                counts[label] += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> ExpressionMatrix {
        ExpressionMatrix {
            genes: vec!["g1".into(), "g2".into(), "g3".into()],
            samples: vec!["c1".into(), "c2".into()],
            values: vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
        }
    }

    #[test]
    fn test_transpose_shape() {
        let m = matrix();
        assert_eq!(m.shape(), (3, 2));

        let t = m.transpose();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(t[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_gene_mismatches() {
        let m = matrix();
        let same = GeneList::new(vec!["g1".into(), "g2".into(), "g3".into()]);
        assert_eq!(m.count_gene_mismatches(&same), 0);

        let shifted = GeneList::new(vec!["g1".into(), "g3".into(), "g2".into(), "g4".into()]);
        assert_eq!(m.count_gene_mismatches(&shifted), 3);
    }

    #[test]
    fn test_species() {
        assert_eq!(Species::Human.gene_list_file(), "gated_genes.hs.csv");
        assert_eq!(Species::Mouse.gene_list_file(), "gated_genes.mm.csv");
        assert_eq!(Species::parse("MM"), Some(Species::Mouse));
        assert_eq!(Species::parse("zebrafish"), None);
    }
}
