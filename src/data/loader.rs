use crate::data::{ExpressionMatrix, GeneList, LabeledDataset, SampleMetadata, GROUP_COLUMN};
use crate::error::PipelineError;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".csv") {
                    Ok(FileFormat::GzippedCsv)
                } else if stem.ends_with(".tsv") || stem.ends_with(".txt") {
                    Ok(FileFormat::GzippedTsv)
                } else {
                    Err(anyhow::anyhow!("Cannot determine format of gzipped file {:?}", path))
                }
            }
            (Some("csv"), _) => Ok(FileFormat::Csv),
            (Some("tsv"), _) | (Some("txt"), _) => Ok(FileFormat::Tsv),
            _ => Err(anyhow::anyhow!("Unsupported file format: {:?}", path)),
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }
}

/// Data loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Metadata column holding the class label
    pub label_column: String,
    /// Log progress every this many matrix rows
    pub log_every: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            label_column: GROUP_COLUMN.to_string(),
            log_every: 5000,
        }
    }
}

/// Loader for the gene list, expression matrix and sample metadata
pub struct DataLoader {
    config: LoaderConfig,
}

impl DataLoader {
    /// Create new data loader with default config
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Create new data loader with custom config
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load the ordered gene list from a headerless single-column file
    pub fn load_gene_list<P: AsRef<Path>>(&self, path: P) -> Result<GeneList> {
        let path = path.as_ref();
        info!("Loading gene list from {:?}", path);

        let format = FileFormat::from_path(path)?;
        let reader = open_reader(path, format)?;
        let genes = self
            .parse_gene_list(reader, format)
            .with_context(|| format!("Failed to parse gene list {:?}", path))?;

        info!("Loaded {} genes", genes.len());
        Ok(genes)
    }

    /// Load the genes x samples expression matrix
    pub fn load_matrix<P: AsRef<Path>>(&self, path: P) -> Result<ExpressionMatrix> {
        let path = path.as_ref();
        info!("Loading expression matrix from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);
        let reader = open_reader(path, format)?;
        let matrix = self
            .parse_matrix(reader, format)
            .with_context(|| format!("Failed to parse expression matrix {:?}", path))?;

        let (n_genes, n_samples) = matrix.shape();
        info!("Loaded matrix: {} genes x {} samples", n_genes, n_samples);
        Ok(matrix)
    }

    /// Load the sample metadata table
    pub fn load_metadata<P: AsRef<Path>>(&self, path: P) -> Result<SampleMetadata> {
        let path = path.as_ref();
        info!("Loading sample metadata from {:?}", path);

        let format = FileFormat::from_path(path)?;
        let reader = open_reader(path, format)?;
        let metadata = self
            .parse_metadata(reader, format, &path.display().to_string())
            .with_context(|| format!("Failed to parse sample metadata {:?}", path))?;

        info!("Loaded {} metadata rows", metadata.len());
        Ok(metadata)
    }

    /// Load matrix and metadata and return the transposed, labeled dataset
    pub fn load_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        matrix_path: P,
        metadata_path: Q,
    ) -> Result<LabeledDataset> {
        let matrix = self.load_matrix(matrix_path)?;
        let metadata = self.load_metadata(metadata_path)?;
        assemble_dataset(&matrix, metadata)
    }

    fn parse_gene_list<R: Read>(&self, reader: R, format: FileFormat) -> Result<GeneList> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut genes = Vec::new();
        for (line, result) in csv_reader.records().enumerate() {
            let record = result.with_context(|| format!("Malformed record at line {}", line + 1))?;
            match record.get(0).map(str::trim) {
                Some(gene) if !gene.is_empty() => genes.push(gene.to_string()),
                _ => warn!("Skipping empty gene entry at line {}", line + 1),
            }
        }

        if genes.is_empty() {
            return Err(PipelineError::EmptyInput("gene list".to_string()).into());
        }
        Ok(GeneList::new(genes))
    }

    fn parse_matrix<R: Read>(&self, reader: R, format: FileFormat) -> Result<ExpressionMatrix> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .from_reader(reader);

        // First header cell names the gene index column
        let samples: Vec<String> = csv_reader
            .headers()
            .context("Failed to read matrix header")?
            .iter()
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect();

        if samples.is_empty() {
            return Err(PipelineError::EmptyInput("matrix has no sample columns".to_string()).into());
        }

        let mut genes = Vec::new();
        let mut values = Vec::new();

        for result in csv_reader.records() {
            let line = genes.len() + 2;
            let record = result.with_context(|| format!("Malformed matrix record at line {}", line))?;

            let gene = record
                .get(0)
                .map(|s| s.trim().to_string())
                .with_context(|| format!("Missing gene id at line {}", line))?;

            let row = record
                .iter()
                .skip(1)
                .enumerate()
                .map(|(j, cell)| {
                    cell.trim().parse::<f32>().with_context(|| {
                        format!(
                            "Invalid value '{}' for gene {} sample {} at line {}",
                            cell, gene, samples[j], line
                        )
                    })
                })
                .collect::<Result<Vec<f32>>>()?;

            genes.push(gene);
            values.push(row);

            if genes.len() % self.config.log_every == 0 {
                debug!("Parsed {} genes...", genes.len());
            }
        }

        if genes.is_empty() {
            return Err(PipelineError::EmptyInput("matrix has no gene rows".to_string()).into());
        }

        Ok(ExpressionMatrix {
            genes,
            samples,
            values,
        })
    }

    fn parse_metadata<R: Read>(
        &self,
        reader: R,
        format: FileFormat,
        source: &str,
    ) -> Result<SampleMetadata> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers().context("Failed to read metadata header")?;
        let label_idx = headers
            .iter()
            .position(|h| h.trim() == self.config.label_column)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: self.config.label_column.clone(),
                file: source.to_string(),
            })?;

        let mut groups = Vec::new();
        for (row, result) in csv_reader.records().enumerate() {
            let record = result.with_context(|| format!("Malformed metadata record at line {}", row + 2))?;
            let group = record
                .get(label_idx)
                .map(str::to_string)
                .with_context(|| format!("Missing '{}' value at line {}", self.config.label_column, row + 2))?;
            groups.push(group);
        }

        Ok(SampleMetadata { groups })
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Pair a matrix with its metadata and transpose to samples x genes
pub fn assemble_dataset(matrix: &ExpressionMatrix, metadata: SampleMetadata) -> Result<LabeledDataset> {
    let (_, n_samples) = matrix.shape();
    if metadata.len() != n_samples {
        return Err(PipelineError::SampleCountMismatch {
            matrix: n_samples,
            metadata: metadata.len(),
        }
        .into());
    }

    Ok(LabeledDataset {
        sample_ids: matrix.samples.clone(),
        features: matrix.transpose(),
        labels: metadata.groups,
    })
}

fn open_reader(path: &Path, format: FileFormat) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open file {:?}", path))?;
    if format.is_gzipped() {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
