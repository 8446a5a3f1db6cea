use std::{fs, io, path::Path};

use serde::Deserialize;

use crate::{permutation, ppi, scanner};

pub const DEFAULT_K_VALUES: [usize; 3] = [3, 4, 5];

/// Settings read from an optional TOML file.
///
/// Every field has a default, so an empty file (or no file at all) is a valid configuration.
/// Command line arguments take precedence over these values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub kmer: KmerConfig,
    pub scan: ScanConfig,
    pub permutation: PermutationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KmerConfig {
    pub k_values: Vec<usize>,
}

impl Default for KmerConfig {
    fn default() -> Self {
        Self {
            k_values: DEFAULT_K_VALUES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Defaults to the length of the fingerprinted sequence.
    pub window_size: Option<usize>,
    pub step_size: usize,
    pub similarity_threshold: f64,
    pub max_n_fraction: f64,
    pub chromosomes: Option<Vec<String>>,
    pub block_bases: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window_size: None,
            step_size: scanner::DEFAULT_STEP_SIZE,
            similarity_threshold: scanner::DEFAULT_SIMILARITY_THRESHOLD,
            max_n_fraction: scanner::DEFAULT_MAX_N_FRACTION,
            chromosomes: None,
            block_bases: scanner::DEFAULT_BLOCK_BASES,
        }
    }
}

impl ScanConfig {
    pub fn chromosomes(&self) -> Vec<String> {
        self.chromosomes
            .clone()
            .unwrap_or_else(scanner::default_chromosomes)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermutationConfig {
    pub num_permutations: usize,
    pub confidence_threshold: f64,
    pub seed: Option<u64>,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            num_permutations: permutation::DEFAULT_NUM_PERMUTATIONS,
            confidence_threshold: ppi::DEFAULT_CONFIDENCE_THRESHOLD,
            seed: None,
        }
    }
}

pub fn read_file(path: &Path) -> Result<Config, Error> {
    let content = fs::read_to_string(path).map_err(Error::Read)?;
    from_toml_str(&content)
}

pub fn from_toml_str(content: &str) -> Result<Config, Error> {
    toml_edit::de::from_str(content).map_err(Error::Parse)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to read configuration file")]
    Read(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[source] toml_edit::de::Error),
}
