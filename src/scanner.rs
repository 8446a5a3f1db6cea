use std::{
    ops::Not,
    path::{Path, PathBuf},
    sync::Arc,
};

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    features::{cosine_similarity, feature_vector, FeatureVector},
    fingerprint::{self, Fingerprint},
    genome::{self, Genome, IndexedFasta, OpenError},
    iter::WindowStarts,
    kmer::KmerUniverse,
};

pub const DEFAULT_STEP_SIZE: usize = 50;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MAX_N_FRACTION: f64 = 0.1;
pub const DEFAULT_BLOCK_BASES: usize = 1 << 20;

/// Human autosomes followed by the sex chromosomes, UCSC naming.
pub fn default_chromosomes() -> Vec<String> {
    (1..=22)
        .map(|index| format!("chr{index}"))
        .chain(["chrX".to_owned(), "chrY".to_owned()])
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanParams {
    pub window_size: usize,
    pub step_size: usize,
    pub similarity_threshold: f64,

    /// Windows with a fraction of `N` strictly greater than this are skipped.
    pub max_n_fraction: f64,

    /// Approximate number of bases fetched from the genome at once.
    pub block_bases: usize,
}

impl ScanParams {
    #[cfg(test)]
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            step_size: DEFAULT_STEP_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_n_fraction: DEFAULT_MAX_N_FRACTION,
            block_bases: DEFAULT_BLOCK_BASES,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.window_size == 0 {
            return Err(ParamsError::ZeroWindowSize);
        }

        if self.step_size == 0 {
            return Err(ParamsError::ZeroStepSize);
        }

        if (-1. ..=1.).contains(&self.similarity_threshold).not() {
            return Err(ParamsError::SimilarityThreshold(self.similarity_threshold));
        }

        if (0. ..=1.).contains(&self.max_n_fraction).not() {
            return Err(ParamsError::MaxNFraction(self.max_n_fraction));
        }

        Ok(())
    }

    fn windows_per_block(&self) -> usize {
        self.block_bases
            .checked_sub(self.window_size)
            .map_or(1, |room| room / self.step_size + 1)
    }
}

/// A window whose similarity with the reference reached the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    pub chromosome: Arc<str>,
    pub start: u64,
    pub end: u64,
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChromosomeStats {
    pub windows: usize,
    pub skipped: usize,
    pub reported: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WindowOutcome {
    Skipped,
    Scored,
    Reported(f64),
}

#[derive(Debug)]
pub struct Scanner<'a> {
    universe: &'a KmerUniverse,
    reference: FeatureVector,
    params: ScanParams,
}

impl<'a> Scanner<'a> {
    pub fn new(
        universe: &'a KmerUniverse,
        reference: FeatureVector,
        params: ScanParams,
    ) -> Result<Self, Error> {
        params.validate()?;

        if reference.len() != universe.dimension() {
            return Err(Error::DimensionMismatch {
                reference: reference.len(),
                universe: universe.dimension(),
            });
        }

        Ok(Self {
            universe,
            reference,
            params,
        })
    }

    #[inline]
    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Scans the given chromosomes in order. Chromosomes missing from the genome are skipped.
    pub fn scan_genome<G, S>(
        &self,
        genome: &G,
        chromosomes: &[S],
    ) -> Result<Vec<CandidateRegion>, Error>
    where
        G: Genome + ?Sized,
        S: AsRef<str>,
    {
        let mut regions = Vec::new();
        let mut total = ChromosomeStats::default();

        for chromosome in chromosomes {
            let chromosome = chromosome.as_ref();
            if genome.contains(chromosome).not() {
                debug!("chromosome {chromosome} not found in genome, skipping");
                continue;
            }

            let stats = self.scan_chromosome(genome, chromosome, &mut regions)?;
            info!(
                chromosome,
                windows = stats.windows,
                skipped = stats.skipped,
                reported = stats.reported,
                "chromosome scanned"
            );

            total.windows += stats.windows;
            total.skipped += stats.skipped;
            total.reported += stats.reported;
        }

        info!(
            windows = total.windows,
            skipped = total.skipped,
            reported = total.reported,
            "genome scan completed"
        );
        Ok(regions)
    }

    /// Scans a single chromosome, appending the candidate regions in genomic order.
    pub fn scan_chromosome<G>(
        &self,
        genome: &G,
        chromosome: &str,
        regions: &mut Vec<CandidateRegion>,
    ) -> Result<ChromosomeStats, Error>
    where
        G: Genome + ?Sized,
    {
        let ScanParams {
            window_size,
            step_size,
            ..
        } = self.params;

        let length = genome
            .length(chromosome)
            .ok_or_else(|| Error::Substring {
                chromosome: chromosome.to_owned(),
                start: 0,
                end: 0,
                source: genome::Error::UnknownChromosome(chromosome.to_owned()),
            })?;

        let chromosome_name: Arc<str> = Arc::from(chromosome);
        let mut stats = ChromosomeStats::default();
        let starts = WindowStarts::new(length, window_size as u64, step_size as u64);
        let mut block_starts = Vec::with_capacity(self.params.windows_per_block());

        for chunk in &starts.chunks(self.params.windows_per_block()) {
            block_starts.clear();
            block_starts.extend(chunk);
            let (Some(&block_start), Some(&last_start)) = (block_starts.first(), block_starts.last())
            else {
                continue;
            };
            let block_end = last_start + window_size as u64;

            let mut block = genome
                .substring(chromosome, block_start, block_end)
                .map_err(|source| Error::Substring {
                    chromosome: chromosome.to_owned(),
                    start: block_start,
                    end: block_end,
                    source,
                })?;
            block.make_ascii_uppercase();

            let outcomes: Vec<_> = block_starts
                .par_iter()
                .map(|&start| {
                    // Offsets are relative to an in-memory block
                    #[allow(clippy::cast_possible_truncation)]
                    let offset = (start - block_start) as usize;
                    self.score_window(&block[offset..(offset + window_size)])
                })
                .collect();

            stats.windows += outcomes.len();
            for (&start, outcome) in block_starts.iter().zip(outcomes) {
                match outcome {
                    WindowOutcome::Skipped => stats.skipped += 1,
                    WindowOutcome::Scored => {}
                    WindowOutcome::Reported(similarity) => {
                        stats.reported += 1;
                        regions.push(CandidateRegion {
                            chromosome: Arc::clone(&chromosome_name),
                            start,
                            end: start + window_size as u64,
                            similarity,
                        });
                    }
                }
            }
        }

        Ok(stats)
    }

    fn score_window(&self, window: &[u8]) -> WindowOutcome {
        let n_count = window.iter().filter(|&&base| base == b'N').count();

        #[allow(clippy::cast_precision_loss)]
        let n_fraction = n_count as f64 / window.len() as f64;
        if n_fraction > self.params.max_n_fraction {
            return WindowOutcome::Skipped;
        }

        let similarity = cosine_similarity(&feature_vector(window, self.universe), &self.reference);
        if similarity >= self.params.similarity_threshold {
            WindowOutcome::Reported(similarity)
        } else {
            WindowOutcome::Scored
        }
    }
}

/// Opens an indexed FASTA genome.
pub fn open_genome(path: &Path) -> Result<IndexedFasta, Error> {
    IndexedFasta::open(path).map_err(|source| Error::GenomeUnavailable {
        path: path.to_owned(),
        source,
    })
}

/// Loads a fingerprint that can be used as scan reference, that is one storing its sequence.
pub fn load_reference(path: &Path) -> Result<Fingerprint, Error> {
    let reference_unavailable = |source| Error::ReferenceUnavailable {
        path: path.to_owned(),
        source,
    };

    let fingerprint = fingerprint::read_file(path).map_err(reference_unavailable)?;
    if fingerprint.sequence.is_none() {
        return Err(reference_unavailable(fingerprint::Error::MissingSequence));
    }

    Ok(fingerprint)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("genome {} is not available", path.display())]
    GenomeUnavailable {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    #[error("reference fingerprint {} is not available", path.display())]
    ReferenceUnavailable {
        path: PathBuf,
        #[source]
        source: fingerprint::Error,
    },

    #[error("invalid scan parameters")]
    InvalidParams(#[from] ParamsError),

    #[error(
        "reference vector has {reference} components, but the kmer universe requires {universe}"
    )]
    DimensionMismatch { reference: usize, universe: usize },

    #[error("unable to read {chromosome}:{start}-{end} from the genome")]
    Substring {
        chromosome: String,
        start: u64,
        end: u64,
        #[source]
        source: genome::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("window size must be greater than zero")]
    ZeroWindowSize,

    #[error("step size must be greater than zero")]
    ZeroStepSize,

    #[error("similarity threshold must be between -1 and 1, got {0}")]
    SimilarityThreshold(f64),

    #[error("maximum N fraction must be between 0 and 1, got {0}")]
    MaxNFraction(f64),
}
