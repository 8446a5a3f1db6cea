use clap::{ArgGroup, Args, Parser, Subcommand};
use std::{fmt, num::ParseIntError, path::PathBuf, str::FromStr};

#[derive(Debug, Parser)]
#[command(author, version, about)]
/// Genome-wide search of regions resembling the fingerprint of a reference sequence
pub struct Cli {
    /// Number of processors to use
    ///
    /// Uses all available processors if not specified
    #[arg(long, global = true)]
    pub threads: Option<u16>,

    /// Path to a TOML configuration file
    ///
    /// Note: command line options take precedence over the values in the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Builds the informational fingerprint of a reference sequence
    Fingerprint(FingerprintArgs),

    /// Builds the .fai index of a FASTA genome, required by the scan
    Index(IndexArgs),

    /// Scans a genome for windows similar to a fingerprinted sequence
    Scan(ScanArgs),

    /// Tests whether a set of genes is more interconnected than chance in a PPI network
    Permute(PermuteArgs),
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("sequence-input")
        .required(true)
        .args(["sequence_file", "sequence"])
))]
pub struct FingerprintArgs {
    /// Path to a FASTA file containing the reference sequence
    #[arg(long, short = 'i')]
    pub sequence_file: Option<PathBuf>,

    /// The reference sequence
    #[arg(long)]
    pub sequence: Option<String>,

    /// Name of the FASTA entry to use (Default: the first one)
    #[arg(long, requires = "sequence_file")]
    pub record: Option<String>,

    /// Output fingerprint file
    #[arg(short, long, default_value = "seed_fingerprint.json")]
    pub output: PathBuf,

    /// Comma-separated list of kmer lengths
    #[arg(long, short = 'k')]
    pub k_values: Option<KValues>,

    /// Overwrites the output file (if the specified path already exists)
    #[arg(long, visible_alias = "ow")]
    pub overwrite: bool,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Path to the FASTA genome
    pub genome: PathBuf,

    /// Overwrites the index (if it already exists)
    #[arg(long, visible_alias = "ow")]
    pub overwrite: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Path to an indexed FASTA genome
    ///
    /// Note: the index can be generated with the `index` command
    #[arg(long, short = 'g')]
    pub genome: PathBuf,

    /// Path to a fingerprint generated with the `fingerprint` command
    #[arg(long, short = 'f')]
    pub fingerprint: PathBuf,

    /// Output BED file
    #[arg(short, long, default_value = "candidate_islands.bed")]
    pub output: PathBuf,

    /// Writes the sequences of the candidate regions to this FASTA file
    #[arg(long)]
    pub extract: Option<PathBuf>,

    /// Number of best candidate regions printed to screen
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Overwrites the output files (if the specified paths already exist)
    #[arg(long, visible_alias = "ow")]
    pub overwrite: bool,

    #[command(flatten, next_help_heading = "Window options")]
    pub window_args: ScanWindowArgs,

    #[command(flatten, next_help_heading = "Chromosome options")]
    pub chromosome_args: ChromosomeArgs,
}

#[derive(Debug, Args)]
pub struct ScanWindowArgs {
    /// Size (in nt) of the sliding window
    ///
    /// Note: the default value is the length of the fingerprinted sequence
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Offset (in nt) for window sliding [default: 50]
    #[arg(long)]
    pub step_size: Option<usize>,

    /// Minimum cosine similarity with the reference to report a window [default: 0.85]
    #[arg(long, allow_negative_numbers = true)]
    pub similarity_threshold: Option<f64>,

    /// Windows with a fraction of N bases greater than this are skipped [default: 0.1]
    #[arg(long)]
    pub max_n_fraction: Option<f64>,

    /// Approximate number of bases read from the genome at once [default: 1048576]
    #[arg(long)]
    pub block_bases: Option<usize>,

    /// Comma-separated list of kmer lengths
    ///
    /// Note: the default value is the list stored in the fingerprint
    #[arg(long, short = 'k')]
    pub k_values: Option<KValues>,
}

#[derive(Debug, Args)]
pub struct ChromosomeArgs {
    /// Comma-separated list of chromosomes to scan [default: chr1-chr22,chrX,chrY]
    #[arg(long, value_delimiter = ',')]
    pub chromosomes: Option<Vec<String>>,

    /// Scans all the chromosomes of the genome
    #[arg(long, conflicts_with = "chromosomes")]
    pub all_chromosomes: bool,
}

#[derive(Debug, Args)]
pub struct PermuteArgs {
    /// Path to a STRING-like protein links file (optionally gzipped)
    ///
    /// Note: each row should contain two protein identifiers and the combined score, separated
    /// by whitespaces
    #[arg(long)]
    pub ppi: PathBuf,

    /// Path to the list of candidate genes, one per row
    #[arg(long)]
    pub genes: PathBuf,

    /// Output results file
    #[arg(short, long, default_value = "permutation_results.json")]
    pub output: PathBuf,

    /// Minimum combined score to retain an interaction [default: 700]
    #[arg(long)]
    pub confidence_threshold: Option<f64>,

    /// Number of random gene sets [default: 10000]
    #[arg(long)]
    pub num_permutations: Option<usize>,

    /// Seed for the random number generator
    ///
    /// Note: a random seed is used (and reported) if not specified
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overwrites the output file (if the specified path already exists)
    #[arg(long, visible_alias = "ow")]
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KValues(pub Vec<usize>);

impl fmt::Display for KValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut values = self.0.iter();
        if let Some(first) = values.next() {
            write!(f, "{first}")?;
            values.try_for_each(|k| write!(f, ",{k}"))?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseKValuesError {
    Empty,
    InvalidValue { index: usize, error: ParseIntError },
}

impl FromStr for KValues {
    type Err = ParseKValuesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseKValuesError::Empty);
        }

        s.split(',')
            .enumerate()
            .map(|(index, k)| {
                k.trim()
                    .parse()
                    .map_err(|error| ParseKValuesError::InvalidValue { index, error })
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl fmt::Display for ParseKValuesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("at least one kmer length is required"),
            Self::InvalidValue { index, error } => {
                write!(f, "kmer length at position {} is invalid: {error}", index + 1)
            }
        }
    }
}

impl std::error::Error for ParseKValuesError {}
