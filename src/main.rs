mod cli;
mod config;
mod fasta;
mod features;
mod fingerprint;
mod genome;
mod iter;
mod kmer;
mod norm_dist;
mod permutation;
mod ppi;
mod regions;
mod scanner;

use std::{
    fs::{self, File},
    io::{self, BufWriter},
    ops::Not,
    path::Path,
};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Command, FingerprintArgs, IndexArgs, PermuteArgs, ScanArgs},
    config::Config,
    fingerprint::Fingerprint,
    genome::Genome,
    kmer::KmerUniverse,
    permutation::{PermutationParams, PermutationResult},
    scanner::{ScanParams, Scanner},
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads.into())
            .build_global()
            .context("Unable to initialize the thread pool")?;
    }

    let config = match &cli.config {
        Some(path) => config::read_file(path).with_context(|| {
            format!("Unable to load configuration file {}", path.display())
        })?,
        None => Config::default(),
    };

    match cli.command {
        Command::Fingerprint(args) => run_fingerprint(args, &config),
        Command::Index(args) => run_index(args),
        Command::Scan(args) => run_scan(args, &config),
        Command::Permute(args) => run_permute(args, &config),
    }
}

/// Refuses to replace an existing file unless requested, then creates the missing parent
/// directories.
fn prepare_output(path: &Path, overwrite: bool) -> anyhow::Result<()> {
    if path.exists() && overwrite.not() {
        bail!(
            "Output file {} already exists. Use --overwrite to replace it",
            path.display()
        );
    }

    if let Some(parent) = path
        .parent()
        .filter(|parent| parent.as_os_str().is_empty().not())
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Unable to create output directory {}", parent.display())
        })?;
    }

    Ok(())
}

fn build_universe(k_values: Vec<usize>) -> anyhow::Result<KmerUniverse> {
    KmerUniverse::new(k_values.iter().copied())
        .with_context(|| format!("Invalid kmer lengths {k_values:?}"))
}

fn run_fingerprint(args: FingerprintArgs, config: &Config) -> anyhow::Result<()> {
    let FingerprintArgs {
        sequence_file,
        sequence,
        record,
        output,
        k_values,
        overwrite,
    } = args;

    prepare_output(&output, overwrite)?;
    let universe = build_universe(
        k_values.map_or_else(|| config.kmer.k_values.clone(), |k_values| k_values.0),
    )?;

    let sequence = match (sequence, sequence_file) {
        (Some(sequence), _) => sequence.into_bytes(),
        (None, Some(path)) => read_reference_sequence(&path, record.as_deref())?,
        (None, None) => bail!("A reference sequence is required"),
    };

    let fingerprint = Fingerprint::from_sequence(&sequence, &universe)
        .context("Unable to build the fingerprint")?;
    info!(
        sequence_length = fingerprint.sequence_length,
        shannon_entropy = fingerprint.shannon_entropy,
        compressibility = fingerprint.compressibility,
        "fingerprint created"
    );

    fingerprint::write_file(&fingerprint, &output)
        .with_context(|| format!("Unable to save fingerprint to {}", output.display()))?;
    println!("Fingerprint saved to {}", output.display());

    Ok(())
}

fn read_reference_sequence(path: &Path, record: Option<&str>) -> anyhow::Result<Vec<u8>> {
    let records = fasta::read_file(path).with_context(|| {
        format!(
            "Unable to read reference sequence from {}. Please ensure the file exists and is in \
             FASTA format",
            path.display()
        )
    })?;

    let record = match record {
        Some(name) => records
            .into_iter()
            .find(|record| record.name() == name)
            .with_context(|| format!("Entry {name} not found in {}", path.display()))?,
        None => {
            if records.len() > 1 {
                warn!(
                    "{} entries found in {}, using the first one ({})",
                    records.len(),
                    path.display(),
                    records[0].name(),
                );
            }
            records
                .into_iter()
                .next()
                .context("FASTA file without entries")?
        }
    };

    Ok(record.sequence)
}

fn run_index(args: IndexArgs) -> anyhow::Result<()> {
    let IndexArgs { genome, overwrite } = args;

    prepare_output(&genome::index_path(&genome), overwrite)?;
    let index = genome::build_index(&genome)
        .with_context(|| format!("Unable to index genome {}", genome.display()))?;
    println!("Genome index saved to {}", index.display());

    Ok(())
}

fn run_scan(args: ScanArgs, config: &Config) -> anyhow::Result<()> {
    let ScanArgs {
        genome: genome_path,
        fingerprint: fingerprint_path,
        output,
        extract,
        top,
        overwrite,
        window_args,
        chromosome_args,
    } = args;

    prepare_output(&output, overwrite)?;
    if let Some(extract) = &extract {
        prepare_output(extract, overwrite)?;
    }

    let fingerprint = scanner::load_reference(&fingerprint_path).with_context(|| {
        format!(
            "Unable to load the reference fingerprint {}. Please create it with the fingerprint \
             command",
            fingerprint_path.display()
        )
    })?;

    let k_values = match window_args.k_values {
        Some(k_values) => k_values.0,
        None if fingerprint.k_values.is_empty().not() => fingerprint.k_values.clone(),
        None => config.kmer.k_values.clone(),
    };
    let universe = build_universe(k_values)?;
    let reference = fingerprint
        .reference_vector(&universe)
        .context("The fingerprint cannot be used as scan reference")?;

    let window_size = match window_args.window_size.or(config.scan.window_size) {
        Some(window_size) => {
            if window_size != fingerprint.sequence_length {
                warn!(
                    "window size {window_size} differs from the fingerprinted sequence length {}",
                    fingerprint.sequence_length,
                );
            }
            window_size
        }
        None => fingerprint.sequence_length,
    };

    let params = ScanParams {
        window_size,
        step_size: window_args.step_size.unwrap_or(config.scan.step_size),
        similarity_threshold: window_args
            .similarity_threshold
            .unwrap_or(config.scan.similarity_threshold),
        max_n_fraction: window_args
            .max_n_fraction
            .unwrap_or(config.scan.max_n_fraction),
        block_bases: window_args.block_bases.unwrap_or(config.scan.block_bases),
    };
    let scanner = Scanner::new(&universe, reference, params).context("Invalid scan options")?;

    let genome = scanner::open_genome(&genome_path).with_context(|| {
        format!(
            "Genome {} not found or not properly indexed. Please ensure the .fa and .fai files \
             exist (the index can be built with the index command)",
            genome_path.display()
        )
    })?;

    let chromosomes: Vec<String> = if chromosome_args.all_chromosomes {
        genome.chromosomes().into_iter().map(str::to_owned).collect()
    } else {
        chromosome_args
            .chromosomes
            .unwrap_or_else(|| config.scan.chromosomes())
    };

    info!(
        window_size = scanner.params().window_size,
        step_size = scanner.params().step_size,
        similarity_threshold = scanner.params().similarity_threshold,
        chromosomes = chromosomes.len(),
        "scanning genome"
    );
    let regions = scanner
        .scan_genome(&genome, &chromosomes)
        .context("Genome scan failed")?;
    let ranked = regions::rank(regions);

    regions::write_bed_file(&ranked, &output)
        .with_context(|| format!("Unable to save candidate regions to {}", output.display()))?;

    if let Some(extract) = &extract {
        let file = File::create(extract)
            .with_context(|| format!("Unable to create FASTA file {}", extract.display()))?;
        regions::write_islands_fasta(&genome, &ranked, BufWriter::new(file))
            .with_context(|| format!("Unable to write island sequences to {}", extract.display()))?;
    }

    println!("Scan complete. Found {} candidate regions.", ranked.len());
    if top > 0 && ranked.is_empty().not() {
        println!("{}", regions::summary_table(&ranked, top));
    }
    println!("Results saved to {}", output.display());

    Ok(())
}

fn run_permute(args: PermuteArgs, config: &Config) -> anyhow::Result<()> {
    let PermuteArgs {
        ppi: ppi_path,
        genes,
        output,
        confidence_threshold,
        num_permutations,
        seed,
        overwrite,
    } = args;

    prepare_output(&output, overwrite)?;

    let confidence_threshold =
        confidence_threshold.unwrap_or(config.permutation.confidence_threshold);
    let graph = ppi::read_edge_list(&ppi_path, confidence_threshold).with_context(|| {
        format!(
            "Unable to load PPI network from {}. Please download the STRING protein links file \
             for your organism",
            ppi_path.display()
        )
    })?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        confidence_threshold,
        "PPI network loaded"
    );

    let candidates = ppi::read_gene_list(&genes).with_context(|| {
        format!(
            "Unable to load candidate genes from {}. This file should be generated by mapping the \
             candidate regions to genes",
            genes.display()
        )
    })?;
    info!("loaded {} candidate genes", candidates.len());

    let params = PermutationParams {
        num_permutations: num_permutations.unwrap_or(config.permutation.num_permutations),
        seed: seed.or(config.permutation.seed),
    };

    let result = match permutation::run_permutation_test(&graph, &candidates, &params) {
        Ok(result) => result,
        Err(err @ permutation::Error::InsufficientCandidates { .. }) => {
            warn!("{err}, the permutation test is skipped");
            return Ok(());
        }
    };

    permutation::write_file(&result, &output)
        .with_context(|| format!("Unable to save results to {}", output.display()))?;
    print_permutation_summary(&result);
    println!("Full results saved to {}", output.display());

    Ok(())
}

fn print_permutation_summary(result: &PermutationResult) {
    println!("Observed interactions: {}", result.observed_interactions);
    println!(
        "Mean random interactions: {:.2}",
        result.mean_random_interactions
    );
    println!("P-value: {:.6}", result.p_value);
    if let Some(z_score) = result.z_score {
        println!("Z-score: {z_score:.2}");
    }
}
