use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use fnv::FnvHashSet;
use petgraph::graph::NodeIndex;
use rand::{rngs::StdRng, seq::index::sample, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{norm_dist::NormDist, ppi::PpiGraph};

pub const DEFAULT_NUM_PERMUTATIONS: usize = 10_000;

/// Minimum number of candidates inside the network for the test to be meaningful.
pub const MIN_CANDIDATES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationParams {
    pub num_permutations: usize,

    /// Random seed, drawn from the system entropy when missing.
    pub seed: Option<u64>,
}

impl Default for PermutationParams {
    fn default() -> Self {
        Self {
            num_permutations: DEFAULT_NUM_PERMUTATIONS,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationResult {
    pub num_candidate_genes: usize,
    pub num_candidate_genes_in_network: usize,
    pub observed_interactions: usize,
    pub num_permutations: usize,
    pub mean_random_interactions: f64,
    pub std_dev_random_interactions: f64,
    pub p_value: f64,
    pub z_score: Option<f64>,
    pub seed: u64,
    pub random_interaction_distribution: Vec<usize>,
}

/// Tests whether the candidates are more interconnected than random sets of proteins of the same
/// size drawn from the network.
///
/// Trials are evaluated in parallel, each one with its own generator seeded from a master
/// generator: the result only depends on the seed, not on the number of threads.
pub fn run_permutation_test<S>(
    graph: &PpiGraph,
    candidates: &[S],
    params: &PermutationParams,
) -> Result<PermutationResult, Error>
where
    S: AsRef<str>,
{
    let mut seen = FnvHashSet::default();
    let candidate_nodes: Vec<_> = candidates
        .iter()
        .filter_map(|candidate| graph.node(candidate.as_ref()))
        .filter(|&node| seen.insert(node))
        .collect();

    info!(
        "{} of {} candidate genes are in the PPI network",
        candidate_nodes.len(),
        candidates.len(),
    );
    if candidate_nodes.len() < MIN_CANDIDATES {
        return Err(Error::InsufficientCandidates {
            in_network: candidate_nodes.len(),
            required: MIN_CANDIDATES,
        });
    }

    let node_count = graph.node_count();
    let mut mask = vec![false; node_count];
    let observed_interactions = graph.induced_edge_count(&candidate_nodes, &mut mask);
    info!("observed interactions within the candidate set: {observed_interactions}");

    let seed = params.seed.unwrap_or_else(|| {
        let seed: u64 = rand::thread_rng().gen();
        info!("no seed specified, using {seed}");
        seed
    });
    let mut master_rng = StdRng::seed_from_u64(seed);
    let trial_seeds: Vec<u64> = (0..params.num_permutations)
        .map(|_| master_rng.gen())
        .collect();

    let sample_size = candidate_nodes.len();
    debug!(
        permutations = params.num_permutations,
        sample_size, "running permutations"
    );
    let random_interaction_distribution: Vec<usize> = trial_seeds
        .into_par_iter()
        .map_init(
            || (vec![false; node_count], Vec::with_capacity(sample_size)),
            |(mask, nodes), trial_seed| {
                let mut rng = StdRng::seed_from_u64(trial_seed);
                nodes.clear();
                nodes.extend(
                    sample(&mut rng, node_count, sample_size)
                        .into_iter()
                        .map(NodeIndex::new),
                );
                graph.induced_edge_count(nodes, mask)
            },
        )
        .collect();

    let distribution = NormDist::from_sample(random_interaction_distribution.as_slice());
    let more_extreme = distribution.count_at_least(observed_interactions);

    #[allow(clippy::cast_precision_loss)]
    let p_value = (more_extreme + 1) as f64 / (params.num_permutations + 1) as f64;

    Ok(PermutationResult {
        num_candidate_genes: candidates.len(),
        num_candidate_genes_in_network: sample_size,
        observed_interactions,
        num_permutations: params.num_permutations,
        mean_random_interactions: distribution.mean(),
        std_dev_random_interactions: distribution.stddev(),
        p_value,
        z_score: distribution.z_score(observed_interactions),
        seed,
        random_interaction_distribution,
    })
}

pub fn write_file(result: &PermutationResult, path: &Path) -> Result<(), WriteError> {
    let mut writer = BufWriter::new(File::create(path).map_err(WriteError::Create)?);
    serde_json::to_writer_pretty(&mut writer, result).map_err(WriteError::Serialize)?;
    writeln!(writer).map_err(WriteError::Write)?;
    writer.flush().map_err(WriteError::Write)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(
        "only {in_network} candidate genes are in the network, at least {required} are required"
    )]
    InsufficientCandidates { in_network: usize, required: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("unable to create permutation results file")]
    Create(#[source] io::Error),

    #[error("unable to serialize permutation results")]
    Serialize(#[source] serde_json::Error),

    #[error("unable to write permutation results file")]
    Write(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    /// Two dense clusters connected by a single bridge, plus a sparse tail.
    fn clustered_graph() -> PpiGraph {
        let mut graph = PpiGraph::new();
        for cluster in [["A1", "A2", "A3", "A4"], ["B1", "B2", "B3", "B4"]] {
            for (index, a) in cluster.iter().enumerate() {
                for b in &cluster[(index + 1)..] {
                    graph.add_interaction(a, b, 900.);
                }
            }
        }
        graph.add_interaction("A4", "B1", 900.);
        for (a, b) in [("C1", "C2"), ("C2", "C3"), ("C3", "C4"), ("C4", "C5")] {
            graph.add_interaction(a, b, 800.);
        }
        graph
    }

    fn params(num_permutations: usize, seed: u64) -> PermutationParams {
        PermutationParams {
            num_permutations,
            seed: Some(seed),
        }
    }

    #[test]
    fn single_permutation() {
        let graph = clustered_graph();
        let result = run_permutation_test(&graph, &["A1", "A2", "A3"], &params(1, 7)).unwrap();

        assert_eq!(result.observed_interactions, 3);
        assert_eq!(result.random_interaction_distribution.len(), 1);
        assert!(result.p_value > 0. && result.p_value <= 1.);
        assert!(result.p_value == 0.5 || result.p_value == 1.);
        assert_eq!(result.seed, 7);
    }

    #[test]
    fn whole_network_has_p_value_one() {
        let graph = clustered_graph();
        let all = [
            "A1", "A2", "A3", "A4", "B1", "B2", "B3", "B4", "C1", "C2", "C3", "C4", "C5",
        ];
        let result = run_permutation_test(&graph, &all, &params(50, 3)).unwrap();

        assert_eq!(result.observed_interactions, graph.edge_count());
        assert_abs_diff_eq!(result.p_value, 1.);
        assert!(result
            .random_interaction_distribution
            .iter()
            .all(|&count| count == graph.edge_count()));
        assert_abs_diff_eq!(result.std_dev_random_interactions, 0.);
        assert_eq!(result.z_score, None);
    }

    #[test]
    fn clustered_candidates_are_significant() {
        let graph = clustered_graph();
        let result =
            run_permutation_test(&graph, &["A1", "A2", "A3", "A4"], &params(2000, 11)).unwrap();

        assert_eq!(result.observed_interactions, 6);
        assert!(result.mean_random_interactions < 6.);
        assert!(result.p_value < 0.05);
        assert!(result.z_score.unwrap() > 0.);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let graph = clustered_graph();
        let candidates = ["A1", "B2", "C3"];

        let first = run_permutation_test(&graph, &candidates, &params(200, 42)).unwrap();
        let second = run_permutation_test(&graph, &candidates, &params(200, 42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unseeded_run_records_seed() {
        let graph = clustered_graph();
        let candidates = ["A1", "B2"];
        let result = run_permutation_test(
            &graph,
            &candidates,
            &PermutationParams {
                num_permutations: 20,
                seed: None,
            },
        )
        .unwrap();

        let replay =
            run_permutation_test(&graph, &candidates, &params(20, result.seed)).unwrap();
        assert_eq!(replay, result);
    }

    #[test]
    fn candidate_counts() {
        let graph = clustered_graph();
        let result =
            run_permutation_test(&graph, &["A1", "A2", "A1", "MISSING"], &params(10, 1)).unwrap();

        assert_eq!(result.num_candidate_genes, 4);
        assert_eq!(result.num_candidate_genes_in_network, 2);
        assert_eq!(result.observed_interactions, 1);
    }

    #[test]
    fn insufficient_candidates() {
        let graph = clustered_graph();
        assert_eq!(
            run_permutation_test(&graph, &["A1", "MISSING", "A1"], &params(10, 1)),
            Err(Error::InsufficientCandidates {
                in_network: 1,
                required: 2
            })
        );
    }

    #[test]
    fn result_json_keys() {
        let graph = clustered_graph();
        let result = run_permutation_test(&graph, &["A1", "A2"], &params(5, 1)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permutation_results.json");
        write_file(&result, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        for key in [
            "num_candidate_genes",
            "num_candidate_genes_in_network",
            "observed_interactions",
            "num_permutations",
            "mean_random_interactions",
            "std_dev_random_interactions",
            "p_value",
            "random_interaction_distribution",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }

        let read: PermutationResult =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(read, result);
    }
}
