use std::{
    ffi::OsStr,
    fs::File,
    io::{self, BufRead, BufReader},
    ops::Not,
    path::Path,
};

use flate2::read::MultiGzDecoder;
use fnv::FnvHashMap;
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::debug;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 700.;

/// Undirected protein-protein interaction network.
///
/// Nodes are protein (or gene) identifiers, edges carry the combined confidence score. The graph
/// is simple: at most one edge for each pair of nodes, no self loops.
#[derive(Debug, Clone, Default)]
pub struct PpiGraph {
    graph: UnGraph<String, f64>,
    lookup: FnvHashMap<String, NodeIndex>,
}

impl PpiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.lookup.get(name) {
            return node;
        }

        let node = self.graph.add_node(name.to_owned());
        self.lookup.insert(name.to_owned(), node);
        node
    }

    /// Adds an interaction between two proteins, replacing the score of an existing one.
    ///
    /// Self interactions are ignored and `false` is returned.
    pub fn add_interaction(&mut self, a: &str, b: &str, score: f64) -> bool {
        if a == b {
            return false;
        }

        let a = self.get_or_add_node(a);
        let b = self.get_or_add_node(b);
        self.graph.update_edge(a, b, score);
        true
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[inline]
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.lookup.get(name).copied()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    #[cfg(test)]
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        let edge = self.graph.find_edge(self.node(a)?, self.node(b)?)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Number of edges of the subgraph induced by `nodes`.
    ///
    /// `mask` must have one element for each node of the graph and must be all `false`; it is left
    /// in the same state on return. Nodes must be unique.
    pub(crate) fn induced_edge_count(&self, nodes: &[NodeIndex], mask: &mut [bool]) -> usize {
        debug_assert_eq!(mask.len(), self.node_count());

        for node in nodes {
            mask[node.index()] = true;
        }

        let endpoints: usize = nodes
            .iter()
            .map(|&node| {
                self.graph
                    .neighbors(node)
                    .filter(|neighbor| mask[neighbor.index()])
                    .count()
            })
            .sum();

        for node in nodes {
            mask[node.index()] = false;
        }

        endpoints / 2
    }
}

fn open_maybe_gzipped(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if path.extension() == Some(OsStr::new("gz")) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(reader)
}

/// Reads a STRING-like edge list, keeping the interactions with a score not lower than
/// `confidence_threshold`. Files ending with `.gz` are decompressed on the fly.
pub fn read_edge_list(path: &Path, confidence_threshold: f64) -> Result<PpiGraph, Error> {
    let reader = open_maybe_gzipped(path).map_err(Error::Open)?;
    read_edge_list_content(reader, confidence_threshold)
}

fn read_edge_list_content<R>(reader: R, confidence_threshold: f64) -> Result<PpiGraph, Error>
where
    R: BufRead,
{
    let mut graph = PpiGraph::new();
    let mut data_rows = 0usize;
    let mut filtered = 0usize;
    let mut self_loops = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| Error::Read {
            line: line_number,
            source,
        })?;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<_> = trimmed.split_ascii_whitespace().collect();
        let &[protein1, protein2, score] = fields.as_slice() else {
            return Err(Error::Columns {
                line: line_number,
                found: fields.len(),
            });
        };

        data_rows += 1;
        let score = match score.parse::<f64>() {
            Ok(score) if score.is_nan().not() => score,
            _ if data_rows == 1 => {
                debug!("skipping header at line {line_number}");
                continue;
            }
            _ => {
                return Err(Error::InvalidScore {
                    line: line_number,
                    score: score.to_owned(),
                })
            }
        };

        if score < confidence_threshold {
            filtered += 1;
            continue;
        }

        if graph.add_interaction(protein1, protein2, score).not() {
            self_loops += 1;
        }
    }

    debug!(
        filtered,
        self_loops, "interactions discarded while loading the PPI network"
    );
    Ok(graph)
}

/// Reads one identifier per line, skipping blank lines.
pub fn read_gene_list(path: &Path) -> Result<Vec<String>, Error> {
    let reader = BufReader::new(File::open(path).map_err(Error::Open)?);
    read_gene_list_content(reader)
}

fn read_gene_list_content<R>(reader: R) -> Result<Vec<String>, Error>
where
    R: BufRead,
{
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) => {
                let gene = line.trim();
                gene.is_empty().not().then(|| Ok(gene.to_owned()))
            }
            Err(source) => Some(Err(Error::Read {
                line: index + 1,
                source,
            })),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to open file")]
    Open(#[source] io::Error),

    #[error("unable to read line {line}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("expected 3 whitespace-separated columns at line {line}, found {found}")]
    Columns { line: usize, found: usize },

    #[error("invalid combined score {score:?} at line {line}")]
    InvalidScore { line: usize, score: String },
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    const EDGES: &str = "\
protein1 protein2 combined_score
# comment line
A B 900
B C 700
C D 699
A A 999

D E 950
";

    #[test]
    fn read_edges() {
        let graph = read_edge_list_content(Cursor::new(EDGES), 700.).unwrap();

        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.score("A", "B"), Some(900.));
        assert_eq!(graph.score("C", "B"), Some(700.));
        assert_eq!(graph.score("C", "D"), None);
        assert!(graph.contains("E"));
        assert!(graph.contains("F").not());
    }

    #[test]
    fn threshold_drops_isolated_proteins() {
        let graph = read_edge_list_content(Cursor::new(EDGES), 901.).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains("A").not());
    }

    #[test]
    fn duplicated_interactions_collapse() {
        let content = "P1 P2 800\nP2 P1 950\nP1 P2 720\n";
        let graph = read_edge_list_content(Cursor::new(content), 700.).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.score("P1", "P2"), Some(720.));
    }

    #[test]
    fn malformed_rows() {
        let err = read_edge_list_content(Cursor::new("A B 900\nB C\n"), 700.).unwrap_err();
        assert!(matches!(err, Error::Columns { line: 2, found: 2 }));

        let err = read_edge_list_content(Cursor::new("A B 900\nB C high\n"), 700.).unwrap_err();
        assert!(matches!(err, Error::InvalidScore { line: 2, ref score } if score == "high"));

        let err =
            read_edge_list_content(Cursor::new("p1 p2 score\nA B 900\nx y score\n"), 700.)
                .unwrap_err();
        assert!(matches!(err, Error::InvalidScore { line: 3, .. }));
    }

    #[test]
    fn gzipped_edge_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt.gz");

        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(EDGES.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let graph = read_edge_list(&path, 700.).unwrap();
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn induced_edges() {
        let mut graph = PpiGraph::new();
        graph.add_interaction("A", "B", 900.);
        graph.add_interaction("B", "C", 900.);
        graph.add_interaction("A", "C", 900.);
        graph.add_interaction("C", "D", 900.);
        assert!(graph.add_interaction("D", "D", 900.).not());

        let nodes = |names: &[&str]| -> Vec<_> {
            names
                .iter()
                .map(|name| graph.node(name).unwrap())
                .collect()
        };
        let mut mask = vec![false; graph.node_count()];

        assert_eq!(graph.induced_edge_count(&nodes(&["A", "B", "C"]), &mut mask), 3);
        assert_eq!(graph.induced_edge_count(&nodes(&["A", "D"]), &mut mask), 0);
        assert_eq!(graph.induced_edge_count(&nodes(&["C", "D", "B"]), &mut mask), 2);
        assert_eq!(
            graph.induced_edge_count(&nodes(&["A", "B", "C", "D"]), &mut mask),
            graph.edge_count()
        );
        assert!(mask.iter().all(|&set| set.not()));
    }

    #[test]
    fn gene_list() {
        let genes = read_gene_list_content(Cursor::new("SHANK3\n\n  NRXN1 \r\nSHANK3\n")).unwrap();
        assert_eq!(genes, ["SHANK3", "NRXN1", "SHANK3"]);
    }

    #[test]
    fn missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_edge_list(&dir.path().join("links.txt"), 700.),
            Err(Error::Open(_))
        ));
        assert!(matches!(
            read_gene_list(&dir.path().join("genes.txt")),
            Err(Error::Open(_))
        ));
    }
}
