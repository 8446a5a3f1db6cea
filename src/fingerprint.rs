use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    ops::Not,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    features::{compressibility, entropy, feature_vector, FeatureVector},
    kmer::{kmer_frequencies, KmerUniverse},
};

/// Informational fingerprint of a reference sequence.
///
/// Besides the descriptive statistics, the fingerprint stores the (uppercased) sequence it was
/// built from and the kmer lengths, so that the exact reference feature vector can be rebuilt
/// when scanning a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub sequence_length: usize,
    pub shannon_entropy: f64,
    pub compressibility: f64,
    pub kmer_spectrum: BTreeMap<String, BTreeMap<String, f64>>,

    #[serde(default)]
    pub k_values: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

#[inline]
pub fn spectrum_key(k: usize) -> String {
    format!("k{k}")
}

impl Fingerprint {
    pub fn from_sequence(sequence: &[u8], universe: &KmerUniverse) -> Result<Self, Error> {
        if let Some(position) = sequence.iter().position(|base| base.is_ascii().not()) {
            return Err(Error::NonAsciiSequence {
                position,
                byte: sequence[position],
            });
        }
        let sequence = sequence.to_ascii_uppercase();

        let kmer_spectrum = universe
            .k_values()
            .map(|k| (spectrum_key(k), kmer_frequencies(&sequence, k)))
            .collect();

        Ok(Self {
            sequence_length: sequence.len(),
            shannon_entropy: entropy(&sequence),
            compressibility: compressibility(&sequence).map_err(Error::Compress)?,
            kmer_spectrum,
            k_values: universe.k_values().collect(),
            sequence: Some(sequence.into_iter().map(char::from).collect()),
        })
    }

    /// Rebuilds the feature vector of the stored reference sequence.
    ///
    /// Any universe can be used, not only the one the fingerprint was built with.
    pub fn reference_vector(&self, universe: &KmerUniverse) -> Result<FeatureVector, Error> {
        let sequence = self.sequence.as_deref().ok_or(Error::MissingSequence)?;

        if sequence.len() != self.sequence_length {
            return Err(Error::InconsistentLength {
                sequence: sequence.len(),
                sequence_length: self.sequence_length,
            });
        }

        Ok(feature_vector(sequence.as_bytes(), universe))
    }
}

pub fn read_file(path: &Path) -> Result<Fingerprint, Error> {
    let reader = BufReader::new(File::open(path).map_err(Error::Open)?);
    serde_json::from_reader(reader).map_err(Error::Parse)
}

pub fn write_file(fingerprint: &Fingerprint, path: &Path) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path).map_err(Error::Create)?);
    serde_json::to_writer_pretty(&mut writer, fingerprint).map_err(Error::Serialize)?;
    writeln!(writer).map_err(Error::Write)?;
    writer.flush().map_err(Error::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to open fingerprint file")]
    Open(#[source] io::Error),

    #[error("unable to parse fingerprint file")]
    Parse(#[source] serde_json::Error),

    #[error("unable to create fingerprint file")]
    Create(#[source] io::Error),

    #[error("unable to serialize fingerprint")]
    Serialize(#[source] serde_json::Error),

    #[error("unable to write fingerprint file")]
    Write(#[source] io::Error),

    #[error("fingerprint does not contain the reference sequence")]
    MissingSequence,

    #[error(
        "fingerprint sequence has {sequence} bases, but sequence_length is {sequence_length}"
    )]
    InconsistentLength {
        sequence: usize,
        sequence_length: usize,
    },

    #[error("non-ASCII byte {byte:#04x} at position {position} of the sequence")]
    NonAsciiSequence { position: usize, byte: u8 },

    #[error("unable to evaluate sequence compressibility")]
    Compress(#[source] io::Error),
}
