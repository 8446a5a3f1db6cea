use std::io::{self, Write};

use flate2::{write::ZlibEncoder, Compression};
use ndarray::Array1;

use crate::kmer::{fill_dense_frequencies, KmerUniverse};

/// Shannon entropy (in bits) of the symbol distribution of `sequence`.
///
/// Every distinct byte is a category of its own, ambiguity codes included.
pub fn entropy(sequence: &[u8]) -> f64 {
    if sequence.is_empty() {
        return 0.;
    }

    let mut counts = [0usize; 256];
    sequence
        .iter()
        .for_each(|&symbol| counts[usize::from(symbol)] += 1);

    #[allow(clippy::cast_precision_loss)]
    let len = sequence.len() as f64;
    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let probability = count as f64 / len;
            -probability * probability.log2()
        })
        .sum()
}

/// Ratio between the zlib-compressed size and the original size of `sequence`.
pub fn compressibility(sequence: &[u8]) -> io::Result<f64> {
    if sequence.is_empty() {
        return Ok(0.);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(sequence)?;
    let compressed = encoder.finish()?;

    #[allow(clippy::cast_precision_loss)]
    let ratio = compressed.len() as f64 / sequence.len() as f64;
    Ok(ratio)
}

/// Entropy followed by the dense kmer frequency blocks of a [`KmerUniverse`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn entropy(&self) -> f64 {
        self.0[0]
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> Option<&[f64]> {
        self.0.as_slice()
    }

    #[inline]
    fn norm(&self) -> f64 {
        self.0.dot(&self.0).sqrt()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(components: Vec<f64>) -> Self {
        Self(Array1::from_vec(components))
    }
}

pub fn feature_vector(sequence: &[u8], universe: &KmerUniverse) -> FeatureVector {
    let mut components = vec![0.; universe.dimension()];
    components[0] = entropy(sequence);

    let mut offset = 1;
    for k in universe.k_values() {
        let block_len = 1 << (2 * k);
        fill_dense_frequencies(sequence, k, &mut components[offset..(offset + block_len)]);
        offset += block_len;
    }
    debug_assert_eq!(offset, components.len());

    FeatureVector::from(components)
}

/// Cosine of the angle between two feature vectors, 0 when any of the two is a zero vector.
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    assert_eq!(
        a.len(),
        b.len(),
        "feature vectors must be built from the same kmer universe"
    );

    let norms = a.norm() * b.norm();
    if norms == 0. {
        0.
    } else {
        (a.0.dot(&b.0) / norms).clamp(-1., 1.)
    }
}
