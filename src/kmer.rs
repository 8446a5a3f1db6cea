use std::{collections::BTreeMap, iter};

use fnv::FnvHashMap;
use itertools::Itertools;

pub const BASES: [u8; 4] = *b"ACGT";

/// Largest supported kmer length. A single k block holds 4^k components.
pub const MAX_K: usize = 8;

/// All the possible kmers over the `ACGT` alphabet, for a fixed set of kmer lengths.
///
/// Every feature vector that is going to be compared with another must be built from the same
/// universe, because the universe fixes the position of each component. Lengths are kept in
/// ascending order and each block is sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerUniverse {
    blocks: Vec<KmerBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct KmerBlock {
    k: usize,
    kmers: Vec<String>,
}

impl KmerUniverse {
    pub fn new<I>(k_values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = usize>,
    {
        let k_values = k_values.into_iter().sorted_unstable().dedup();

        let blocks = k_values
            .map(|k| {
                if (1..=MAX_K).contains(&k) {
                    Ok(KmerBlock {
                        k,
                        kmers: enumerate_kmers(k),
                    })
                } else {
                    Err(Error::InvalidK(k))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if blocks.is_empty() {
            return Err(Error::NoKValues);
        }

        Ok(Self { blocks })
    }

    /// The kmer lengths, in ascending order.
    pub fn k_values(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.blocks.iter().map(|block| block.k)
    }

    #[cfg(test)]
    pub fn kmers(&self, k: usize) -> Option<&[String]> {
        self.blocks
            .iter()
            .find(|block| block.k == k)
            .map(|block| block.kmers.as_slice())
    }

    /// Length of the feature vectors built from this universe: the entropy plus one component for
    /// each kmer of each length.
    pub fn dimension(&self) -> usize {
        1 + self
            .blocks
            .iter()
            .map(|block| block.kmers.len())
            .sum::<usize>()
    }
}

fn enumerate_kmers(k: usize) -> Vec<String> {
    let mut kmers: Vec<String> = iter::repeat(BASES)
        .take(k)
        .multi_cartesian_product()
        .map(|kmer| kmer.into_iter().map(char::from).collect())
        .collect();

    kmers.sort_unstable();
    kmers
}

#[inline]
fn base_code(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Rolling 2-bit encoding of every kmer made only of `ACGT` bases.
///
/// With `A < C < G < T` the code of a kmer is its index inside the lexicographically sorted
/// block of the universe. Kmers containing any other symbol are not yielded.
pub(crate) fn kmer_codes(sequence: &[u8], k: usize) -> impl Iterator<Item = usize> + '_ {
    debug_assert!((1..=MAX_K).contains(&k));

    let mask = (1usize << (2 * k)) - 1;
    let mut code = 0;
    let mut valid_bases = 0;
    sequence
        .iter()
        .filter_map(move |&base| match base_code(base) {
            Some(base_code) => {
                code = ((code << 2) | base_code) & mask;
                valid_bases = (valid_bases + 1).min(k);
                (valid_bases == k).then_some(code)
            }
            None => {
                valid_bases = 0;
                None
            }
        })
}

/// Number of kmers of length `k` that can be extracted from a sequence of `len` symbols.
#[inline]
fn total_kmers(len: usize, k: usize) -> Option<usize> {
    len.checked_sub(k).map(|room| room + 1)
}

/// Frequencies of the kmers observed in `sequence`, normalized by the number of extracted kmers.
///
/// Only the observed kmers are reported, and any symbol is allowed inside a kmer. An empty map is
/// returned when the sequence is shorter than `k`.
pub fn kmer_frequencies(sequence: &[u8], k: usize) -> BTreeMap<String, f64> {
    let total = match total_kmers(sequence.len(), k) {
        Some(total) if k > 0 => total,
        _ => return BTreeMap::new(),
    };

    let mut counts = FnvHashMap::<&[u8], usize>::default();
    for kmer in sequence.windows(k) {
        *counts.entry(kmer).or_default() += 1;
    }

    // It is fine to lose precision on huge counts
    #[allow(clippy::cast_precision_loss)]
    let total = total as f64;
    // Lossy conversion can map distinct invalid kmers to the same key
    let mut frequencies = BTreeMap::new();
    for (kmer, count) in counts {
        *frequencies
            .entry(String::from_utf8_lossy(kmer).into_owned())
            .or_insert(0.) += count as f64 / total;
    }
    frequencies
}

/// Dense frequencies over the whole `ACGT` universe for `k`, in lexicographic kmer order.
///
/// The normalization uses all the extracted kmers, including the ones containing ambiguous
/// symbols that have no component in the block. A sequence shorter than `k` gives a zero block.
#[cfg(test)]
pub fn dense_kmer_frequencies(sequence: &[u8], k: usize) -> Vec<f64> {
    let mut block = vec![0.; 1 << (2 * k)];
    fill_dense_frequencies(sequence, k, &mut block);
    block
}

pub(crate) fn fill_dense_frequencies(sequence: &[u8], k: usize, block: &mut [f64]) {
    assert_eq!(block.len(), 1 << (2 * k));

    block.fill(0.);
    let Some(total) = total_kmers(sequence.len(), k) else {
        return;
    };

    for code in kmer_codes(sequence, k) {
        block[code] += 1.;
    }

    #[allow(clippy::cast_precision_loss)]
    let total = total as f64;
    block.iter_mut().for_each(|frequency| *frequency /= total);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("at least one kmer length is required")]
    NoKValues,

    #[error("invalid kmer length {0}, expected a value between 1 and {MAX_K}")]
    InvalidK(usize),
}
