mod indexed;
#[cfg(test)]
mod memory;

use std::io;

pub use indexed::{build_index, index_path, IndexedFasta, OpenError};
#[cfg(test)]
pub use memory::InMemoryGenome;

/// Random access to the chromosomes of a genome.
///
/// Coordinates are 0-based and half-open.
pub trait Genome {
    /// Chromosome names, in the order they appear in the genome.
    fn chromosomes(&self) -> Vec<&str>;

    fn length(&self, chromosome: &str) -> Option<u64>;

    #[inline]
    fn contains(&self, chromosome: &str) -> bool {
        self.length(chromosome).is_some()
    }

    fn substring(&self, chromosome: &str, start: u64, end: u64) -> Result<Vec<u8>, Error>;
}

#[inline]
fn check_bounds(
    chromosome: &str,
    length: Option<u64>,
    start: u64,
    end: u64,
) -> Result<(), Error> {
    let length = length.ok_or_else(|| Error::UnknownChromosome(chromosome.to_owned()))?;
    if start > end || end > length {
        return Err(Error::OutOfBounds {
            chromosome: chromosome.to_owned(),
            start,
            end,
            length,
        });
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("chromosome {0} is not part of the genome")]
    UnknownChromosome(String),

    #[error("invalid range {start}-{end} for chromosome {chromosome} of length {length}")]
    OutOfBounds {
        chromosome: String,
        start: u64,
        end: u64,
        length: u64,
    },

    #[error("I/O error while reading the genome: {0}")]
    Io(#[from] io::Error),

    #[error("genome file truncated, expected {expected} bases but got {got}")]
    Truncated { expected: u64, got: u64 },
}
