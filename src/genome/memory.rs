use super::{check_bounds, Error, Genome};

/// A genome entirely held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenome {
    chromosomes: Vec<(String, Vec<u8>)>,
}

impl InMemoryGenome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chromosome, replacing any existing one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, sequence: impl Into<Vec<u8>>) {
        let name = name.into();
        let sequence = sequence.into();
        match self
            .chromosomes
            .iter_mut()
            .find(|(chromosome, _)| *chromosome == name)
        {
            Some((_, old_sequence)) => *old_sequence = sequence,
            None => self.chromosomes.push((name, sequence)),
        }
    }

    #[must_use]
    pub fn with_chromosome(mut self, name: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        self.insert(name, sequence);
        self
    }

    fn sequence(&self, chromosome: &str) -> Option<&[u8]> {
        self.chromosomes
            .iter()
            .find(|(name, _)| name == chromosome)
            .map(|(_, sequence)| sequence.as_slice())
    }
}

impl Genome for InMemoryGenome {
    fn chromosomes(&self) -> Vec<&str> {
        self.chromosomes
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn length(&self, chromosome: &str) -> Option<u64> {
        self.sequence(chromosome)
            .map(|sequence| sequence.len() as u64)
    }

    fn substring(&self, chromosome: &str, start: u64, end: u64) -> Result<Vec<u8>, Error> {
        check_bounds(chromosome, self.length(chromosome), start, end)?;

        // Bounds are checked against an in-memory length
        #[allow(clippy::cast_possible_truncation)]
        let range = (start as usize)..(end as usize);
        Ok(self
            .sequence(chromosome)
            .map(|sequence| sequence[range].to_vec())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Not;

    use super::*;

    #[test]
    fn random_access() {
        let genome = InMemoryGenome::new()
            .with_chromosome("chr1", "ACGTACGT")
            .with_chromosome("chr2", "NNNN");

        assert_eq!(genome.chromosomes(), ["chr1", "chr2"]);
        assert!(genome.contains("chr2"));
        assert!(genome.contains("chr3").not());
        assert_eq!(genome.length("chr1"), Some(8));
        assert_eq!(genome.substring("chr1", 2, 6).unwrap(), b"GTAC");
        assert_eq!(genome.substring("chr1", 8, 8).unwrap(), b"");
    }

    #[test]
    fn insert_replaces_chromosome() {
        let mut genome = InMemoryGenome::new().with_chromosome("chr1", "ACGT");
        genome.insert("chr1", "AC");

        assert_eq!(genome.chromosomes(), ["chr1"]);
        assert_eq!(genome.length("chr1"), Some(2));
    }

    #[test]
    fn invalid_ranges() {
        let genome = InMemoryGenome::new().with_chromosome("chr1", "ACGT");

        assert!(matches!(
            genome.substring("chr2", 0, 1),
            Err(Error::UnknownChromosome(name)) if name == "chr2"
        ));
        assert!(matches!(
            genome.substring("chr1", 2, 5),
            Err(Error::OutOfBounds { length: 4, .. })
        ));
        assert!(matches!(
            genome.substring("chr1", 3, 2),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
