use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use serde::{Serialize, Serializer};
use tabled::{settings::Style, Table, Tabled};

use crate::{
    fasta,
    genome::{self, Genome},
    scanner::CandidateRegion,
};

/// A candidate region with its rank-based name.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRegion {
    pub name: String,
    pub region: CandidateRegion,
}

#[inline]
fn island_name(rank: usize) -> String {
    format!("island_{rank:04}")
}

/// Sorts the regions by descending similarity and names them `island_0001`, `island_0002`...
///
/// Regions with the same similarity keep the order in which they were found.
pub fn rank(mut regions: Vec<CandidateRegion>) -> Vec<RankedRegion> {
    regions.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    regions
        .into_iter()
        .enumerate()
        .map(|(index, region)| RankedRegion {
            name: island_name(index + 1),
            region,
        })
        .collect()
}

const BED_HEADER: [&str; 6] = ["#chrom", "start", "end", "name", "score", "strand"];

#[derive(Debug, Serialize)]
struct BedRecord<'a> {
    chromosome: &'a str,

    start: u64,

    end: u64,

    name: &'a str,

    #[serde(serialize_with = "serialize_score")]
    score: f64,

    strand: &'static str,
}

fn serialize_score<S>(score: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&format_args!("{score:.4}"))
}

impl<'a> From<&'a RankedRegion> for BedRecord<'a> {
    fn from(ranked: &'a RankedRegion) -> Self {
        let RankedRegion { name, region } = ranked;
        Self {
            chromosome: &region.chromosome,
            start: region.start,
            end: region.end,
            name,
            score: region.similarity,
            strand: ".",
        }
    }
}

/// Writes the regions as a tab-separated BED-like table. The header is always written.
pub fn write_bed<W: Write>(regions: &[RankedRegion], writer: W) -> Result<(), Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(BED_HEADER)?;

    regions
        .iter()
        .try_for_each(|region| writer.serialize(BedRecord::from(region)))?;
    writer.flush().map_err(Error::Write)
}

pub fn write_bed_file(regions: &[RankedRegion], path: &Path) -> Result<(), Error> {
    let file = File::create(path).map_err(Error::Create)?;
    write_bed(regions, BufWriter::new(file))
}

#[derive(Debug, Tabled)]
struct SummaryRow<'a> {
    #[tabled(rename = "Name")]
    name: &'a str,

    #[tabled(rename = "Chromosome")]
    chromosome: Arc<str>,

    #[tabled(rename = "Start")]
    start: u64,

    #[tabled(rename = "End")]
    end: u64,

    #[tabled(rename = "Similarity", display_with = "display_similarity")]
    similarity: f64,
}

fn display_similarity(similarity: &f64) -> String {
    format!("{similarity:.4}")
}

/// Human readable table of the `top` best ranked regions.
pub fn summary_table(regions: &[RankedRegion], top: usize) -> String {
    let rows = regions.iter().take(top).map(|ranked| SummaryRow {
        name: &ranked.name,
        chromosome: Arc::clone(&ranked.region.chromosome),
        start: ranked.region.start,
        end: ranked.region.end,
        similarity: ranked.region.similarity,
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Writes the sequences of the regions as FASTA entries, in rank order.
pub fn write_islands_fasta<G, W>(
    genome: &G,
    regions: &[RankedRegion],
    mut writer: W,
) -> Result<(), Error>
where
    G: Genome + ?Sized,
    W: Write,
{
    for RankedRegion { name, region } in regions {
        let sequence = genome
            .substring(&region.chromosome, region.start, region.end)
            .map_err(|source| Error::Extract {
                name: name.clone(),
                source,
            })?;

        let description = format!(
            "{name} {}:{}-{} similarity={:.4}",
            region.chromosome, region.start, region.end, region.similarity
        );
        writeln!(
            writer,
            "{}",
            fasta::Entry {
                description: &description,
                sequence: &sequence,
                line_width: fasta::LINE_WIDTH,
            }
        )
        .map_err(Error::Write)?;
    }

    writer.flush().map_err(Error::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to create output file")]
    Create(#[source] io::Error),

    #[error("unable to write regions")]
    Write(#[source] io::Error),

    #[error("unable to serialize regions")]
    Serialize(#[from] csv::Error),

    #[error("unable to extract the sequence of {name}")]
    Extract {
        name: String,
        #[source]
        source: genome::Error,
    },
}

#[cfg(test)]
mod tests {
    use std::ops::Not;

    use crate::genome::InMemoryGenome;

    use super::*;

    fn region(chromosome: &str, start: u64, similarity: f64) -> CandidateRegion {
        CandidateRegion {
            chromosome: Arc::from(chromosome),
            start,
            end: start + 8,
            similarity,
        }
    }

    #[test]
    fn ranking_by_similarity() {
        let ranked = rank(vec![
            region("chr1", 0, 0.86),
            region("chr2", 50, 0.99),
            region("chr1", 100, 0.91),
        ]);

        let names: Vec<_> = ranked.iter().map(|ranked| ranked.name.as_str()).collect();
        assert_eq!(names, ["island_0001", "island_0002", "island_0003"]);

        let starts: Vec<_> = ranked.iter().map(|ranked| ranked.region.start).collect();
        assert_eq!(starts, [50, 100, 0]);
    }

    #[test]
    fn ranking_ties_are_stable() {
        let ranked = rank(vec![
            region("chr1", 0, 0.9),
            region("chr1", 50, 0.95),
            region("chr2", 0, 0.9),
            region("chr1", 100, 0.9),
        ]);

        let positions: Vec<_> = ranked
            .iter()
            .map(|ranked| (&*ranked.region.chromosome, ranked.region.start))
            .collect();
        assert_eq!(
            positions,
            [("chr1", 50), ("chr1", 0), ("chr2", 0), ("chr1", 100)]
        );
    }

    #[test]
    fn bed_output() {
        let ranked = rank(vec![region("chr1", 0, 0.912_345), region("chrX", 150, 1.)]);

        let mut output = Vec::new();
        write_bed(&ranked, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "#chrom\tstart\tend\tname\tscore\tstrand\n\
             chrX\t150\t158\tisland_0001\t1.0000\t.\n\
             chr1\t0\t8\tisland_0002\t0.9123\t.\n"
        );
    }

    #[test]
    fn bed_output_without_regions() {
        let mut output = Vec::new();
        write_bed(&[], &mut output).unwrap();
        assert_eq!(output, b"#chrom\tstart\tend\tname\tscore\tstrand\n");
    }

    #[test]
    fn summary_contains_top_regions() {
        let ranked = rank(vec![
            region("chr1", 0, 0.9),
            region("chr2", 0, 0.95),
            region("chr3", 0, 0.87),
        ]);

        let table = summary_table(&ranked, 2);
        assert!(table.contains("island_0001"));
        assert!(table.contains("island_0002"));
        assert!(table.contains("island_0003").not());
        assert!(table.contains("0.9500"));
    }

    #[test]
    fn island_sequences() {
        let genome = InMemoryGenome::new().with_chromosome("chr1", "AAAACCCCGGGGTTTT");
        let ranked = rank(vec![region("chr1", 4, 0.9), region("chr1", 8, 0.95)]);

        let mut output = Vec::new();
        write_islands_fasta(&genome, &ranked, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            ">island_0001 chr1:8-16 similarity=0.9500\nGGGGTTTT\n\
             >island_0002 chr1:4-12 similarity=0.9000\nCCCCGGGG\n"
        );
    }

    #[test]
    fn island_outside_genome() {
        let genome = InMemoryGenome::new().with_chromosome("chr1", "ACGT");
        let ranked = rank(vec![region("chr1", 0, 0.9)]);

        assert!(matches!(
            write_islands_fasta(&genome, &ranked, io::sink()),
            Err(Error::Extract { name, .. }) if name == "island_0001"
        ));
    }
}
