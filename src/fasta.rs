use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    ops::Not,
    path::Path,
};

/// Number of bases per line when writing FASTA entries.
pub const LINE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub description: String,
    pub sequence: Vec<u8>,
}

impl Record {
    /// The sequence id, that is the description up to the first whitespace.
    pub fn name(&self) -> &str {
        self.description
            .split_ascii_whitespace()
            .next()
            .unwrap_or_default()
    }
}

pub(crate) struct Entry<'a> {
    pub(crate) description: &'a str,
    pub(crate) sequence: &'a [u8],
    pub(crate) line_width: usize,
}

impl fmt::Display for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">{}", self.description)?;

        let line_width = match self.line_width {
            0 => self.sequence.len().max(1),
            line_width => line_width,
        };
        self.sequence
            .chunks(line_width)
            .try_for_each(|line| write!(f, "\n{}", String::from_utf8_lossy(line)))
    }
}

#[inline]
pub fn read_file(path: &Path) -> Result<Vec<Record>, Error> {
    let reader = BufReader::new(File::open(path).map_err(Box::new)?);
    read_file_content(reader)
}

fn read_file_content<R>(mut reader: R) -> Result<Vec<Record>, Error>
where
    R: BufRead,
{
    let mut line = String::new();
    let mut records = Vec::new();
    let mut current: Option<(usize, Record)> = None;

    let mut file_row = 0;
    loop {
        line.clear();
        file_row += 1;
        if reader.read_line(&mut line).map_err(Box::new)? == 0 {
            break;
        }

        let trimmed = line.trim();
        if let Some(description) = trimmed.strip_prefix('>') {
            if let Some(record) = current.take() {
                records.push(finish_record(record)?);
            }

            current = Some((
                file_row,
                Record {
                    description: description.trim().to_owned(),
                    sequence: Vec::new(),
                },
            ));
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match current.as_mut() {
            Some((_, record)) => record.sequence.extend(
                trimmed
                    .bytes()
                    .filter(|base| base.is_ascii_whitespace().not()),
            ),
            None => return Err(Error::SequenceBeforeHeader(file_row)),
        }
    }

    if let Some(record) = current {
        records.push(finish_record(record)?);
    }

    if records.is_empty() {
        return Err(Error::NoRecords);
    }

    Ok(records)
}

#[inline]
fn finish_record((header_row, record): (usize, Record)) -> Result<Record, Error> {
    if record.sequence.is_empty() {
        Err(Error::EmptySequence(header_row))
    } else {
        Ok(record)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sequence data before the first header at line {0}")]
    SequenceBeforeHeader(usize),

    #[error("empty sequence for the entry starting at line {0}")]
    EmptySequence(usize),

    #[error("no FASTA entries found")]
    NoRecords,

    #[error("I/O error: {0}")]
    IO(#[from] Box<io::Error>),
}
