use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    ops::Not,
    path::{Path, PathBuf},
};

use fnv::FnvHashMap;

use super::{check_bounds, Error, Genome};

/// A FASTA file with a samtools-compatible `.fai` index.
///
/// Chromosomes are never loaded as a whole, every substring is read from disk using the index.
#[derive(Debug)]
pub struct IndexedFasta {
    path: PathBuf,
    entries: Vec<IndexEntry>,
    lookup: FnvHashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub length: u64,
    pub offset: u64,
    pub line_bases: u64,
    pub line_bytes: u64,
}

impl IndexEntry {
    /// Byte offset, inside the FASTA file, of the base at position `base`.
    #[inline]
    fn byte_position(&self, base: u64) -> u64 {
        if self.line_bases == 0 {
            return self.offset;
        }

        self.offset + base / self.line_bases * self.line_bytes + base % self.line_bases
    }
}

/// Path of the index of a FASTA file, obtained by appending `.fai` to its name.
pub fn index_path(fasta: &Path) -> PathBuf {
    let mut path = fasta.as_os_str().to_owned();
    path.push(".fai");
    PathBuf::from(path)
}

impl IndexedFasta {
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        if path.is_file().not() {
            return Err(OpenError::MissingFasta(path.to_owned()));
        }

        let index = index_path(path);
        let index_file = File::open(&index).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => OpenError::MissingIndex(index.clone()),
            _ => OpenError::OpenIndex {
                path: index.clone(),
                source,
            },
        })?;

        let entries = read_index(BufReader::new(index_file))
            .map_err(|source| OpenError::InvalidIndex { path: index, source })?;

        Ok(Self::from_entries(path.to_owned(), entries))
    }

    fn from_entries(path: PathBuf, entries: Vec<IndexEntry>) -> Self {
        let lookup = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.name.clone(), index))
            .collect();

        Self {
            path,
            entries,
            lookup,
        }
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    fn entry(&self, chromosome: &str) -> Option<&IndexEntry> {
        self.lookup
            .get(chromosome)
            .map(|&index| &self.entries[index])
    }
}

impl Genome for IndexedFasta {
    fn chromosomes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    fn length(&self, chromosome: &str) -> Option<u64> {
        self.entry(chromosome).map(|entry| entry.length)
    }

    fn substring(&self, chromosome: &str, start: u64, end: u64) -> Result<Vec<u8>, Error> {
        let entry = self.entry(chromosome);
        check_bounds(chromosome, entry.map(|entry| entry.length), start, end)?;
        let Some(entry) = entry.filter(|_| start < end) else {
            return Ok(Vec::new());
        };

        let first_byte = entry.byte_position(start);
        let last_byte = entry.byte_position(end - 1) + 1;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(first_byte))?;

        let mut bases = Vec::with_capacity((end - start).try_into().unwrap_or(0));
        file.take(last_byte - first_byte).read_to_end(&mut bases)?;
        bases.retain(|&base| matches!(base, b'\n' | b'\r').not());

        let got = bases.len() as u64;
        if got != end - start {
            return Err(Error::Truncated {
                expected: end - start,
                got,
            });
        }

        Ok(bases)
    }
}

fn read_index<R: BufRead>(reader: R) -> Result<Vec<IndexEntry>, IndexError> {
    use IndexError as E;

    let mut entries = Vec::new();
    let mut names = FnvHashMap::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let row = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.trim_end().split('\t');
        let mut next_field = || fields.next().ok_or(E::MissingFields(row));
        let name = next_field()?.to_owned();
        let mut parse = |field: &'static str| -> Result<u64, IndexError> {
            next_field()?
                .parse::<u64>()
                .map_err(|_| E::InvalidField { field, line: row })
        };
        let length = parse("length")?;
        let offset = parse("offset")?;
        let line_bases = parse("line bases")?;
        let line_bytes = parse("line bytes")?;

        if (line_bases == 0 && length > 0) || line_bytes < line_bases {
            return Err(E::InvalidField {
                field: "line bases",
                line: row,
            });
        }

        if let Some(first_row) = names.insert(name.clone(), row) {
            return Err(E::DuplicatedName {
                name,
                first_row,
                row,
            });
        }

        entries.push(IndexEntry {
            name,
            length,
            offset,
            line_bases,
            line_bytes,
        });
    }

    if entries.is_empty() {
        return Err(E::Empty);
    }

    Ok(entries)
}

/// Builds the `.fai` index of a FASTA file, returning the path of the index.
pub fn build_index(fasta: &Path) -> Result<PathBuf, IndexError> {
    let reader = BufReader::new(File::open(fasta)?);
    let entries = build_index_entries(reader)?;
    if entries.is_empty() {
        return Err(IndexError::Empty);
    }

    let path = index_path(fasta);
    let mut writer = BufWriter::new(File::create(&path)?);
    write_index(&entries, &mut writer)?;
    writer.flush()?;

    Ok(path)
}

fn write_index<W: Write>(entries: &[IndexEntry], mut writer: W) -> io::Result<()> {
    entries.iter().try_for_each(|entry| {
        let IndexEntry {
            name,
            length,
            offset,
            line_bases,
            line_bytes,
        } = entry;
        writeln!(
            writer,
            "{name}\t{length}\t{offset}\t{line_bases}\t{line_bytes}"
        )
    })
}

struct EntryBuilder {
    entry: IndexEntry,
    short_line_seen: bool,
}

impl EntryBuilder {
    fn new(name: String, offset: u64) -> Self {
        Self {
            entry: IndexEntry {
                name,
                length: 0,
                offset,
                line_bases: 0,
                line_bytes: 0,
            },
            short_line_seen: false,
        }
    }

    fn push_line(
        &mut self,
        bases: u64,
        bytes: u64,
        terminated: bool,
        row: usize,
    ) -> Result<(), IndexError> {
        let entry = &mut self.entry;
        if bases == 0 {
            self.short_line_seen = true;
            return Ok(());
        }

        if entry.line_bases == 0 {
            entry.line_bases = bases;
            entry.line_bytes = bytes;
        } else if self.short_line_seen
            || bases > entry.line_bases
            || (terminated && bases == entry.line_bases && bytes != entry.line_bytes)
        {
            return Err(IndexError::InconsistentLineLength {
                name: entry.name.clone(),
                row,
            });
        }

        if bases < entry.line_bases {
            self.short_line_seen = true;
        }
        entry.length += bases;

        Ok(())
    }
}

fn build_index_entries<R: BufRead>(mut reader: R) -> Result<Vec<IndexEntry>, IndexError> {
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    let mut line = Vec::new();
    let mut offset = 0u64;
    let mut row = 0;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        row += 1;
        offset += read as u64;

        if let Some(header) = line.strip_prefix(b">") {
            entries.extend(current.take().map(|builder| builder.entry));
            let name = std::str::from_utf8(header)
                .ok()
                .and_then(|header| header.split_ascii_whitespace().next())
                .ok_or(IndexError::MissingName(row))?;
            current = Some(EntryBuilder::new(name.to_owned(), offset));
            continue;
        }

        let line_ending = line
            .iter()
            .rev()
            .take_while(|&&byte| matches!(byte, b'\n' | b'\r'))
            .count();
        let bases = (line.len() - line_ending) as u64;

        match current.as_mut() {
            Some(builder) => builder.push_line(bases, read as u64, line.ends_with(b"\n"), row)?,
            None if bases == 0 => {}
            None => return Err(IndexError::SequenceBeforeHeader(row)),
        }
    }
    entries.extend(current.map(|builder| builder.entry));

    Ok(entries)
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("genome file {} does not exist", .0.display())]
    MissingFasta(PathBuf),

    #[error("genome index {} does not exist", .0.display())]
    MissingIndex(PathBuf),

    #[error("unable to open genome index {}", path.display())]
    OpenIndex {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid genome index {}", path.display())]
    InvalidIndex {
        path: PathBuf,
        #[source]
        source: IndexError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("expected 5 tab-separated fields at line {0}")]
    MissingFields(usize),

    #[error("invalid {field} at line {line}")]
    InvalidField { field: &'static str, line: usize },

    #[error("sequence {name} at line {row} was already defined at line {first_row}")]
    DuplicatedName {
        name: String,
        first_row: usize,
        row: usize,
    },

    #[error("the index does not contain any sequence")]
    Empty,

    #[error("sequence data before the first header at line {0}")]
    SequenceBeforeHeader(usize),

    #[error("missing or invalid sequence name at line {0}")]
    MissingName(usize),

    #[error("inconsistent line length for sequence {name} at line {row}")]
    InconsistentLineLength { name: String, row: usize },
}
