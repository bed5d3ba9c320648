//! K-mer list and FASTA/FASTQ read parsing
//!
//! K-mer lists are plain text, one k-mer per line. Reads come from FASTA or
//! FASTQ files with transparent gzip decompression.

use crate::constants::DEFAULT_BATCH_SIZE;
use anyhow::{Context, Result};
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_file;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Open a k-mer list for buffered reading
pub fn open_kmer_list<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open k-mer list: {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Stream a k-mer list and call `callback` with chunks of at most
/// `chunk_size` `(line_number, kmer)` pairs
///
/// Line numbers are 1-based. Surrounding whitespace (including a trailing
/// `\r`) is trimmed and blank lines are skipped. No validation happens here;
/// that is left to [`KmerSet::build_numbered`](crate::KmerSet::build_numbered).
///
/// Returns the number of k-mers read.
pub fn for_each_kmer_chunk<R, F>(reader: R, chunk_size: usize, mut callback: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(&[(usize, String)]) -> Result<()>,
{
    let chunk_size = chunk_size.max(1);
    let mut chunk = Vec::with_capacity(chunk_size.min(DEFAULT_BATCH_SIZE));
    let mut total = 0usize;
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("I/O error at line {}", idx + 1))?;
        let kmer = line.trim();
        if kmer.is_empty() {
            skipped += 1;
            continue;
        }
        chunk.push((idx + 1, kmer.to_string()));
        total += 1;

        if chunk.len() == chunk_size {
            callback(&chunk)?;
            chunk.clear();
        }
    }

    if !chunk.is_empty() {
        callback(&chunk)?;
    }
    if skipped > 0 {
        debug!("Skipped {} blank lines", skipped);
    }
    Ok(total)
}

/// One FASTA/FASTQ record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// Header line without the leading `>`/`@`
    pub id: Vec<u8>,
    /// Sequence as stored in the file
    pub seq: Vec<u8>,
    /// Quality string (FASTQ only)
    pub qual: Option<Vec<u8>>,
}

impl ReadRecord {
    /// Whether the record came from a FASTQ file
    pub fn is_fastq(&self) -> bool {
        self.qual.is_some()
    }

    /// Sequence with soft-masked (lower case) bases upper-cased
    pub fn normalized_seq(&self) -> Vec<u8> {
        self.seq.to_ascii_uppercase()
    }
}

/// Parse a FASTA/FASTQ file and call `callback` with batches of at most
/// `batch_size` records, in file order
///
/// Returns the total number of records read. A file with no records at all
/// reads as zero records.
///
/// # Errors
/// Returns error if:
/// - File cannot be opened
/// - File format is invalid
/// - `callback` fails
pub fn for_each_read_batch<P, F>(path: P, batch_size: usize, mut callback: F) -> Result<u64>
where
    P: AsRef<Path>,
    F: FnMut(&[ReadRecord]) -> Result<()>,
{
    let path = path.as_ref();
    let batch_size = batch_size.max(1);

    // needletail automatically handles gzip decompression
    let mut reader = match parse_fastx_file(path) {
        Ok(reader) => reader,
        Err(e) if e.kind == ParseErrorKind::EmptyFile => {
            debug!("{} contains no records", path.display());
            return Ok(0);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to open sequence file: {}", path.display())),
    };

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0u64;

    while let Some(record) = reader.next() {
        let record = record.with_context(|| format!("Failed to parse sequence record in {}", path.display()))?;
        batch.push(ReadRecord {
            id: record.id().to_vec(),
            seq: record.seq().into_owned(),
            qual: record.qual().map(<[u8]>::to_vec),
        });
        total += 1;

        if batch.len() == batch_size {
            callback(&batch)?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        callback(&batch)?;
    }

    Ok(total)
}
