//! Per-haplotype output files
//!
//! Each bin gets one FASTA or FASTQ file, optionally gzip-compressed. Records
//! keep their header, bases and quality string as read, with each sequence on
//! a single line.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use triobin_lib::builder::ReadRecord;
use triobin_lib::Haplotype;

/// Sequence file flavour of the output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// `>id\nseq\n`
    Fasta,
    /// `@id\nseq\n+\nqual\n`
    Fastq,
}

impl OutputFormat {
    /// Guess the format from a reads file name (`.gz` is ignored)
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let name = name.strip_suffix(".gz").unwrap_or(name);
        let ext = Path::new(name).extension()?.to_str()?;
        match ext {
            "fa" | "fasta" | "fna" => Some(OutputFormat::Fasta),
            "fq" | "fastq" => Some(OutputFormat::Fastq),
            _ => None,
        }
    }

    /// Format of an already parsed record
    pub fn of_record(record: &ReadRecord) -> Self {
        if record.is_fastq() {
            OutputFormat::Fastq
        } else {
            OutputFormat::Fasta
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Fasta => "fa",
            OutputFormat::Fastq => "fq",
        }
    }
}

/// `<prefix>.<ext>[.gz]`
///
/// The extension of the input file is reused when it has a recognised one,
/// so `reads.fastq.gz` produces `hapA.fastq` (plus `.gz` when compressing).
pub fn output_path(prefix: &str, input: &Path, format: OutputFormat, compress: bool) -> PathBuf {
    let ext = input
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(".gz").unwrap_or(n))
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|_| OutputFormat::from_path(input) == Some(format))
        .unwrap_or(format.extension());

    let mut name = format!("{}.{}", prefix, ext);
    if compress {
        name.push_str(".gz");
    }
    PathBuf::from(name)
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn create(path: &Path, compress: bool) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        Ok(if compress {
            Sink::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            Sink::Plain(writer)
        })
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w,
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Sink::Plain(mut w) => w.flush(),
            Sink::Gzip(w) => w.finish()?.flush(),
        }
    }
}

/// Write one record in its own format
pub fn write_record<W: Write + ?Sized>(writer: &mut W, record: &ReadRecord) -> io::Result<()> {
    match &record.qual {
        Some(qual) => {
            writer.write_all(b"@")?;
            writer.write_all(&record.id)?;
            writer.write_all(b"\n")?;
            writer.write_all(&record.seq)?;
            writer.write_all(b"\n+\n")?;
            writer.write_all(qual)?;
            writer.write_all(b"\n")
        }
        None => {
            writer.write_all(b">")?;
            writer.write_all(&record.id)?;
            writer.write_all(b"\n")?;
            writer.write_all(&record.seq)?;
            writer.write_all(b"\n")
        }
    }
}

/// Output prefixes of the three bins
#[derive(Clone, Debug)]
pub struct BinPrefixes {
    pub hap_a: String,
    pub hap_b: String,
    pub unclassified: String,
}

/// Open output files for the three bins
pub struct BinWriters {
    hap_a: Sink,
    hap_b: Sink,
    unclassified: Sink,
    paths: [PathBuf; 3],
}

impl BinWriters {
    /// Create the three output files
    pub fn create(prefixes: &BinPrefixes, input: &Path, format: OutputFormat, compress: bool) -> Result<Self> {
        let paths = [
            output_path(&prefixes.hap_a, input, format, compress),
            output_path(&prefixes.hap_b, input, format, compress),
            output_path(&prefixes.unclassified, input, format, compress),
        ];
        Ok(Self {
            hap_a: Sink::create(&paths[0], compress)?,
            hap_b: Sink::create(&paths[1], compress)?,
            unclassified: Sink::create(&paths[2], compress)?,
            paths,
        })
    }

    /// Paths of the A, B and unclassified files
    pub fn paths(&self) -> &[PathBuf; 3] {
        &self.paths
    }

    /// Append `record` to the file of its bin
    pub fn write(&mut self, haplotype: Haplotype, record: &ReadRecord) -> Result<()> {
        let (sink, path) = match haplotype {
            Haplotype::A => (&mut self.hap_a, &self.paths[0]),
            Haplotype::B => (&mut self.hap_b, &self.paths[1]),
            Haplotype::Unclassified => (&mut self.unclassified, &self.paths[2]),
        };
        write_record(sink.writer(), record).with_context(|| format!("Failed to write to {}", path.display()))
    }

    /// Flush every file and write gzip trailers
    pub fn finish(self) -> Result<()> {
        let Self { hap_a, hap_b, unclassified, paths } = self;
        for (sink, path) in [hap_a, hap_b, unclassified].into_iter().zip(paths.iter()) {
            sink.finish().with_context(|| format!("Failed to finish {}", path.display()))?;
        }
        Ok(())
    }
}
