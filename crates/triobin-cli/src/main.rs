use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use triobin_lib::builder::{for_each_kmer_chunk, for_each_read_batch, open_kmer_list, ReadRecord};
use triobin_lib::constants::{DEFAULT_BATCH_SIZE, KMER_CHUNK_SIZE};
use triobin_lib::encoding::reverse_complement;
use triobin_lib::{
    BinSummary, BuildConfiguration, ClassificationOutcome, DecisionRule, KmerSetBuilder, ReadClassifier,
};

mod sink;

use sink::{BinPrefixes, BinWriters, OutputFormat};

#[derive(Parser)]
#[command(name = "triobin")]
#[command(version = "0.1.0")]
#[command(about = "Trio binning: assign reads to parental haplotypes by k-mer membership", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify reads into haplotype A, haplotype B or unclassified
    Classify {
        /// K-mers unique to haplotype A, one per line
        #[arg(short = 'a', long = "hapA-kmers")]
        hap_a_kmers: PathBuf,

        /// K-mers unique to haplotype B, one per line
        #[arg(short = 'b', long = "hapB-kmers")]
        hap_b_kmers: PathBuf,

        /// FASTA/FASTQ reads to classify (may be gzipped)
        #[arg(short = 'i', long = "input-reads")]
        input: PathBuf,

        /// Prefix for haplotype A output
        #[arg(short = 'A', long = "hapA-out-prefix", default_value = "hapA")]
        hap_a_prefix: String,

        /// Prefix for haplotype B output
        #[arg(short = 'B', long = "hapB-out-prefix", default_value = "hapB")]
        hap_b_prefix: String,

        /// Prefix for unclassified output
        #[arg(short = 'U', long = "hapU-out-prefix", default_value = "hapU")]
        hap_u_prefix: String,

        /// Number of threads (0 = all available cores)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Gzip the output files
        #[arg(short = 'c', long)]
        compress_output: bool,

        /// The winning score must exceed the other by more than this
        #[arg(long, default_value = "0")]
        min_margin: f64,

        /// The winning haplotype needs at least this many k-mer hits
        #[arg(long, default_value = "0")]
        min_count: u32,

        /// Compare raw counts instead of counts scaled by parental set size
        #[arg(long)]
        no_scaling: bool,

        /// Match k-mers on the forward strand only
        #[arg(long)]
        forward_only: bool,

        /// Reads classified per parallel batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Check that every k-mer of a list is found after building its set
    Check {
        /// K-mer list, one per line
        #[arg(short = 'k', long)]
        kmers: PathBuf,

        /// Number of threads (0 = all available cores)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Match k-mers on the forward strand only
        #[arg(long)]
        forward_only: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            hap_a_kmers,
            hap_b_kmers,
            input,
            hap_a_prefix,
            hap_b_prefix,
            hap_u_prefix,
            threads,
            compress_output,
            min_margin,
            min_count,
            no_scaling,
            forward_only,
            batch_size,
        } => {
            let prefixes = BinPrefixes {
                hap_a: hap_a_prefix,
                hap_b: hap_b_prefix,
                unclassified: hap_u_prefix,
            };
            let rule = DecisionRule {
                min_margin,
                min_count,
                scale_by_set_size: !no_scaling,
            };
            let config = BuildConfiguration {
                canonical: !forward_only,
                ..BuildConfiguration::with_threads(threads)
            };
            classify_command(&hap_a_kmers, &hap_b_kmers, &input, &prefixes, config, rule, compress_output, batch_size)?;
        }
        Commands::Check { kmers, threads, forward_only } => {
            let config = BuildConfiguration {
                canonical: !forward_only,
                ..BuildConfiguration::with_threads(threads)
            };
            check_command(&kmers, config)?;
        }
    }

    Ok(())
}

/// Build both haplotype sets and bin every read of `input`
#[allow(clippy::too_many_arguments)]
fn classify_command(
    hap_a_kmers: &Path,
    hap_b_kmers: &Path,
    input: &Path,
    prefixes: &BinPrefixes,
    config: BuildConfiguration,
    rule: DecisionRule,
    compress: bool,
    batch_size: usize,
) -> anyhow::Result<()> {
    info!("Classifying reads by k-mers...");
    info!("  Haplotype A k-mers: {}", hap_a_kmers.display());
    info!("  Haplotype B k-mers: {}", hap_b_kmers.display());
    info!("  Reads: {}", input.display());
    info!(
        "  Decision rule: margin > {}, min count {}, scaling {}",
        rule.min_margin,
        rule.min_count,
        if rule.scale_by_set_size { "on" } else { "off" }
    );

    // classify_batch runs on the global pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
        .context("Failed to configure the global thread pool")?;

    let builder = KmerSetBuilder::new(config)?;
    let (hap_a, hap_b) = builder.build_pair_from_files(hap_a_kmers, hap_b_kmers)?;
    let classifier = ReadClassifier::new(&hap_a, &hap_b)?.with_rule(rule)?;
    let scaling = classifier.scaling();
    debug!("Scaling factors: A={:.4}, B={:.4}", scaling.hap_a, scaling.hap_b);

    let known_format = OutputFormat::from_path(input);
    if known_format.is_none() {
        warn!(
            "Cannot tell FASTA from FASTQ by the name of {}; using the format of the first record",
            input.display()
        );
    }

    let mut writers: Option<BinWriters> = None;
    let mut summary = BinSummary::new();
    let stdout = std::io::stdout();
    let mut report = BufWriter::new(stdout.lock());

    info!("Classifying reads in batches of {}...", batch_size);
    let total = for_each_read_batch(input, batch_size, |batch| {
        let writers = match &mut writers {
            Some(w) => w,
            slot @ None => {
                let format = known_format.unwrap_or_else(|| OutputFormat::of_record(&batch[0]));
                slot.insert(BinWriters::create(prefixes, input, format, compress)?)
            }
        };

        let seqs: Vec<Vec<u8>> = batch.iter().map(ReadRecord::normalized_seq).collect();
        let outcomes = classifier.classify_batch(&seqs);

        for (record, outcome) in batch.iter().zip(&outcomes) {
            writers.write(outcome.haplotype, record)?;
            write_assignment(&mut report, record, outcome)?;
            summary.add(outcome);
        }
        debug!("  {} reads classified", summary.total());
        Ok(())
    })?;

    report.flush().context("Failed to write read assignments")?;

    let writers = match writers {
        Some(w) => w,
        None => {
            warn!("No reads in {}", input.display());
            let format = known_format.unwrap_or(OutputFormat::Fasta);
            BinWriters::create(prefixes, input, format, compress)?
        }
    };
    for path in writers.paths() {
        info!("  Wrote {}", path.display());
    }
    writers.finish()?;

    info!("Classified {} reads", total);
    summary.print_summary();

    Ok(())
}

/// `id<TAB>label<TAB>scoreA<TAB>scoreB`, with the id cut at the first whitespace
fn write_assignment<W: Write>(out: &mut W, record: &ReadRecord, outcome: &ClassificationOutcome) -> anyhow::Result<()> {
    let name = record
        .id
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or(&record.id);
    writeln!(
        out,
        "{}\t{}\t{}\t{}",
        String::from_utf8_lossy(name),
        outcome.haplotype,
        outcome.score_a,
        outcome.score_b
    )
    .context("Failed to write read assignment")
}

/// Build one set and verify every listed k-mer is a member
///
/// The list is streamed twice: once to build the set, once to check it.
fn check_command(kmers: &Path, config: BuildConfiguration) -> anyhow::Result<()> {
    let canonical = config.canonical;
    let builder = KmerSetBuilder::new(config)?;
    let set = builder.build_from_file(kmers)?;
    info!(
        "Built set: k={}, {} distinct ({} duplicates), {} slots, load {:.3}",
        set.k(),
        set.len(),
        set.num_duplicates(),
        set.capacity(),
        set.load_factor()
    );

    let mut missing = 0usize;
    let total = for_each_kmer_chunk(open_kmer_list(kmers)?, KMER_CHUNK_SIZE, |chunk| {
        for (line, kmer) in chunk {
            let mut found = set.contains(kmer);
            if found && canonical {
                found = set.contains(reverse_complement(kmer)?);
            }
            if !found {
                missing += 1;
                if missing <= 10 {
                    warn!("  line {}: {} -> NOT FOUND", line, kmer);
                }
            }
        }
        Ok(())
    })?;

    if missing > 0 {
        bail!("{} of {} k-mers not found", missing, total);
    }
    info!("All {} k-mers found", total);
    Ok(())
}
