//! Haplotype classification of reads
//!
//! A [`ReadClassifier`] borrows the two parental k-mer sets, counts how many
//! windows of a read hit each of them and turns the counts into a
//! [`Haplotype`] with a [`DecisionRule`]. The classifier keeps no state
//! between reads, so batches are classified in parallel.

use crate::kmer::num_windows;
use crate::kmer_set::KmerSet;
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Error type for classifier construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// The two sets were built from k-mers of different lengths
    #[error("haplotype sets use different k-mer sizes: A has k={hap_a}, B has k={hap_b}")]
    KmerSizeMismatch {
        /// k of the haplotype A set
        hap_a: usize,
        /// k of the haplotype B set
        hap_b: usize,
    },
    /// One set is canonical and the other forward-only
    #[error("haplotype sets disagree on canonical mode: A canonical={hap_a}, B canonical={hap_b}")]
    StrandModeMismatch {
        /// Mode of the haplotype A set
        hap_a: bool,
        /// Mode of the haplotype B set
        hap_b: bool,
    },
    /// The score margin must be a non-negative finite number
    #[error("invalid score margin {0}: must be finite and >= 0")]
    InvalidMargin(f64),
}

/// Bin assigned to a read
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Haplotype {
    /// Parent A
    A,
    /// Parent B
    B,
    /// Neither parent wins
    Unclassified,
}

impl Haplotype {
    /// Short label used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Haplotype::A => "A",
            Haplotype::B => "B",
            Haplotype::Unclassified => "U",
        }
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Windows of a read found in each haplotype set
///
/// A window found in both sets counts for both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KmerCounts {
    /// Hits in the haplotype A set
    pub hap_a: u32,
    /// Hits in the haplotype B set
    pub hap_b: u32,
}

/// Multipliers that put counts against sets of different size on one scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalingFactors {
    /// Factor for haplotype A counts
    pub hap_a: f64,
    /// Factor for haplotype B counts
    pub hap_b: f64,
}

impl Default for ScalingFactors {
    fn default() -> Self {
        Self { hap_a: 1.0, hap_b: 1.0 }
    }
}

impl ScalingFactors {
    /// `max(|A|, |B|) / |X|` for each set, so the larger set gets factor 1
    pub fn from_sets(hap_a: &KmerSet, hap_b: &KmerSet) -> Self {
        let a = hap_a.len().max(1) as f64;
        let b = hap_b.len().max(1) as f64;
        let max = a.max(b);
        Self {
            hap_a: max / a,
            hap_b: max / b,
        }
    }
}

/// How counts are turned into a haplotype
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionRule {
    /// The winning score must exceed the other by strictly more than this
    pub min_margin: f64,
    /// The winning haplotype needs at least this many raw hits
    pub min_count: u32,
    /// Scale counts by [`ScalingFactors::from_sets`]
    pub scale_by_set_size: bool,
}

impl Default for DecisionRule {
    fn default() -> Self {
        Self {
            min_margin: 0.0,
            min_count: 0,
            scale_by_set_size: false,
        }
    }
}

impl DecisionRule {
    /// Validate the rule parameters
    pub fn validate(&self) -> Result<(), ClassifyError> {
        if !self.min_margin.is_finite() || self.min_margin < 0.0 {
            return Err(ClassifyError::InvalidMargin(self.min_margin));
        }
        Ok(())
    }

    /// Pick a haplotype for `counts`; returns the label and both scores
    pub fn decide(&self, counts: KmerCounts, scaling: &ScalingFactors) -> (Haplotype, f64, f64) {
        let score_a = counts.hap_a as f64 * scaling.hap_a;
        let score_b = counts.hap_b as f64 * scaling.hap_b;

        let haplotype = if score_a - score_b > self.min_margin && counts.hap_a >= self.min_count {
            Haplotype::A
        } else if score_b - score_a > self.min_margin && counts.hap_b >= self.min_count {
            Haplotype::B
        } else {
            Haplotype::Unclassified
        };

        (haplotype, score_a, score_b)
    }
}

/// Result of classifying one read
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassificationOutcome {
    /// Assigned bin
    pub haplotype: Haplotype,
    /// Raw window hits
    pub counts: KmerCounts,
    /// Score for haplotype A (equals the count unless scaling is on)
    pub score_a: f64,
    /// Score for haplotype B
    pub score_b: f64,
}

/// Classifier over two borrowed haplotype sets
#[derive(Debug, Clone)]
pub struct ReadClassifier<'a> {
    hap_a: &'a KmerSet,
    hap_b: &'a KmerSet,
    rule: DecisionRule,
    scaling: ScalingFactors,
}

impl<'a> ReadClassifier<'a> {
    /// Create a classifier with the default (strict majority) rule
    ///
    /// # Errors
    /// Returns an error if the sets disagree on k or on canonical mode
    pub fn new(hap_a: &'a KmerSet, hap_b: &'a KmerSet) -> Result<Self, ClassifyError> {
        if hap_a.k() != hap_b.k() {
            return Err(ClassifyError::KmerSizeMismatch {
                hap_a: hap_a.k(),
                hap_b: hap_b.k(),
            });
        }
        if hap_a.is_canonical() != hap_b.is_canonical() {
            return Err(ClassifyError::StrandModeMismatch {
                hap_a: hap_a.is_canonical(),
                hap_b: hap_b.is_canonical(),
            });
        }
        Ok(Self {
            hap_a,
            hap_b,
            rule: DecisionRule::default(),
            scaling: ScalingFactors::default(),
        })
    }

    /// Replace the decision rule
    ///
    /// # Errors
    /// Returns [`ClassifyError::InvalidMargin`] for a negative or non-finite margin
    pub fn with_rule(mut self, rule: DecisionRule) -> Result<Self, ClassifyError> {
        rule.validate()?;
        self.scaling = if rule.scale_by_set_size {
            ScalingFactors::from_sets(self.hap_a, self.hap_b)
        } else {
            ScalingFactors::default()
        };
        self.rule = rule;
        Ok(self)
    }

    /// K-mer length of both sets
    pub fn k(&self) -> usize {
        self.hap_a.k()
    }

    /// Active scaling factors
    pub fn scaling(&self) -> &ScalingFactors {
        &self.scaling
    }

    /// Count the windows of `read` found in each set
    ///
    /// Windows containing a byte outside `ACGT` match neither set. Reads
    /// shorter than k have no windows.
    pub fn count(&self, read: &[u8]) -> KmerCounts {
        let mut counts = KmerCounts::default();
        for key in self.hap_a.window_keys(read).flatten() {
            if self.hap_a.contains_key(key) {
                counts.hap_a += 1;
            }
            // the parental sets are expected to be disjoint, but are not required to be
            if self.hap_b.contains_key(key) {
                counts.hap_b += 1;
            }
        }
        counts
    }

    /// Count and decide
    pub fn classify(&self, read: &[u8]) -> ClassificationOutcome {
        let counts = self.count(read);
        let (haplotype, score_a, score_b) = self.rule.decide(counts, &self.scaling);
        ClassificationOutcome {
            haplotype,
            counts,
            score_a,
            score_b,
        }
    }

    /// Classify independent reads in parallel, preserving order
    pub fn classify_batch<R>(&self, reads: &[R]) -> Vec<ClassificationOutcome>
    where
        R: AsRef<[u8]> + Sync,
    {
        reads.par_iter().map(|read| self.classify(read.as_ref())).collect()
    }

    /// Number of windows a read of length `len` is scored on
    pub fn num_windows(&self, len: usize) -> usize {
        num_windows(len, self.k())
    }
}

/// Running tally of classification outcomes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinSummary {
    /// Reads assigned to haplotype A
    pub hap_a: u64,
    /// Reads assigned to haplotype B
    pub hap_b: u64,
    /// Reads left unclassified
    pub unclassified: u64,
    /// Unclassified reads with no hit in either set
    pub no_hits: u64,
}

impl BinSummary {
    /// Create an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome
    pub fn add(&mut self, outcome: &ClassificationOutcome) {
        match outcome.haplotype {
            Haplotype::A => self.hap_a += 1,
            Haplotype::B => self.hap_b += 1,
            Haplotype::Unclassified => {
                self.unclassified += 1;
                if outcome.counts == KmerCounts::default() {
                    self.no_hits += 1;
                }
            }
        }
    }

    /// Total number of reads recorded
    pub fn total(&self) -> u64 {
        self.hap_a + self.hap_b + self.unclassified
    }

    /// Log the summary via tracing
    pub fn print_summary(&self) {
        let total = self.total().max(1) as f64;
        info!("Classification Summary:");
        info!("  Total reads: {}", self.total());
        info!("  Haplotype A: {} ({:.2}%)", self.hap_a, 100.0 * self.hap_a as f64 / total);
        info!("  Haplotype B: {} ({:.2}%)", self.hap_b, 100.0 * self.hap_b as f64 / total);
        info!(
            "  Unclassified: {} ({:.2}%, {} without any hit)",
            self.unclassified,
            100.0 * self.unclassified as f64 / total,
            self.no_hits
        );
    }
}
