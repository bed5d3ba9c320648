// triobin: trio binning of sequencing reads
//
// Assigns reads of a hybrid offspring to one of two parental haplotypes by
// exact k-mer membership against haplotype-specific k-mer sets.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod constants;
pub mod encoding;
pub mod hasher;
pub mod kmer;
pub mod kmer_set;
pub mod classify;
pub mod builder;

// Re-export common types at crate root
pub use kmer::{KmerCodec, KmerKey, KmerKeys};
pub use kmer_set::{BuildError, KmerSet, MalformedInput, Slot};
pub use classify::{
    BinSummary, ClassificationOutcome, ClassifyError, DecisionRule, Haplotype, KmerCounts, ReadClassifier,
    ScalingFactors,
};
pub use encoding::EncodingError;
pub use hasher::SlotHash;
pub use builder::{BuildConfiguration, ConfigError, KmerSetBuilder};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let (major, minor, patch) = version();
        assert_eq!(major, 0);
        assert_eq!(minor, 1);
        assert_eq!(patch, 0);
    }
}
