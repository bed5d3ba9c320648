//! Builder module for constructing haplotype k-mer sets
//!
//! The build runs in three steps:
//! 1. Read k-mer lists (one k-mer per line)
//! 2. Encode every line to its key in parallel
//! 3. Insert keys into the open-addressing table

pub mod config;
pub mod parse;
pub mod set_builder;

pub use config::{BuildConfiguration, ConfigError};
pub use parse::{for_each_kmer_chunk, for_each_read_batch, open_kmer_list, ReadRecord};
pub use set_builder::KmerSetBuilder;
