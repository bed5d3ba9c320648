//! Build configuration for k-mer sets
//!
//! Capacity policy, slot hash and thread count for [`KmerSet`](crate::KmerSet)
//! construction, injected by the caller.

use crate::constants::{DEFAULT_CAPACITY_DEN, DEFAULT_CAPACITY_NUM};
use crate::hasher::SlotHash;
use thiserror::Error;

/// Invalid build parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The capacity factor must be strictly greater than one
    #[error("capacity factor {num}/{den} must be greater than 1")]
    CapacityFactor {
        /// Numerator
        num: usize,
        /// Denominator
        den: usize,
    },
    /// The thread pool could not be created
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),
}

/// Configuration parameters for building a k-mer set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Capacity factor numerator (`capacity = ceil(count * num / den)`)
    pub capacity_num: usize,

    /// Capacity factor denominator
    pub capacity_den: usize,

    /// Hash applied to keys before reduction modulo capacity
    pub slot_hash: SlotHash,

    /// Canonical mode (a k-mer and its reverse complement are one entry).
    /// When false, k-mers are stored and matched on the forward strand only.
    pub canonical: bool,

    /// Number of threads for parallel operations (0 = all available cores)
    pub num_threads: usize,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            capacity_num: DEFAULT_CAPACITY_NUM,
            capacity_den: DEFAULT_CAPACITY_DEN,
            slot_hash: SlotHash::Avalanche,
            canonical: true,
            num_threads: 0,
        }
    }
}

impl BuildConfiguration {
    /// Create a configuration with the given thread count and default policies
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Self::default()
        }
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_den == 0 || self.capacity_num <= self.capacity_den {
            return Err(ConfigError::CapacityFactor {
                num: self.capacity_num,
                den: self.capacity_den,
            });
        }
        Ok(())
    }

    /// Maximum fraction of occupied slots this configuration allows
    pub fn max_load_factor(&self) -> f64 {
        self.capacity_den as f64 / self.capacity_num as f64
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Build Configuration:");
        tracing::info!(
            "  capacity factor = {}/{} (max load {:.2})",
            self.capacity_num,
            self.capacity_den,
            self.max_load_factor()
        );
        tracing::debug!("  slot_hash = {:?}", self.slot_hash);
        tracing::info!("  canonical = {}", self.canonical);
        if self.num_threads == 0 {
            tracing::info!("  num_threads = all available cores");
        } else {
            tracing::info!("  num_threads = {}", self.num_threads);
        }
    }
}
