//! Slot hashing for canonical k-mer keys.
//!
//! Canonical keys of overlapping k-mers share most of their bits, so reducing
//! them modulo the capacity directly produces long probe runs. The default
//! [`SlotHash::Avalanche`] mixes every input bit into every output bit before
//! the reduction.

use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Hash function applied to a key before `mod capacity`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotHash {
    /// MurmurHash3 64-bit finalizer
    #[default]
    Avalanche,
    /// Seeded ahash
    Seeded(u64),
    /// The key itself
    Identity,
}

/// MurmurHash3 `fmix64`
#[inline]
pub const fn fmix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

/// A deterministic hasher built from a [`SlotHash`] policy
#[derive(Clone)]
pub struct SlotHasher {
    policy: SlotHash,
    state: Option<RandomState>,
}

impl SlotHasher {
    /// Create a hasher for the given policy
    pub fn new(policy: SlotHash) -> Self {
        let state = match policy {
            SlotHash::Seeded(seed) => Some(RandomState::with_seeds(seed, !seed, seed, !seed)),
            SlotHash::Avalanche | SlotHash::Identity => None,
        };
        Self { policy, state }
    }

    /// Hash a key
    #[inline]
    pub fn hash(&self, key: u64) -> u64 {
        match (&self.policy, &self.state) {
            (SlotHash::Avalanche, _) => fmix64(key),
            (SlotHash::Seeded(_), Some(state)) => {
                let mut hasher = state.build_hasher();
                hasher.write_u64(key);
                hasher.finish()
            }
            _ => key,
        }
    }

    /// First slot probed for `key` in a table of `capacity` slots
    #[inline]
    pub fn home_slot(&self, key: u64, capacity: usize) -> usize {
        (self.hash(key) % capacity as u64) as usize
    }
}

impl std::fmt::Debug for SlotHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotHasher").field("policy", &self.policy).finish()
    }
}
