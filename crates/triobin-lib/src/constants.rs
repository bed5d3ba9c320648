//! Constants and limits for k-mer sets
//!
//! Valid k-mer sizes, the default capacity policy of a [`KmerSet`](crate::KmerSet)
//! and the default read batch size.

/// Smallest supported k-mer length
pub const MIN_K: usize = 1;

/// Largest supported k-mer length (2 bits per base in a `u64`)
pub const MAX_K: usize = 32;

/// Default capacity factor numerator: `capacity = ceil(count * 4 / 3)`
pub const DEFAULT_CAPACITY_NUM: usize = 4;

/// Default capacity factor denominator
pub const DEFAULT_CAPACITY_DEN: usize = 3;

/// Default number of reads handed to the thread pool at once
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// K-mer list lines encoded per parallel chunk while streaming a list
pub const KMER_CHUNK_SIZE: usize = 1 << 20;

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Check if a k-mer size fits the packed representation
#[inline]
pub const fn is_valid_k(k: usize) -> bool {
    k >= MIN_K && k <= MAX_K
}

/// Mask selecting the low `2 * k` bits of a key.
///
/// `k` must already be valid; for `k == 32` every bit is kept.
#[inline]
pub const fn key_mask(k: usize) -> u64 {
    if k >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    }
}

/// `ceil(count * num / den)`, the slot count for `count` input k-mers
#[inline]
pub const fn capacity_for(count: usize, num: usize, den: usize) -> usize {
    (count * num).div_ceil(den)
}
