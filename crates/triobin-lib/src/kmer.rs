//! K-mer codec with runtime k
//!
//! A k-mer of length `k <= 32` is packed into a [`KmerKey`] with base `i` at
//! bit offset `2 * i`, so the first base of the string occupies the lowest
//! bits. The canonical key of a k-mer is the numerically smaller of its own
//! key and the key of its reverse complement, which makes a k-mer and its
//! reverse complement indistinguishable to every lookup.

use crate::constants::{is_valid_k, key_mask};
use crate::encoding::{complement_base, decode_base, encode_base, EncodingError};
use std::iter::FusedIterator;

/// Packed 2-bit representation of a k-mer
pub type KmerKey = u64;

/// Encoder/decoder for k-mers of one fixed length
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmerCodec {
    k: usize,
    mask: u64,
}

impl KmerCodec {
    /// Create a codec for k-mers of length `k`
    ///
    /// # Errors
    /// Returns [`EncodingError::OversizedKmer`] if `k` is outside `[1, 32]`
    pub fn new(k: usize) -> Result<Self, EncodingError> {
        if !is_valid_k(k) {
            return Err(EncodingError::OversizedKmer(k));
        }
        Ok(Self { k, mask: key_mask(k) })
    }

    /// K-mer length
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Encode exactly `k` bases
    ///
    /// # Errors
    /// Returns an error if the length is not `k` or a byte is not one of `ACGT`
    pub fn encode(&self, kmer: &[u8]) -> Result<KmerKey, EncodingError> {
        if kmer.len() != self.k {
            return Err(EncodingError::LengthMismatch {
                expected: self.k,
                actual: kmer.len(),
            });
        }

        let mut key: KmerKey = 0;
        for (position, &base) in kmer.iter().enumerate() {
            let bits = encode_base(base).ok_or(EncodingError::InvalidBase { base, position })?;
            key |= (bits as u64) << (2 * position);
        }
        Ok(key)
    }

    /// Decode a key back to its DNA string
    pub fn decode(&self, key: KmerKey) -> String {
        (0..self.k)
            .map(|i| decode_base((key >> (2 * i)) as u8) as char)
            .collect()
    }

    /// Key of the reverse complement, computed on the packed bits
    #[inline]
    pub fn reverse_complement_key(&self, key: KmerKey) -> KmerKey {
        // Complement every 2-bit group; the padding above 2k bits ends up
        // below the k-mer after the reversal and is shifted out.
        let mut x = !key;
        x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
        x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
        x = x.swap_bytes();
        x >> (64 - 2 * self.k)
    }

    /// Canonical form of an already encoded key
    #[inline]
    pub fn canonical_key(&self, key: KmerKey) -> KmerKey {
        key.min(self.reverse_complement_key(key))
    }

    /// Canonical key of a k-mer string
    ///
    /// # Errors
    /// Same as [`encode`](Self::encode)
    pub fn canonical(&self, kmer: &[u8]) -> Result<KmerKey, EncodingError> {
        self.encode(kmer).map(|key| self.canonical_key(key))
    }

    /// Rolling canonical keys of every length-`k` window of `read`
    pub fn canonical_kmers<'a>(&self, read: &'a [u8]) -> KmerKeys<'a> {
        KmerKeys::new(*self, read, true)
    }

    /// Rolling forward-strand keys of every length-`k` window of `read`
    pub fn forward_kmers<'a>(&self, read: &'a [u8]) -> KmerKeys<'a> {
        KmerKeys::new(*self, read, false)
    }

    #[inline]
    pub(crate) fn mask(&self) -> u64 {
        self.mask
    }
}

/// Number of length-`k` windows in a sequence of length `len`
#[inline]
pub fn num_windows(len: usize, k: usize) -> usize {
    if k == 0 || len < k {
        0
    } else {
        len - k + 1
    }
}

/// Iterator over the keys of all windows of a read
///
/// Both strands are updated incrementally, one base per step. A window that
/// contains a byte outside `ACGT` yields `None`; encoding restarts after the
/// offending base.
#[derive(Clone, Debug)]
pub struct KmerKeys<'a> {
    read: &'a [u8],
    canonical: bool,
    k: usize,
    mask: u64,
    top_shift: usize,
    next_base: usize,
    valid_run: usize,
    fwd: KmerKey,
    rc: KmerKey,
}

impl<'a> KmerKeys<'a> {
    fn new(codec: KmerCodec, read: &'a [u8], canonical: bool) -> Self {
        Self {
            read,
            canonical,
            k: codec.k(),
            mask: codec.mask(),
            top_shift: 2 * (codec.k() - 1),
            next_base: 0,
            valid_run: 0,
            fwd: 0,
            rc: 0,
        }
    }
}

impl Iterator for KmerKeys<'_> {
    type Item = Option<KmerKey>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_base < self.read.len() {
            let base = self.read[self.next_base];
            self.next_base += 1;

            match encode_base(base) {
                Some(bits) => {
                    // forward: drop the first base, append at the top
                    self.fwd = (self.fwd >> 2) | ((bits as u64) << self.top_shift);
                    // reverse complement: prepend the complement at the bottom
                    self.rc = ((self.rc << 2) & self.mask) | complement_base(bits) as u64;
                    self.valid_run += 1;
                }
                None => self.valid_run = 0,
            }

            if self.next_base >= self.k {
                let key = (self.valid_run >= self.k).then(|| {
                    if self.canonical {
                        self.fwd.min(self.rc)
                    } else {
                        self.fwd
                    }
                });
                return Some(key);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .read
            .len()
            .saturating_sub(self.next_base.max(self.k - 1));
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for KmerKeys<'_> {}

impl FusedIterator for KmerKeys<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::reverse_complement;

    #[test]
    fn test_codec_k_range() {
        assert!(KmerCodec::new(1).is_ok());
        assert!(KmerCodec::new(32).is_ok());
        assert_eq!(KmerCodec::new(0).unwrap_err(), EncodingError::OversizedKmer(0));
        assert_eq!(KmerCodec::new(33).unwrap_err(), EncodingError::OversizedKmer(33));
    }

    #[test]
    fn test_encode_bit_layout() {
        let codec = KmerCodec::new(4).unwrap();
        assert_eq!(codec.encode(b"AAAA").unwrap(), 0);
        assert_eq!(codec.encode(b"TTTT").unwrap(), 0xFF);
        // first base in the lowest bits
        assert_eq!(codec.encode(b"CAAA").unwrap(), 0b01);
        assert_eq!(codec.encode(b"AAAG").unwrap(), 0b10 << 6);
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        let codec = KmerCodec::new(5).unwrap();
        assert_eq!(
            codec.encode(b"ACGT").unwrap_err(),
            EncodingError::LengthMismatch { expected: 5, actual: 4 }
        );
        assert_eq!(
            codec.encode(b"ACNGT").unwrap_err(),
            EncodingError::InvalidBase { base: b'N', position: 2 }
        );
        assert!(codec.encode(b"acgtg").is_err());
    }

    #[test]
    fn test_decode() {
        let codec = KmerCodec::new(10).unwrap();
        let key = codec.encode(b"ACTGACTGAC").unwrap();
        assert_eq!(codec.decode(key), "ACTGACTGAC");
    }

    #[test]
    fn test_reverse_complement_key_matches_string() {
        for kmer in ["ACGTG", "A", "GATTACA", "ACGTACGTACGTACGTACGTACGTACGTACGT", "TTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTG"] {
            let codec = KmerCodec::new(kmer.len()).unwrap();
            let rc = reverse_complement(kmer).unwrap();
            let key = codec.encode(kmer.as_bytes()).unwrap();
            assert_eq!(
                codec.reverse_complement_key(key),
                codec.encode(rc.as_bytes()).unwrap(),
                "kmer={}",
                kmer
            );
        }
    }

    #[test]
    fn test_canonical() {
        let codec = KmerCodec::new(13).unwrap();
        let kmer = "ATTTACAGCTATG";
        let rc = reverse_complement(kmer).unwrap();
        let a = codec.canonical(kmer.as_bytes()).unwrap();
        let b = codec.canonical(rc.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert!(a <= codec.encode(kmer.as_bytes()).unwrap());
        assert!(a <= codec.encode(rc.as_bytes()).unwrap());
    }

    #[test]
    fn test_rolling_matches_direct() {
        let codec = KmerCodec::new(4).unwrap();
        let read = b"AAAACCCCGTAC";
        let rolled: Vec<_> = codec.canonical_kmers(read).collect();
        let direct: Vec<_> = read
            .windows(4)
            .map(|w| Some(codec.canonical(w).unwrap()))
            .collect();
        assert_eq!(rolled, direct);
    }

    #[test]
    fn test_rolling_forward() {
        let codec = KmerCodec::new(5).unwrap();
        let read = b"GGTACCATTGA";
        let rolled: Vec<_> = codec.forward_kmers(read).collect();
        let direct: Vec<_> = read.windows(5).map(|w| Some(codec.encode(w).unwrap())).collect();
        assert_eq!(rolled, direct);
    }

    #[test]
    fn test_rolling_invalid_window() {
        let codec = KmerCodec::new(3).unwrap();
        let keys: Vec<_> = codec.canonical_kmers(b"ACNGTA").collect();
        // windows: ACN, CNG, NGT, GTA
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0], None);
        assert_eq!(keys[1], None);
        assert_eq!(keys[2], None);
        assert_eq!(keys[3], Some(codec.canonical(b"GTA").unwrap()));
    }

    #[test]
    fn test_rolling_short_read() {
        let codec = KmerCodec::new(21).unwrap();
        let mut it = codec.canonical_kmers(b"ACGTACGTAC");
        assert_eq!(it.len(), 0);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_rolling_k32() {
        let codec = KmerCodec::new(32).unwrap();
        let read = b"ACGTTGCAACGTTGCAACGTTGCAACGTTGCAGG";
        let rolled: Vec<_> = codec.canonical_kmers(read).collect();
        assert_eq!(rolled.len(), 3);
        for (window, key) in read.windows(32).zip(rolled) {
            assert_eq!(key, Some(codec.canonical(window).unwrap()));
        }
    }

    #[test]
    fn test_num_windows() {
        assert_eq!(num_windows(8, 4), 5);
        assert_eq!(num_windows(4, 4), 1);
        assert_eq!(num_windows(3, 4), 0);
        assert_eq!(num_windows(10, 21), 0);
    }
}
