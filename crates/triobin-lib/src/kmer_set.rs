//! Exact set of k-mers
//!
//! [`KmerSet`] is an open-addressing hash table with linear probing over
//! [`KmerKey`]s, canonical unless the set was built in forward-only mode.
//! It is built once from a list of k-mer strings and is read-only
//! afterwards, so any number of threads may query it without locking.
//!
//! The table is sized to `ceil(count * num / den)` slots for `count` input
//! k-mers (4/3 by default). Because the factor is above one and keys are never
//! removed, at least one slot always stays empty and every probe sequence
//! ends at an empty slot or at the key itself.

use crate::builder::config::{BuildConfiguration, ConfigError};
use crate::builder::parse::for_each_kmer_chunk;
use crate::constants::{capacity_for, KMER_CHUNK_SIZE};
use crate::encoding::EncodingError;
use crate::hasher::SlotHasher;
use crate::kmer::{KmerCodec, KmerKey, KmerKeys};
use rayon::prelude::*;
use std::io::BufRead;
use thiserror::Error;
use tracing::debug;

/// Structural problems in a k-mer list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedInput {
    /// The list contains no k-mers at all
    #[error("no k-mers in input")]
    Empty,
    /// A line does not have the length fixed by the first line
    #[error("line {line}: length {actual} does not match k={expected}")]
    LengthMismatch {
        /// 1-based input line
        line: usize,
        /// k inferred from the first line
        expected: usize,
        /// Length of the offending line
        actual: usize,
    },
}

/// Error type for k-mer set construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Empty input or inconsistent line lengths
    #[error("malformed k-mer input: {0}")]
    MalformedKmerInput(#[from] MalformedInput),
    /// The first line's length cannot be packed into a 64-bit key
    #[error("k={k} is outside the supported range [1, 32]")]
    OversizedKmer {
        /// Inferred k
        k: usize,
    },
    /// A k-mer contains a byte outside `ACGT`
    #[error("line {line}: invalid DNA base {:?} at position {position}", base_char(.base))]
    InvalidBase {
        /// 1-based input line
        line: usize,
        /// Offending byte
        base: u8,
        /// Offset within the k-mer
        position: usize,
    },
    /// Insertion visited every slot without finding an empty one
    #[error("no empty slot for key {key:#x}: {len} entries in {capacity} slots")]
    CapacityExhausted {
        /// Key being inserted
        key: KmerKey,
        /// Live entries at the time of failure
        len: usize,
        /// Table size
        capacity: usize,
    },
    /// Invalid build configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn base_char(base: &u8) -> char {
    char::from(*base)
}

impl BuildError {
    fn from_encoding(line: usize, err: EncodingError) -> Self {
        match err {
            EncodingError::InvalidBase { base, position } => BuildError::InvalidBase { line, base, position },
            EncodingError::LengthMismatch { expected, actual } => {
                MalformedInput::LengthMismatch { line, expected, actual }.into()
            }
            EncodingError::OversizedKmer(k) => BuildError::OversizedKmer { k },
        }
    }
}

/// One table entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Slot {
    /// Never written
    #[default]
    Empty,
    /// Holds a canonical key
    Occupied(KmerKey),
}

/// Exact, immutable set of k-mers of one length
#[derive(Debug, Clone)]
pub struct KmerSet {
    codec: KmerCodec,
    canonical: bool,
    slots: Vec<Slot>,
    hasher: SlotHasher,
    len: usize,
    num_input_kmers: usize,
}

impl KmerSet {
    /// Build a set with the default configuration
    ///
    /// Item `i` of `kmers` is reported as line `i + 1` in errors.
    ///
    /// # Errors
    /// See [`BuildError`]
    pub fn build<I, S>(kmers: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]> + Sync,
    {
        Self::build_with_config(kmers, &BuildConfiguration::default())
    }

    /// Build a set with an explicit capacity and hash policy
    ///
    /// # Errors
    /// See [`BuildError`]
    pub fn build_with_config<I, S>(kmers: I, config: &BuildConfiguration) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]> + Sync,
    {
        let numbered: Vec<(usize, S)> = kmers
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i + 1, s))
            .collect();
        Self::build_numbered(&numbered, config)
    }

    /// Build a set from k-mers tagged with their input line numbers
    ///
    /// # Errors
    /// See [`BuildError`]
    pub fn build_numbered<S>(lines: &[(usize, S)], config: &BuildConfiguration) -> Result<Self, BuildError>
    where
        S: AsRef<[u8]> + Sync,
    {
        config.validate()?;
        let mut keys = KeyCollector::new(config.canonical);
        keys.push_chunk(lines)?;
        keys.finish(config)
    }

    /// Build a set from a line-oriented k-mer list
    ///
    /// The list is read and encoded in chunks, so only the packed keys of the
    /// whole list are held at once. Blank lines are skipped; line numbers in
    /// errors refer to the input.
    pub fn from_reader<R: BufRead>(reader: R, config: &BuildConfiguration) -> anyhow::Result<Self> {
        Self::from_reader_in_chunks(reader, config, KMER_CHUNK_SIZE)
    }

    fn from_reader_in_chunks<R: BufRead>(
        reader: R,
        config: &BuildConfiguration,
        chunk_size: usize,
    ) -> anyhow::Result<Self> {
        config.validate().map_err(BuildError::from)?;
        let mut keys = KeyCollector::new(config.canonical);
        for_each_kmer_chunk(reader, chunk_size, |chunk| Ok(keys.push_chunk(chunk)?))?;
        Ok(keys.finish(config)?)
    }

    /// Insert a key; returns `false` if it was already present
    fn insert(&mut self, key: KmerKey) -> Result<bool, BuildError> {
        let capacity = self.slots.len();
        let mut pos = self.hasher.home_slot(key, capacity);

        for _ in 0..capacity {
            match self.slots[pos] {
                Slot::Empty => {
                    self.slots[pos] = Slot::Occupied(key);
                    self.len += 1;
                    return Ok(true);
                }
                Slot::Occupied(existing) if existing == key => return Ok(false),
                Slot::Occupied(_) => {
                    pos += 1;
                    if pos == capacity {
                        pos = 0;
                    }
                }
            }
        }

        Err(BuildError::CapacityExhausted {
            key,
            len: self.len,
            capacity,
        })
    }

    /// Membership test for a k-mer string
    ///
    /// In canonical mode a k-mer and its reverse complement are the same
    /// member. Strings of the wrong length or containing bytes outside `ACGT`
    /// are never members.
    pub fn contains<S: AsRef<[u8]>>(&self, kmer: S) -> bool {
        let key = if self.canonical {
            self.codec.canonical(kmer.as_ref())
        } else {
            self.codec.encode(kmer.as_ref())
        };
        match key {
            Ok(key) => self.contains_key(key),
            Err(_) => false,
        }
    }

    /// Membership test for a key already in this set's mode
    /// (canonical or forward)
    #[inline]
    pub fn contains_key(&self, key: KmerKey) -> bool {
        let capacity = self.slots.len();
        let mut pos = self.hasher.home_slot(key, capacity);

        for _ in 0..capacity {
            match self.slots[pos] {
                Slot::Empty => return false,
                Slot::Occupied(existing) if existing == key => return true,
                Slot::Occupied(_) => {
                    pos += 1;
                    if pos == capacity {
                        pos = 0;
                    }
                }
            }
        }
        false
    }

    /// K-mer length shared by every entry
    #[inline]
    pub fn k(&self) -> usize {
        self.codec.k()
    }

    /// Whether keys are canonical (true) or forward-strand only
    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// Rolling keys of every window of `read`, in this set's mode
    pub fn window_keys<'r>(&self, read: &'r [u8]) -> KmerKeys<'r> {
        if self.canonical {
            self.codec.canonical_kmers(read)
        } else {
            self.codec.forward_kmers(read)
        }
    }

    /// Number of distinct keys
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for a successfully built set
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of k-mers in the input, duplicates included
    #[inline]
    pub fn num_input_kmers(&self) -> usize {
        self.num_input_kmers
    }

    /// Number of duplicate input lines (same key)
    pub fn num_duplicates(&self) -> usize {
        self.num_input_kmers - self.len
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Fraction of occupied slots
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.slots.len() as f64
    }

    /// Iterate over the stored keys in slot order
    pub fn keys(&self) -> impl Iterator<Item = KmerKey> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(key) => Some(*key),
            Slot::Empty => None,
        })
    }

    /// Approximate heap usage in bytes
    pub fn num_bytes(&self) -> usize {
        self.slots.len() * std::mem::size_of::<Slot>()
    }
}

/// Packed keys of a k-mer list read so far
///
/// k is fixed by the first k-mer pushed.
struct KeyCollector {
    codec: Option<KmerCodec>,
    canonical: bool,
    keys: Vec<KmerKey>,
}

impl KeyCollector {
    fn new(canonical: bool) -> Self {
        Self { codec: None, canonical, keys: Vec::new() }
    }

    /// Encode one chunk of `(line_number, kmer)` pairs in parallel
    fn push_chunk<S>(&mut self, lines: &[(usize, S)]) -> Result<(), BuildError>
    where
        S: AsRef<[u8]> + Sync,
    {
        let codec = match (self.codec, lines.first()) {
            (Some(codec), _) => codec,
            (None, Some((_, first))) => {
                let k = first.as_ref().len();
                let codec = KmerCodec::new(k).map_err(|_| BuildError::OversizedKmer { k })?;
                self.codec = Some(codec);
                codec
            }
            (None, None) => return Ok(()),
        };

        let canonical = self.canonical;
        let chunk: Vec<KmerKey> = lines
            .par_iter()
            .map(|(line, kmer)| {
                let key = if canonical {
                    codec.canonical(kmer.as_ref())
                } else {
                    codec.encode(kmer.as_ref())
                };
                key.map_err(|e| BuildError::from_encoding(*line, e))
            })
            .collect::<Result<_, _>>()?;
        self.keys.extend(chunk);
        Ok(())
    }

    /// Allocate the table and insert every collected key
    fn finish(self, config: &BuildConfiguration) -> Result<KmerSet, BuildError> {
        let codec = self.codec.ok_or(MalformedInput::Empty)?;
        let capacity = capacity_for(self.keys.len(), config.capacity_num, config.capacity_den);
        let mut set = KmerSet {
            codec,
            canonical: self.canonical,
            slots: vec![Slot::Empty; capacity],
            hasher: SlotHasher::new(config.slot_hash),
            len: 0,
            num_input_kmers: self.keys.len(),
        };

        for key in self.keys {
            set.insert(key)?;
        }

        debug!(
            "Built {}-mer set: {} distinct of {} input k-mers in {} slots (load {:.3})",
            codec.k(),
            set.len,
            set.num_input_kmers,
            capacity,
            set.load_factor()
        );

        Ok(set)
    }
}
