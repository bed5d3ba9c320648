//! DNA nucleotide encoding
//!
//! This module implements the 2-bit encoding scheme for DNA nucleotides:
//!
//! - A (65) -> 00
//! - C (67) -> 01
//! - G (71) -> 10
//! - T (84) -> 11
//!
//! Only the upper-case alphabet is accepted. Anything else, `N` and
//! soft-masked lower case included, is reported as an invalid base and never
//! replaced by a default.

use thiserror::Error;

/// Error type for encoding operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The input byte is not a valid DNA base (A/C/G/T)
    #[error("invalid DNA base {:?} at position {position}", base_char(.base))]
    InvalidBase {
        /// Offending byte
        base: u8,
        /// Offset of the byte within the k-mer
        position: usize,
    },
    /// The input string length does not match the expected k-mer length
    #[error("k-mer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected k-mer length
        expected: usize,
        /// Actual string length
        actual: usize,
    },
    /// k cannot be represented in a 64-bit key
    #[error("k={0} is outside the supported range [1, 32]")]
    OversizedKmer(usize),
}

fn base_char(base: &u8) -> char {
    char::from(*base)
}

/// Encode a single DNA nucleotide to 2 bits
#[inline]
pub const fn encode_base(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(0b00),
        b'C' => Some(0b01),
        b'G' => Some(0b10),
        b'T' => Some(0b11),
        _ => None,
    }
}

/// Decode a 2-bit value to DNA nucleotide
#[inline]
pub const fn decode_base(bits: u8) -> u8 {
    match bits & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b10 => b'G',
        _ => b'T',
    }
}

/// Get the complement of an encoded base
#[inline]
pub const fn complement_base(bits: u8) -> u8 {
    // A(00) <-> T(11), C(01) <-> G(10)
    bits ^ 0b11
}

/// Complement a single nucleotide character
#[inline]
pub const fn complement_char(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'T' => Some(b'A'),
        _ => None,
    }
}

/// Reverse complement a DNA sequence
///
/// # Errors
/// Returns [`EncodingError::InvalidBase`] for any byte outside `ACGT`; the
/// reported position is the offset in the input, not in the output.
pub fn reverse_complement_bytes(sequence: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(sequence.len());
    for (position, &base) in sequence.iter().enumerate().rev() {
        let comp = complement_char(base).ok_or(EncodingError::InvalidBase { base, position })?;
        out.push(comp);
    }
    Ok(out)
}

/// Reverse complement a DNA string
///
/// # Errors
/// Returns an error if the string contains invalid bases
pub fn reverse_complement(sequence: &str) -> Result<String, EncodingError> {
    let bytes = reverse_complement_bytes(sequence.as_bytes())?;
    // every byte is one of ACGT
    Ok(bytes.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_base() {
        assert_eq!(encode_base(b'A'), Some(0b00));
        assert_eq!(encode_base(b'C'), Some(0b01));
        assert_eq!(encode_base(b'G'), Some(0b10));
        assert_eq!(encode_base(b'T'), Some(0b11));

        // Invalid bases, lower case included
        assert_eq!(encode_base(b'N'), None);
        assert_eq!(encode_base(b'a'), None);
        assert_eq!(encode_base(b'X'), None);
        assert_eq!(encode_base(b'0'), None);
    }

    #[test]
    fn test_decode_base() {
        assert_eq!(decode_base(0b00), b'A');
        assert_eq!(decode_base(0b01), b'C');
        assert_eq!(decode_base(0b10), b'G');
        assert_eq!(decode_base(0b11), b'T');
    }

    #[test]
    fn test_complement_base() {
        assert_eq!(complement_base(0b00), 0b11); // A -> T
        assert_eq!(complement_base(0b11), 0b00); // T -> A
        assert_eq!(complement_base(0b01), 0b10); // C -> G
        assert_eq!(complement_base(0b10), 0b01); // G -> C
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGTG").unwrap(), "CACGT");
        assert_eq!(reverse_complement("AAAACCCC").unwrap(), "GGGGTTTT");
        assert_eq!(reverse_complement("").unwrap(), "");

        let kmer = "ATTTACAGCTATG";
        let twice = reverse_complement(&reverse_complement(kmer).unwrap()).unwrap();
        assert_eq!(twice, kmer);
    }

    #[test]
    fn test_reverse_complement_invalid() {
        let err = reverse_complement("ATTTACAQCTATG").unwrap_err();
        assert_eq!(err, EncodingError::InvalidBase { base: b'Q', position: 7 });
    }

    #[test]
    fn test_error_display() {
        let err = EncodingError::InvalidBase { base: b'N', position: 3 };
        assert_eq!(err.to_string(), "invalid DNA base 'N' at position 3");
    }
}
