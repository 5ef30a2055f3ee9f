//! Fixed-width bit vectors.
//!
//! [`BitVector`] is the storage behind every request and grant line bundle
//! in the harness. The width is chosen at construction and never changes;
//! any operation that combines two vectors of different widths fails with
//! [`BitsError::WidthMismatch`] instead of truncating.
//!
//! Bits are stored little-endian in 64-bit words: index 0 is the least
//! significant bit of the first word. Bits above `width` in the last word
//! are always zero, so derived equality and hashing are exact.
//!
//! The textual form prints the highest index first, the way a hardware
//! waveform viewer shows a bus: a 4-bit vector with bits 1 and 2 set is
//! `0110`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of bits held in one storage word.
const WORD_BITS: usize = 64;

/// Errors produced by bit vector construction and manipulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitsError {
    /// A vector must have at least one bit.
    #[error("bit vector width must be at least 1")]
    ZeroWidth,

    /// Two vectors (or a vector and a configured width) disagree on width.
    #[error("width mismatch: expected {expected} bits, got {actual}")]
    WidthMismatch {
        /// The width that was required.
        expected: usize,
        /// The width that was supplied.
        actual: usize,
    },

    /// A bit index lies outside the vector.
    #[error("bit index {index} out of range for width {width}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The vector width.
        width: usize,
    },

    /// A character other than `0`, `1` or `_` appeared in a bit string.
    #[error("invalid bit digit {digit:?}")]
    InvalidDigit {
        /// The offending character.
        digit: char,
    },

    /// An integer value has bits set above the requested width.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooWide {
        /// The integer that was supplied.
        value: u64,
        /// The requested width.
        width: usize,
    },
}

/// A bit vector of fixed width `N >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    /// Number of meaningful bits.
    width: usize,
    /// Little-endian storage words; unused high bits of the last word are zero.
    words: Vec<u64>,
}

impl BitVector {
    /// Create an all-zero vector of the given width.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::ZeroWidth`] if `width` is 0.
    pub fn zeros(width: usize) -> Result<Self, BitsError> {
        if width == 0 {
            return Err(BitsError::ZeroWidth);
        }
        Ok(Self {
            width,
            words: vec![0; word_count(width)],
        })
    }

    /// Create a vector whose low bits are taken from `value`.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::ZeroWidth`] for width 0 and
    /// [`BitsError::ValueTooWide`] if `value` has bits set at or above
    /// `width`.
    pub fn from_u64(width: usize, value: u64) -> Result<Self, BitsError> {
        let mut vector = Self::zeros(width)?;
        if width < WORD_BITS && value & !low_mask(width) != 0 {
            return Err(BitsError::ValueTooWide { value, width });
        }
        if let Some(first) = vector.words.first_mut() {
            *first = value;
        }
        Ok(vector)
    }

    /// Build a vector from raw storage words, clearing any bits above
    /// `width` in the last word.
    ///
    /// Used by stimulus generators that fill whole words at random.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::ZeroWidth`] for width 0 and
    /// [`BitsError::WidthMismatch`] if `words` does not hold exactly
    /// `ceil(width / 64)` words.
    pub fn from_words_masked(width: usize, mut words: Vec<u64>) -> Result<Self, BitsError> {
        if width == 0 {
            return Err(BitsError::ZeroWidth);
        }
        let expected = word_count(width);
        if words.len() != expected {
            return Err(BitsError::WidthMismatch {
                expected: expected.saturating_mul(WORD_BITS),
                actual: words.len().saturating_mul(WORD_BITS),
            });
        }
        if let Some(last) = words.last_mut() {
            *last &= tail_mask(width);
        }
        Ok(Self { width, words })
    }

    /// Create a one-hot vector with only `index` set.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::ZeroWidth`] or [`BitsError::IndexOutOfRange`].
    pub fn one_hot(width: usize, index: usize) -> Result<Self, BitsError> {
        let mut vector = Self::zeros(width)?;
        vector.set(index, true)?;
        Ok(vector)
    }

    /// Return an all-zero vector of the same width.
    pub fn cleared(&self) -> Self {
        Self {
            width: self.width,
            words: vec![0; self.words.len()],
        }
    }

    /// Return the number of bits in this vector.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Return the raw storage words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Return the value as a `u64` if the vector is at most 64 bits wide.
    pub fn to_u64(&self) -> Option<u64> {
        if self.width > WORD_BITS {
            return None;
        }
        self.words.first().copied()
    }

    /// Read the bit at `index`, or `None` if the index is out of range.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.width {
            return None;
        }
        let (word, bit) = locate(index);
        self.words.get(word).map(|w| w & bit_mask(bit) != 0)
    }

    /// Write the bit at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::IndexOutOfRange`] if `index >= width`.
    pub fn set(&mut self, index: usize, value: bool) -> Result<(), BitsError> {
        let width = self.width;
        let out_of_range = BitsError::IndexOutOfRange { index, width };
        if index >= width {
            return Err(out_of_range);
        }
        let (word, bit) = locate(index);
        let slot = self.words.get_mut(word).ok_or(out_of_range)?;
        if value {
            *slot |= bit_mask(bit);
        } else {
            *slot &= !bit_mask(bit);
        }
        Ok(())
    }

    /// Return the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().fold(0_usize, |acc, w| {
            acc.saturating_add(usize::try_from(w.count_ones()).unwrap_or(usize::MAX))
        })
    }

    /// Return `true` if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Return the lowest set index, scanning upward from 0.
    pub fn lowest_set(&self) -> Option<usize> {
        self.words.iter().enumerate().find_map(|(i, w)| {
            if *w == 0 {
                return None;
            }
            let within = usize::try_from(w.trailing_zeros()).ok()?;
            i.checked_mul(WORD_BITS)?.checked_add(within)
        })
    }

    /// Return a copy with every bit cleared except the lowest set one.
    ///
    /// An all-zero vector stays all-zero.
    pub fn isolate_lowest(&self) -> Self {
        let mut out = self.cleared();
        if let Some((i, w)) = self.words.iter().enumerate().find(|(_, w)| **w != 0) {
            if let Some(slot) = out.words.get_mut(i) {
                // Two's-complement trick: w & -w keeps only the lowest one.
                *slot = w & w.wrapping_neg();
            }
        }
        out
    }

    /// Iterate over the indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(|&i| self.get(i).unwrap_or(false))
    }

    /// Check that this vector is exactly `expected` bits wide.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::WidthMismatch`] otherwise.
    pub const fn ensure_width(&self, expected: usize) -> Result<(), BitsError> {
        if self.width == expected {
            Ok(())
        } else {
            Err(BitsError::WidthMismatch {
                expected,
                actual: self.width,
            })
        }
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in (0..self.width).rev() {
            let digit = if self.get(index).unwrap_or(false) { '1' } else { '0' };
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

impl FromStr for BitVector {
    type Err = BitsError;

    /// Parse a bit string, highest index first. Underscores are ignored
    /// as digit separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<bool> = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                digit => Err(BitsError::InvalidDigit { digit }),
            })
            .collect::<Result<_, _>>()?;

        let mut vector = Self::zeros(digits.len())?;
        for (index, bit) in digits.iter().rev().enumerate() {
            if *bit {
                vector.set(index, true)?;
            }
        }
        Ok(vector)
    }
}

impl Serialize for BitVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BitVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Number of storage words needed for `width` bits.
const fn word_count(width: usize) -> usize {
    width.div_ceil(WORD_BITS)
}

/// Split a bit index into (word index, bit within word).
fn locate(index: usize) -> (usize, u32) {
    let word = index / WORD_BITS;
    let bit = u32::try_from(index % WORD_BITS).unwrap_or(0);
    (word, bit)
}

/// Single-bit mask for a bit position below 64.
const fn bit_mask(bit: u32) -> u64 {
    1_u64.rotate_left(bit)
}

/// Mask with the low `bits` bits set, for `bits` in `1..64`.
fn low_mask(bits: usize) -> u64 {
    let shift = u32::try_from(bits).unwrap_or(0);
    bit_mask(shift).wrapping_sub(1)
}

/// Mask of meaningful bits in the last storage word.
fn tail_mask(width: usize) -> u64 {
    match width % WORD_BITS {
        0 => u64::MAX,
        used => low_mask(used),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bits(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    #[test]
    fn zero_width_is_rejected() {
        assert_eq!(BitVector::zeros(0), Err(BitsError::ZeroWidth));
        assert_eq!("".parse::<BitVector>(), Err(BitsError::ZeroWidth));
    }

    #[test]
    fn display_prints_highest_index_first() {
        let mut v = BitVector::zeros(4).unwrap();
        v.set(1, true).unwrap();
        v.set(2, true).unwrap();
        assert_eq!(v.to_string(), "0110");
        assert_eq!(v.to_u64(), Some(0b0110));
    }

    #[test]
    fn parse_matches_display() {
        let v = bits("1000_0001");
        assert_eq!(v.width(), 8);
        assert_eq!(v.get(0), Some(true));
        assert_eq!(v.get(7), Some(true));
        assert_eq!(v.get(8), None);
        assert_eq!(v.to_string(), "10000001");
    }

    #[test]
    fn invalid_digit_is_rejected() {
        assert_eq!(
            "01x1".parse::<BitVector>(),
            Err(BitsError::InvalidDigit { digit: 'x' })
        );
    }

    #[test]
    fn from_u64_rejects_values_wider_than_width() {
        assert!(BitVector::from_u64(4, 0b1111).is_ok());
        assert_eq!(
            BitVector::from_u64(4, 0b1_0000),
            Err(BitsError::ValueTooWide {
                value: 0b1_0000,
                width: 4
            })
        );
        assert!(BitVector::from_u64(64, u64::MAX).is_ok());
    }

    #[test]
    fn set_out_of_range_fails() {
        let mut v = BitVector::zeros(3).unwrap();
        assert_eq!(
            v.set(3, true),
            Err(BitsError::IndexOutOfRange { index: 3, width: 3 })
        );
    }

    #[test]
    fn lowest_set_scans_from_index_zero() {
        assert_eq!(bits("0000").lowest_set(), None);
        assert_eq!(bits("0110").lowest_set(), Some(1));
        assert_eq!(bits("1000").lowest_set(), Some(3));
        assert_eq!(bits("1111").lowest_set(), Some(0));
    }

    #[test]
    fn isolate_lowest_keeps_one_bit() {
        assert_eq!(bits("0110").isolate_lowest(), bits("0010"));
        assert_eq!(bits("1111").isolate_lowest(), bits("0001"));
        assert_eq!(bits("0000").isolate_lowest(), bits("0000"));
    }

    #[test]
    fn wide_vectors_span_words() {
        let mut v = BitVector::zeros(130).unwrap();
        assert_eq!(v.words().len(), 3);
        v.set(129, true).unwrap();
        v.set(70, true).unwrap();
        assert_eq!(v.count_ones(), 2);
        assert_eq!(v.lowest_set(), Some(70));
        assert_eq!(v.iter_ones().collect::<Vec<_>>(), vec![70, 129]);
        assert_eq!(v.to_u64(), None);

        let isolated = v.isolate_lowest();
        assert_eq!(isolated.count_ones(), 1);
        assert_eq!(isolated.get(70), Some(true));
    }

    #[test]
    fn masked_words_clear_bits_above_width() {
        let v = BitVector::from_words_masked(4, vec![u64::MAX]).unwrap();
        assert_eq!(v.to_string(), "1111");
        assert_eq!(v.count_ones(), 4);
        assert_eq!(v, bits("1111"));

        let err = BitVector::from_words_masked(65, vec![0]);
        assert!(matches!(err, Err(BitsError::WidthMismatch { .. })));
    }

    #[test]
    fn ensure_width_reports_both_sides() {
        let v = bits("010");
        assert!(v.ensure_width(3).is_ok());
        assert_eq!(
            v.ensure_width(4),
            Err(BitsError::WidthMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn serializes_as_bit_string() {
        let v = bits("0101");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"0101\"");
        let back: BitVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
