//! Sparse bit array backing the bloom filters.
//!
//! Bits live in 64-bit blocks keyed by block index; only blocks with at
//! least one set bit are stored, so an index over a few hundred words
//! stays small even when the filter spans millions of bit positions.
//!
//! Wire format: block count as a varint, then (block index varint,
//! 8-byte little-endian block) pairs in ascending block order. The
//! encoding is canonical — marshal after unmarshal reproduces the input
//! byte-for-byte — and the empty array is encodable.

use std::collections::BTreeMap;

use sealdex_core::{SealdexError, SealdexResult};

use crate::wire::{self, MAX_VARINT_LEN64};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SparseBitArray {
    blocks: BTreeMap<u64, u64>,
}

impl SparseBitArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bit(&mut self, bit: u64) {
        *self.blocks.entry(bit / 64).or_insert(0) |= 1u64 << (bit % 64);
    }

    pub fn get_bit(&self, bit: u64) -> bool {
        self.blocks
            .get(&(bit / 64))
            .is_some_and(|block| block & (1u64 << (bit % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total number of set bits.
    pub fn count_ones(&self) -> u64 {
        self.blocks
            .values()
            .map(|block| u64::from(block.count_ones()))
            .sum()
    }

    /// Highest set bit, if any.
    pub fn max_bit(&self) -> Option<u64> {
        self.blocks
            .iter()
            .next_back()
            .map(|(idx, block)| idx * 64 + (63 - u64::from(block.leading_zeros())))
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAX_VARINT_LEN64 + self.blocks.len() * 18);
        let mut scratch = [0u8; MAX_VARINT_LEN64];
        let n = wire::put_uvarint(&mut scratch, self.blocks.len() as u64);
        out.extend_from_slice(&scratch[..n]);
        for (&idx, &block) in &self.blocks {
            let n = wire::put_uvarint(&mut scratch, idx);
            out.extend_from_slice(&scratch[..n]);
            out.extend_from_slice(&block.to_le_bytes());
        }
        out
    }

    pub fn unmarshal(input: &[u8]) -> SealdexResult<Self> {
        let (num_blocks, mut pos) =
            wire::uvarint(input).ok_or(SealdexError::Truncated("bit array block count"))?;
        let mut blocks = BTreeMap::new();
        for _ in 0..num_blocks {
            let (idx, n) = wire::uvarint(&input[pos..])
                .ok_or(SealdexError::Truncated("bit array block index"))?;
            pos += n;
            let raw: [u8; 8] = input
                .get(pos..pos + 8)
                .and_then(|s| s.try_into().ok())
                .ok_or(SealdexError::Truncated("bit array block payload"))?;
            pos += 8;
            blocks.insert(idx, u64::from_le_bytes(raw));
        }
        Ok(Self { blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut bits = SparseBitArray::new();
        assert!(!bits.get_bit(0));
        bits.set_bit(0);
        bits.set_bit(63);
        bits.set_bit(64);
        bits.set_bit(1_899_999);
        assert!(bits.get_bit(0));
        assert!(bits.get_bit(63));
        assert!(bits.get_bit(64));
        assert!(bits.get_bit(1_899_999));
        assert!(!bits.get_bit(1));
        assert!(!bits.get_bit(1_900_000));
    }

    #[test]
    fn test_count_and_max() {
        let mut bits = SparseBitArray::new();
        assert_eq!(bits.count_ones(), 0);
        assert_eq!(bits.max_bit(), None);
        bits.set_bit(7);
        bits.set_bit(7);
        bits.set_bit(129);
        assert_eq!(bits.count_ones(), 2);
        assert_eq!(bits.max_bit(), Some(129));
    }

    #[test]
    fn test_marshal_roundtrip() {
        let mut bits = SparseBitArray::new();
        for bit in [0u64, 5, 63, 64, 1000, 54_321, 1_899_999] {
            bits.set_bit(bit);
        }
        let encoded = bits.marshal();
        let decoded = SparseBitArray::unmarshal(&encoded).unwrap();
        assert_eq!(decoded, bits);
        // Canonical: marshal(unmarshal(b)) == b
        assert_eq!(decoded.marshal(), encoded);
    }

    #[test]
    fn test_marshal_empty() {
        let bits = SparseBitArray::new();
        let encoded = bits.marshal();
        let decoded = SparseBitArray::unmarshal(&encoded).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.marshal(), encoded);
    }

    #[test]
    fn test_unmarshal_truncated() {
        let mut bits = SparseBitArray::new();
        bits.set_bit(12_345);
        let encoded = bits.marshal();
        for cut in [0, 1, encoded.len() - 1] {
            assert!(matches!(
                SparseBitArray::unmarshal(&encoded[..cut]),
                Err(SealdexError::Truncated(_))
            ));
        }
    }
}
