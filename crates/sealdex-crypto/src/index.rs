//! The secure index: a blinded bloom filter bound to a per-index nonce,
//! its wire codec, and the membership test executed server-side.
//!
//! Index blob layout:
//! ```text
//! [ hash output size : signed varint, 10-byte slot ]
//! [ nonce            : unsigned varint, 10-byte slot ]
//! [ filter size m    : unsigned varint, 10-byte slot ]
//! [ bloom filter     : SparseBitArray wire format ]
//! ```
//! Header fields occupy fixed 10-byte slots regardless of value.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use sealdex_core::{SealdexError, SealdexResult};

use crate::bitarray::SparseBitArray;
use crate::wire::{self, MAX_VARINT_LEN64};

/// Hash backing the HMAC evaluations of an index. Identified on the wire
/// solely by its output size; unknown sizes are refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexHash {
    Sha256,
    Sha512,
}

impl IndexHash {
    pub fn output_size(self) -> usize {
        match self {
            IndexHash::Sha256 => 32,
            IndexHash::Sha512 => 64,
        }
    }

    pub fn from_output_size(size: i64) -> SealdexResult<Self> {
        match size {
            32 => Ok(IndexHash::Sha256),
            64 => Ok(IndexHash::Sha512),
            other => Err(SealdexError::InvalidHash(other)),
        }
    }
}

pub(crate) fn hmac_tag(hash: IndexHash, key: &[u8], msg: &[u8]) -> Vec<u8> {
    match hash {
        IndexHash::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC takes any key length");
            mac.update(msg);
            mac.finalize().into_bytes().to_vec()
        }
        IndexHash::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC takes any key length");
            mac.update(msg);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Reduces the PRF output for (`trapdoor`, `nonce`) to a 64-bit codeword.
///
/// The HMAC is keyed by the trapdoor over the minimal big-endian bytes of
/// the nonce, and the leading bytes of the tag are read back as a varint.
/// Builder and searcher share this single definition, which keeps the two
/// sides of the filter in agreement.
pub(crate) fn codeword(hash: IndexHash, trapdoor: &[u8], nonce: u64) -> u64 {
    let tag = hmac_tag(hash, trapdoor, &wire::be_minimal(nonce));
    wire::uvarint(&tag).map(|(value, _)| value).unwrap_or(0)
}

/// One per document: the blinded bloom filter plus the parameters needed
/// to test it. Holds no document identity; the nonce alone binds the
/// filter to its document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecureIndex {
    pub bloom: SparseBitArray,
    pub nonce: u64,
    pub size: u64,
    pub hash: IndexHash,
}

impl SecureIndex {
    pub fn marshal(&self) -> Vec<u8> {
        let filter = self.bloom.marshal();
        let mut out = vec![0u8; 3 * MAX_VARINT_LEN64 + filter.len()];
        wire::put_varint(&mut out[..MAX_VARINT_LEN64], self.hash.output_size() as i64);
        wire::put_uvarint(
            &mut out[MAX_VARINT_LEN64..2 * MAX_VARINT_LEN64],
            self.nonce,
        );
        wire::put_uvarint(
            &mut out[2 * MAX_VARINT_LEN64..3 * MAX_VARINT_LEN64],
            self.size,
        );
        out[3 * MAX_VARINT_LEN64..].copy_from_slice(&filter);
        out
    }

    pub fn unmarshal(input: &[u8]) -> SealdexResult<Self> {
        if input.len() < 3 * MAX_VARINT_LEN64 {
            return Err(SealdexError::Truncated("secure index header"));
        }
        let (hash_size, _) = wire::varint(&input[..MAX_VARINT_LEN64])
            .ok_or(SealdexError::Truncated("hash size field"))?;
        let hash = IndexHash::from_output_size(hash_size)?;
        let (nonce, _) = wire::uvarint(&input[MAX_VARINT_LEN64..2 * MAX_VARINT_LEN64])
            .ok_or(SealdexError::Truncated("nonce field"))?;
        let (size, _) = wire::uvarint(&input[2 * MAX_VARINT_LEN64..3 * MAX_VARINT_LEN64])
            .ok_or(SealdexError::Truncated("filter size field"))?;
        let bloom = SparseBitArray::unmarshal(&input[3 * MAX_VARINT_LEN64..])?;
        Ok(Self {
            bloom,
            nonce,
            size,
            hash,
        })
    }

    /// Membership test: `false` means definitely absent, `true` means
    /// possibly present. Pure; never consults the document payload.
    pub fn contains(&self, trapdoors: &[Vec<u8>]) -> bool {
        if self.size == 0 {
            return false;
        }
        trapdoors
            .iter()
            .all(|trapdoor| {
                self.bloom
                    .get_bit(codeword(self.hash, trapdoor, self.nonce) % self.size)
            })
    }
}
