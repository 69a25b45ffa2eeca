//! Builds the per-document secure indexes.

use std::collections::HashSet;
use std::io::Read;

use rand::rngs::OsRng;
use rand::RngCore;

use sealdex_core::{SealdexError, SealdexResult};

use crate::bitarray::SparseBitArray;
use crate::index::{codeword, hmac_tag, IndexHash, SecureIndex};
use crate::kdf::{derive_key_vector, MasterSecret, PrfKey};
use crate::normalize::normalize_keyword;

/// Ratio of random values drawn per batch to the number still needed; the
/// surplus covers values rejected by the range check, so most blinding
/// rounds finish in a single RNG call.
const RNG_BATCH_FACTOR: f64 = 1.3;

/// Client-side index factory for one (folder, key generation) pair.
///
/// Holds the PRF key vector derived from the master secret and the server
/// salts. A builder is immutable after construction and may be shared
/// freely across threads for reads; a single `build` call is not
/// interruptible-and-resumable.
pub struct SecureIndexBuilder {
    keys: Vec<PrfKey>,
    hash: IndexHash,
    size: u64,
}

impl SecureIndexBuilder {
    pub fn new(hash: IndexHash, master: &MasterSecret, salts: &[Vec<u8>], size: u64) -> Self {
        Self {
            keys: derive_key_vector(master, salts),
            hash,
            size,
        }
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn index_size(&self) -> u64 {
        self.size
    }

    /// Trapdoors for `word`, one per PRF key. The word is normalized
    /// before derivation so that queries match indexes built from any
    /// capitalization or punctuation of the same word.
    pub fn compute_trapdoors(&self, word: &str) -> Vec<Vec<u8>> {
        self.trapdoors_raw(&normalize_keyword(word))
    }

    fn trapdoors_raw(&self, word: &str) -> Vec<Vec<u8>> {
        self.keys
            .iter()
            .map(|key| hmac_tag(self.hash, key.as_bytes(), word.as_bytes()))
            .collect()
    }

    /// Scans `document` token-by-token and sets one filter bit per
    /// (distinct normalized token, PRF key) pair. Returns the filter and
    /// the number of distinct tokens.
    fn build_bloom_filter(
        &self,
        nonce: u64,
        document: &mut impl Read,
    ) -> SealdexResult<(SparseBitArray, i64)> {
        let mut raw = Vec::new();
        document.read_to_end(&mut raw)?;
        let text = String::from_utf8_lossy(&raw);

        let mut bloom = SparseBitArray::new();
        let mut seen: HashSet<String> = HashSet::new();
        for token in text.split_whitespace() {
            let word = normalize_keyword(token);
            if seen.contains(&word) {
                continue;
            }
            for trapdoor in self.trapdoors_raw(&word) {
                bloom.set_bit(codeword(self.hash, &trapdoor, nonce) % self.size);
            }
            seen.insert(word);
        }
        Ok((bloom, seen.len() as i64))
    }

    /// Sets `num_iterations` additional bits, drawn uniformly from
    /// [0, size), so the filter population does not reveal the document's
    /// vocabulary size. Collisions with already-set bits are fine.
    ///
    /// Values are drawn in batches and rejection-sampled against the
    /// smallest all-ones mask covering `size`; per-value RNG calls would
    /// dominate the cost of large builds.
    fn blind_bloom_filter(
        &self,
        bloom: &mut SparseBitArray,
        num_iterations: i64,
    ) -> SealdexResult<()> {
        let mut remaining = num_iterations;
        let mask = u64::MAX >> self.size.leading_zeros();
        while remaining > 0 {
            let batch = (remaining as f64 * RNG_BATCH_FACTOR) as usize;
            let mut raw = vec![0u8; batch * 8];
            OsRng
                .try_fill_bytes(&mut raw)
                .map_err(|e| SealdexError::Rng(e.to_string()))?;
            for chunk in raw.chunks_exact(8) {
                let candidate = u64::from_le_bytes(chunk.try_into().expect("8-byte chunk")) & mask;
                if candidate < self.size {
                    bloom.set_bit(candidate);
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds the secure index for `document`, whose *encrypted* length is
    /// `file_len`. The encrypted length drives blinding only; when it is
    /// smaller than the distinct-token count no blinding is applied.
    pub fn build(&self, document: &mut impl Read, file_len: i64) -> SealdexResult<SecureIndex> {
        let nonce = random_u64()?;
        let (mut bloom, num_uniq_words) = self.build_bloom_filter(nonce, document)?;
        self.blind_bloom_filter(&mut bloom, (file_len - num_uniq_words) * self.keys.len() as i64)?;
        Ok(SecureIndex {
            bloom,
            nonce,
            size: self.size,
            hash: self.hash,
        })
    }
}

fn random_u64() -> SealdexResult<u64> {
    let mut raw = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut raw)
        .map_err(|e| SealdexError::Rng(e.to_string()))?;
    Ok(u64::from_le_bytes(raw))
}
