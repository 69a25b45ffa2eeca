//! Deterministic pathname ⇄ document-ID encryption.
//!
//! A document ID is the URL-safe base64 (no padding) of
//! `key generation (8 bytes, LE i64) || nonce (24 bytes) || sealed padded pathname`.
//! The nonce is the first 24 bytes of SHA-256(pathname) and the pathname is
//! zero-padded, so encrypting the same pathname under the same key yields
//! the same document ID across calls. The payload is sealed with
//! XSalsa20-Poly1305, so the server cannot read or forge pathnames.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use sha2::{Digest, Sha256};

use sealdex_core::{DocumentId, KeyGen, SealdexError, SealdexResult};

use crate::{DOC_ID_NONCE_SIZE, KEY_SIZE};

const PAD_PREFIX_LEN: usize = 4;
const VERSION_LEN: usize = 8;
const PREFIX_LEN: usize = VERSION_LEN + DOC_ID_NONCE_SIZE;

/// Encrypts `pathname` under `key` into a stable document identifier
/// tagged with `key_gen`.
pub fn pathname_to_doc_id(key_gen: KeyGen, pathname: &str, key: &[u8; KEY_SIZE]) -> DocumentId {
    let digest = Sha256::digest(pathname.as_bytes());
    let mut nonce = [0u8; DOC_ID_NONCE_SIZE];
    nonce.copy_from_slice(&digest[..DOC_ID_NONCE_SIZE]);

    let padded = pad_pathname(pathname);
    let cipher = XSalsa20Poly1305::new(key.into());
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), padded.as_slice())
        .expect("secretbox sealing of an in-memory buffer cannot fail");

    let mut raw = Vec::with_capacity(PREFIX_LEN + sealed.len());
    raw.extend_from_slice(&key_gen.0.to_le_bytes());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&sealed);
    DocumentId(URL_SAFE_NO_PAD.encode(raw))
}

/// Decrypts `doc_id` back to its pathname, selecting the key for the
/// generation recorded in the identifier from `keys` (ordered by
/// generation).
pub fn doc_id_to_pathname(doc_id: &DocumentId, keys: &[[u8; KEY_SIZE]]) -> SealdexResult<String> {
    let raw = decode_doc_id(doc_id)?;
    let key_gen = read_key_gen(&raw);
    let key = keys
        .get(key_gen.offset()?)
        .ok_or(SealdexError::KeyNotFound(key_gen))?;

    let nonce = Nonce::from_slice(&raw[VERSION_LEN..PREFIX_LEN]);
    let cipher = XSalsa20Poly1305::new(key.into());
    let padded = cipher
        .decrypt(nonce, &raw[PREFIX_LEN..])
        .map_err(|_| SealdexError::InvalidDocId("authentication failed".into()))?;
    depad_pathname(&padded)
}

/// Reads the key generation from `doc_id` without decrypting the payload.
pub fn key_gen_from_doc_id(doc_id: &DocumentId) -> SealdexResult<KeyGen> {
    Ok(read_key_gen(&decode_doc_id(doc_id)?))
}

fn decode_doc_id(doc_id: &DocumentId) -> SealdexResult<Vec<u8>> {
    let raw = URL_SAFE_NO_PAD
        .decode(doc_id.as_str())
        .map_err(|e| SealdexError::InvalidDocId(e.to_string()))?;
    if raw.len() < PREFIX_LEN {
        return Err(SealdexError::InvalidDocId(
            "shorter than the generation and nonce prefix".into(),
        ));
    }
    Ok(raw)
}

fn read_key_gen(raw: &[u8]) -> KeyGen {
    KeyGen(i64::from_le_bytes(
        raw[..VERSION_LEN].try_into().expect("8-byte slice"),
    ))
}

/// Smallest power of two strictly greater than `n` when `n` is itself a
/// power of two, else the smallest power of two at or above `n`.
pub fn next_power_of_two(n: u32) -> u32 {
    if n.is_power_of_two() {
        n << 1
    } else {
        n.next_power_of_two()
    }
}

/// `orig_len (4 bytes, LE) || pathname || zero fill`. The fill is
/// deterministic so that sealing under a fixed key is stable.
fn pad_pathname(pathname: &str) -> Vec<u8> {
    let orig_len = pathname.len() as u32;
    let padded_len = next_power_of_two(orig_len) as usize;
    let mut buf = Vec::with_capacity(PAD_PREFIX_LEN + padded_len);
    buf.extend_from_slice(&orig_len.to_le_bytes());
    buf.extend_from_slice(pathname.as_bytes());
    buf.resize(PAD_PREFIX_LEN + padded_len, 0);
    buf
}

fn depad_pathname(padded: &[u8]) -> SealdexResult<String> {
    if padded.len() < PAD_PREFIX_LEN {
        return Err(SealdexError::Truncated("padded pathname prefix"));
    }
    let orig_len = u32::from_le_bytes(padded[..PAD_PREFIX_LEN].try_into().expect("4-byte slice"))
        as usize;
    let end = PAD_PREFIX_LEN + orig_len;
    if end > padded.len() {
        return Err(SealdexError::InvalidDocId(
            "declared pathname length exceeds the payload".into(),
        ));
    }
    String::from_utf8(padded[PAD_PREFIX_LEN..end].to_vec())
        .map_err(|e| SealdexError::InvalidDocId(e.to_string()))
}
