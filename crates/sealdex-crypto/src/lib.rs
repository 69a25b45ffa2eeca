//! sealdex-crypto: the searchable-encryption core
//!
//! Pipeline: document stream → normalize tokens → trapdoors (HMAC, one per
//! PRF key) → codewords (HMAC keyed by trapdoor over the index nonce) →
//! blinded bloom filter → varint-framed index blob
//!
//! Key hierarchy:
//! ```text
//! Master Secret (per folder, per key generation, random bytes)
//!   ├── PRF key vector (PBKDF2-HMAC-SHA256 over the server salts, 4096 rounds)
//!   │     └── trapdoor_i = HMAC-H(key_i, normalized word)
//!   └── Pathname key (HKDF-SHA256, domain "sealdex-docid", XSalsa20-Poly1305)
//! ```
//!
//! Everything here is pure and synchronous; only the index builder touches
//! an RNG (index nonce and blinding bits). The membership test on a stored
//! index is the single piece that runs in the server trust domain.

pub mod bitarray;
pub mod builder;
pub mod docid;
pub mod index;
pub mod kdf;
pub mod normalize;
pub mod wire;

pub use bitarray::SparseBitArray;
pub use builder::SecureIndexBuilder;
pub use docid::{doc_id_to_pathname, key_gen_from_doc_id, next_power_of_two, pathname_to_doc_id};
pub use index::{IndexHash, SecureIndex};
pub use kdf::{derive_key_vector, derive_pathname_key, generate_salts, MasterSecret, PrfKey};
pub use normalize::normalize_keyword;

/// Size of a PRF key and of the pathname-cipher key, in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the deterministic pathname-cipher nonce (192-bit)
pub const DOC_ID_NONCE_SIZE: usize = 24;
