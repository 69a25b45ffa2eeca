//! sealdex-server: the untrusted half of the system.
//!
//! Holds public per-folder state (salts, index size) and the stored
//! secure indexes, and evaluates trapdoor queries against them. Nothing
//! in this crate ever sees a master secret, a PRF key, or a cleartext
//! pathname; the only cryptography that runs here is the pure membership
//! test on a stored index.

pub mod store;

pub use store::{FolderStore, Registration};
