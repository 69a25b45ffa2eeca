//! sealdex-client: everything that runs in the client trust domain.
//!
//! Persists master secrets per key generation, reads the hosting
//! filesystem's status file, guards the indexing boundary, and keeps an
//! append-only vault of per-generation index builders and pathname keys.
//! [`SearchClient`] ties the vault to a folder store: add a file, rename
//! it, delete it, or search a keyword across every known generation.

pub mod client;
pub mod pathutil;
pub mod secret;
pub mod status;
pub mod vault;

pub use client::SearchClient;
pub use pathutil::rel_path_strict;
pub use secret::{fetch_master_secret, read_last_indexed, write_last_indexed};
pub use status::{read_folder_status, FolderStatus, STATUS_FILE};
pub use vault::{spawn_rekey_watcher, KeyVault};
