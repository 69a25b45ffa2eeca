//! Read-only status reported by the hosting filesystem.

use std::path::Path;

use serde::Deserialize;

use sealdex_core::{KeyGen, SealdexError, SealdexResult};

/// Status file the host maintains at the root of every folder.
pub const STATUS_FILE: &str = ".kbfs_status";

/// The slice of the host's folder status the core consumes: which folder
/// this directory belongs to and how far the key rollover has advanced.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderStatus {
    #[serde(rename = "FolderID")]
    pub folder_id: String,
    #[serde(rename = "LatestKeyGeneration")]
    pub latest_key_gen: i64,
}

impl FolderStatus {
    pub fn latest_key_gen(&self) -> KeyGen {
        KeyGen(self.latest_key_gen)
    }
}

pub fn read_folder_status(directory: &Path) -> SealdexResult<FolderStatus> {
    let raw = std::fs::read(directory.join(STATUS_FILE))?;
    serde_json::from_slice(&raw)
        .map_err(|e| SealdexError::Config(format!("corrupt folder status: {e}")))
}
