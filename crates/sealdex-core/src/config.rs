use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SealdexError, SealdexResult};

/// Top-level configuration (loaded from sealdex.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealdexConfig {
    pub index: IndexConfig,
    pub client: ClientConfig,
    pub server: ServerConfig,
}

impl SealdexConfig {
    pub fn load(path: &Path) -> SealdexResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| SealdexError::Config(e.to_string()))
    }
}

/// Parameters shared by every index built for a folder. Changing these
/// after a folder is registered invalidates its stored indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Target per-word false-positive probability; the number of PRF keys
    /// is derived as ceil(-log2(fp_rate))
    pub fp_rate: f64,
    /// Length in bytes of each server-held salt (8 or more recommended)
    pub len_salt: usize,
    /// Expected number of unique words across the folder, drives the
    /// bloom-filter size
    pub num_uniq_words: u64,
    /// Length in bytes of the per-generation master secret
    pub master_secret_len: usize,
    /// Hash backing the PRFs: "sha256" or "sha512"
    pub hash: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fp_rate: 0.000001,
            len_salt: 8,
            num_uniq_words: 100_000,
            master_secret_len: 64,
            hash: "sha256".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How often the rekey watcher polls the host status file, in seconds
    pub rekey_poll_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rekey_poll_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Root directory for the on-disk index store
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".sealdex_server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[index]
fp_rate = 0.0001
len_salt = 16
num_uniq_words = 50000
master_secret_len = 32
hash = "sha512"

[client]
rekey_poll_secs = 600

[server]
root = "/var/lib/sealdex"
"#;
        let config: SealdexConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.index.fp_rate, 0.0001);
        assert_eq!(config.index.len_salt, 16);
        assert_eq!(config.index.num_uniq_words, 50000);
        assert_eq!(config.index.master_secret_len, 32);
        assert_eq!(config.index.hash, "sha512");
        assert_eq!(config.client.rekey_poll_secs, 600);
        assert_eq!(config.server.root, PathBuf::from("/var/lib/sealdex"));
    }

    #[test]
    fn test_parse_defaults() {
        let config: SealdexConfig = toml::from_str("").unwrap();

        assert_eq!(config.index.fp_rate, 0.000001);
        assert_eq!(config.index.len_salt, 8);
        assert_eq!(config.index.num_uniq_words, 100_000);
        assert_eq!(config.index.master_secret_len, 64);
        assert_eq!(config.index.hash, "sha256");
        assert_eq!(config.client.rekey_poll_secs, 3600);
        assert_eq!(config.server.root, PathBuf::from(".sealdex_server"));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[index]
fp_rate = 0.001
"#;
        let config: SealdexConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.index.fp_rate, 0.001);
        // Defaults
        assert_eq!(config.index.len_salt, 8);
        assert_eq!(config.client.rekey_poll_secs, 3600);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SealdexConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SealdexConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.index.fp_rate, parsed.index.fp_rate);
        assert_eq!(config.index.hash, parsed.index.hash);
        assert_eq!(config.server.root, parsed.server.root);
    }
}
