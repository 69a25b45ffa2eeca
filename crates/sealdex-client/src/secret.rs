//! Client-persisted state: per-generation master secrets and the
//! last-indexed timestamp.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sealdex_core::{KeyGen, SealdexError, SealdexResult};
use sealdex_crypto::MasterSecret;

/// Master-secret file per key generation, e.g. `.search_kbfs_secret_1`.
pub const SECRET_FILE_PREFIX: &str = ".search_kbfs_secret_";

/// Last-indexed timestamp, a JSON-encoded instant consumed by the crawler.
pub const TIMESTAMP_FILE: &str = ".search_kbfs_timestamp";

fn secret_path(directory: &Path, key_gen: KeyGen) -> PathBuf {
    directory.join(format!("{SECRET_FILE_PREFIX}{key_gen}"))
}

/// Returns the master secret of `key_gen` under `directory`.
///
/// On first use the file is created exclusively and filled with `len`
/// fresh random bytes; afterwards the stored bytes are read back and
/// their length validated. The create-then-read split means two racing
/// clients agree on whichever secret landed first.
pub fn fetch_master_secret(
    directory: &Path,
    key_gen: KeyGen,
    len: usize,
) -> SealdexResult<MasterSecret> {
    let path = secret_path(directory, key_gen);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o666);
    }

    match options.open(&path) {
        Ok(mut file) => {
            let secret = MasterSecret::generate(len)?;
            file.write_all(secret.as_bytes())?;
            Ok(secret)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let bytes = fs::read(&path)?;
            if bytes.len() != len {
                return Err(SealdexError::Config(format!(
                    "master secret for generation {key_gen} has length {}, expected {len}",
                    bytes.len()
                )));
            }
            Ok(MasterSecret::from_bytes(bytes))
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes `content` to `path` through a temp file in the same directory
/// plus a rename, so concurrent readers never observe a partial write.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> SealdexResult<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads the last-indexed instant, or `None` if the folder was never
/// indexed.
pub fn read_last_indexed(directory: &Path) -> SealdexResult<Option<SystemTime>> {
    match fs::read(directory.join(TIMESTAMP_FILE)) {
        Ok(raw) => serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| SealdexError::Config(format!("corrupt timestamp file: {e}"))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn write_last_indexed(directory: &Path, at: SystemTime) -> SealdexResult<()> {
    let raw = serde_json::to_vec(&at)
        .map_err(|e| SealdexError::Config(format!("timestamp encoding: {e}")))?;
    write_file_atomic(&directory.join(TIMESTAMP_FILE), &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_master_secret_create_then_read() {
        let dir = tempfile::tempdir().unwrap();

        let first = fetch_master_secret(dir.path(), KeyGen(1), 64).unwrap();
        assert_eq!(first.len(), 64);

        let second = fetch_master_secret(dir.path(), KeyGen(1), 64).unwrap();
        assert_eq!(
            first.as_bytes(),
            second.as_bytes(),
            "a second fetch must read back the persisted secret"
        );
    }

    #[test]
    fn test_fetch_master_secret_per_generation() {
        let dir = tempfile::tempdir().unwrap();
        let gen1 = fetch_master_secret(dir.path(), KeyGen(1), 64).unwrap();
        let gen2 = fetch_master_secret(dir.path(), KeyGen(2), 64).unwrap();
        assert_ne!(gen1.as_bytes(), gen2.as_bytes());
    }

    #[test]
    fn test_fetch_master_secret_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        fetch_master_secret(dir.path(), KeyGen(1), 64).unwrap();
        assert!(matches!(
            fetch_master_secret(dir.path(), KeyGen(1), 32),
            Err(SealdexError::Config(_))
        ));
    }

    #[test]
    fn test_write_file_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        write_file_atomic(&path, b"first").unwrap();
        write_file_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join(".state.tmp").exists());
    }

    #[test]
    fn test_last_indexed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_last_indexed(dir.path()).unwrap().is_none());

        let now = SystemTime::now();
        write_last_indexed(dir.path(), now).unwrap();
        assert_eq!(read_last_indexed(dir.path()).unwrap(), Some(now));
    }
}
