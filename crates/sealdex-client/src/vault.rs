//! Append-only vault of per-generation key material.
//!
//! The generation vector and its builders are the one shared-mutable in
//! the client: readers (index builds, trapdoor derivation, document-ID
//! decryption) hold the read lock for the whole operation so the vector
//! cannot change underneath them; the rekey watcher holds the write lock
//! to append. Generations are never replaced or removed — forgetting an
//! old generation would orphan every document ID sealed under it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{info, warn};

use sealdex_core::{DocumentId, KeyGen, SealdexError, SealdexResult};
use sealdex_crypto::{
    derive_pathname_key, pathname_to_doc_id, IndexHash, MasterSecret, SecureIndexBuilder,
    KEY_SIZE,
};

use crate::secret::fetch_master_secret;
use crate::status::read_folder_status;

struct Generation {
    key_gen: KeyGen,
    builder: SecureIndexBuilder,
    pathname_key: [u8; KEY_SIZE],
}

pub struct KeyVault {
    salts: Vec<Vec<u8>>,
    index_size: u64,
    hash: IndexHash,
    master_secret_len: usize,
    generations: RwLock<Vec<Generation>>,
}

impl KeyVault {
    pub fn new(
        salts: Vec<Vec<u8>>,
        index_size: u64,
        hash: IndexHash,
        master_secret_len: usize,
    ) -> Self {
        Self {
            salts,
            index_size,
            hash,
            master_secret_len,
            generations: RwLock::new(Vec::new()),
        }
    }

    /// Appends the key material for `key_gen`, which must be the next
    /// generation after the ones already held.
    pub fn append_generation(&self, key_gen: KeyGen, master: &MasterSecret) -> SealdexResult<()> {
        let mut generations = self.generations.write().expect("vault lock poisoned");
        let expected = KeyGen(generations.len() as i64 + KeyGen::FIRST_VALID.0);
        if key_gen != expected {
            return Err(SealdexError::InvalidKeyGen(key_gen.0));
        }
        generations.push(Generation {
            key_gen,
            builder: SecureIndexBuilder::new(self.hash, master, &self.salts, self.index_size),
            pathname_key: derive_pathname_key(master),
        });
        Ok(())
    }

    pub fn latest_key_gen(&self) -> Option<KeyGen> {
        self.generations
            .read()
            .expect("vault lock poisoned")
            .last()
            .map(|g| g.key_gen)
    }

    /// Runs `f` with the newest generation's builder and pathname key,
    /// holding the read lock for the duration of the call.
    pub fn with_current<R>(
        &self,
        f: impl FnOnce(KeyGen, &SecureIndexBuilder, &[u8; KEY_SIZE]) -> SealdexResult<R>,
    ) -> SealdexResult<R> {
        let generations = self.generations.read().expect("vault lock poisoned");
        let current = generations
            .last()
            .ok_or(SealdexError::KeyNotFound(KeyGen::FIRST_VALID))?;
        f(current.key_gen, &current.builder, &current.pathname_key)
    }

    /// One trapdoor vector per known generation for `word`.
    pub fn trapdoor_map(&self, word: &str) -> HashMap<KeyGen, Vec<Vec<u8>>> {
        let generations = self.generations.read().expect("vault lock poisoned");
        generations
            .iter()
            .map(|g| (g.key_gen, g.builder.compute_trapdoors(word)))
            .collect()
    }

    /// Pathname keys ordered by generation, for document-ID decryption.
    pub fn pathname_keys(&self) -> Vec<[u8; KEY_SIZE]> {
        let generations = self.generations.read().expect("vault lock poisoned");
        generations.iter().map(|g| g.pathname_key).collect()
    }

    /// The document IDs `pathname` would carry under each known
    /// generation, newest first.
    pub fn doc_ids_for(&self, pathname: &str) -> Vec<DocumentId> {
        let generations = self.generations.read().expect("vault lock poisoned");
        generations
            .iter()
            .rev()
            .map(|g| pathname_to_doc_id(g.key_gen, pathname, &g.pathname_key))
            .collect()
    }

    /// Document-ID pairs for renaming `from` to `to`, newest generation
    /// first. Both identifiers of a pair are sealed under the same
    /// generation: an index keeps the generation its filter bits were
    /// built with, so a rename must not re-tag it.
    pub fn rename_candidates(&self, from: &str, to: &str) -> Vec<(DocumentId, DocumentId)> {
        let generations = self.generations.read().expect("vault lock poisoned");
        generations
            .iter()
            .rev()
            .map(|g| {
                (
                    pathname_to_doc_id(g.key_gen, from, &g.pathname_key),
                    pathname_to_doc_id(g.key_gen, to, &g.pathname_key),
                )
            })
            .collect()
    }

    /// Catches the vault up with the host: reads the status file under
    /// `directory` and appends every generation up to the reported latest.
    /// Returns how many generations were appended.
    pub fn sync_from_directory(&self, directory: &Path) -> SealdexResult<usize> {
        let status = read_folder_status(directory)?;
        let latest = status.latest_key_gen();

        let mut appended = 0;
        loop {
            let next = match self.latest_key_gen() {
                Some(gen) => gen.next(),
                None => KeyGen::FIRST_VALID,
            };
            if next > latest {
                break;
            }
            let master = fetch_master_secret(directory, next, self.master_secret_len)?;
            self.append_generation(next, &master)?;
            appended += 1;
        }
        Ok(appended)
    }
}

/// Polls the host status file at a coarse cadence and appends newly
/// observed key generations. Abort the handle to stop watching.
pub fn spawn_rekey_watcher(
    vault: Arc<KeyVault>,
    directory: PathBuf,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match vault.sync_from_directory(&directory) {
                Ok(0) => {}
                Ok(n) => info!(appended = n, "rekey watcher picked up new key generations"),
                Err(e) => warn!("rekey watcher: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealdex_crypto::generate_salts;

    fn test_vault() -> KeyVault {
        let salts = generate_salts(13, 8).unwrap();
        KeyVault::new(salts, 1_900_000, IndexHash::Sha256, 64)
    }

    #[test]
    fn test_append_enforces_contiguity() {
        let vault = test_vault();
        let master = MasterSecret::from_bytes(vec![1u8; 64]);

        assert!(matches!(
            vault.append_generation(KeyGen(2), &master),
            Err(SealdexError::InvalidKeyGen(2))
        ));
        vault.append_generation(KeyGen(1), &master).unwrap();
        vault.append_generation(KeyGen(2), &master).unwrap();
        assert!(matches!(
            vault.append_generation(KeyGen(2), &master),
            Err(SealdexError::InvalidKeyGen(2))
        ));
        assert_eq!(vault.latest_key_gen(), Some(KeyGen(2)));
    }

    #[test]
    fn test_empty_vault_has_no_current() {
        let vault = test_vault();
        assert!(vault.with_current(|_, _, _| Ok(())).is_err());
        assert!(vault.trapdoor_map("word").is_empty());
    }

    #[test]
    fn test_trapdoor_map_covers_all_generations() {
        let vault = test_vault();
        vault
            .append_generation(KeyGen(1), &MasterSecret::from_bytes(vec![1u8; 64]))
            .unwrap();
        vault
            .append_generation(KeyGen(2), &MasterSecret::from_bytes(vec![2u8; 64]))
            .unwrap();

        let map = vault.trapdoor_map("pikachu");
        assert_eq!(map.len(), 2);
        assert_ne!(
            map[&KeyGen(1)],
            map[&KeyGen(2)],
            "distinct secrets must give distinct trapdoors"
        );
    }

    #[test]
    fn test_doc_ids_round_trip_through_pathname_keys() {
        let vault = test_vault();
        vault
            .append_generation(KeyGen(1), &MasterSecret::from_bytes(vec![1u8; 64]))
            .unwrap();
        vault
            .append_generation(KeyGen(2), &MasterSecret::from_bytes(vec![2u8; 64]))
            .unwrap();

        let doc_ids = vault.doc_ids_for("a/b.txt");
        assert_eq!(doc_ids.len(), 2);
        let keys = vault.pathname_keys();
        for doc_id in &doc_ids {
            assert_eq!(
                sealdex_crypto::doc_id_to_pathname(doc_id, &keys).unwrap(),
                "a/b.txt"
            );
        }
    }

    #[test]
    fn test_sync_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::status::STATUS_FILE),
            r#"{"FolderID": "tlf1", "LatestKeyGeneration": 2}"#,
        )
        .unwrap();

        let vault = test_vault();
        assert_eq!(vault.sync_from_directory(dir.path()).unwrap(), 2);
        assert_eq!(vault.latest_key_gen(), Some(KeyGen(2)));
        // A second sync with an unchanged status is a no-op.
        assert_eq!(vault.sync_from_directory(dir.path()).unwrap(), 0);
    }
}
