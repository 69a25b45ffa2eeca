//! The high-level client: one instance per indexed folder.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use sealdex_core::{DocumentId, FolderId, SealdexConfig, SealdexError, SealdexResult};
use sealdex_crypto::{doc_id_to_pathname, pathname_to_doc_id, IndexHash};
use sealdex_server::FolderStore;

use crate::pathutil::rel_path_strict;
use crate::status::read_folder_status;
use crate::vault::KeyVault;

/// Ties the key vault and pathname cipher of one folder to a folder
/// store. All pathnames sent to the store are first relativized against
/// the folder root and rejected if they escape it.
pub struct SearchClient {
    root: PathBuf,
    folder_id: FolderId,
    store: Arc<FolderStore>,
    vault: Arc<KeyVault>,
}

impl SearchClient {
    /// Reads the host status under `root`, registers the folder with the
    /// store, and loads the key material for every generation the host
    /// reports.
    pub async fn new(
        root: impl Into<PathBuf>,
        store: Arc<FolderStore>,
        config: &SealdexConfig,
    ) -> SealdexResult<Self> {
        let root = root.into();
        let status = read_folder_status(&root)?;
        let folder_id = FolderId(status.folder_id.clone());

        let registration = store
            .register_tlf_if_not_exists(
                &folder_id,
                config.index.len_salt,
                config.index.fp_rate,
                config.index.num_uniq_words,
            )
            .await?;

        let hash = parse_hash(&config.index.hash)?;
        let vault = Arc::new(KeyVault::new(
            registration.salts,
            registration.size,
            hash,
            config.index.master_secret_len,
        ));
        vault.sync_from_directory(&root)?;

        Ok(Self {
            root,
            folder_id,
            store,
            vault,
        })
    }

    pub fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    pub fn vault(&self) -> &Arc<KeyVault> {
        &self.vault
    }

    fn relative_pathname(&self, path: &Path) -> SealdexResult<String> {
        Ok(rel_path_strict(&self.root, path)?
            .to_string_lossy()
            .into_owned())
    }

    /// Indexes `path` and stores the result under its document ID.
    /// Re-adding the same path under the same generation overwrites the
    /// stored index in place.
    pub async fn add_file(&self, path: &Path) -> SealdexResult<DocumentId> {
        let pathname = self.relative_pathname(path)?;
        let file_len = std::fs::metadata(path)?.len() as i64;
        let mut reader = BufReader::new(File::open(path)?);

        let (doc_id, index) = self.vault.with_current(|key_gen, builder, key| {
            let doc_id = pathname_to_doc_id(key_gen, &pathname, key);
            let index = builder.build(&mut reader, file_len)?;
            Ok((doc_id, index))
        })?;

        self.store
            .write_index(&self.folder_id, &doc_id, index.marshal())
            .await?;
        Ok(doc_id)
    }

    /// Moves the stored index of `from` to the document ID of `to`. The
    /// old index may live under any known generation, so candidates are
    /// tried newest first; the new identifier keeps the generation of the
    /// index it names.
    pub async fn rename_file(&self, from: &Path, to: &Path) -> SealdexResult<()> {
        let orig_pathname = self.relative_pathname(from)?;
        let curr_pathname = self.relative_pathname(to)?;

        let mut last_err = SealdexError::Storage(format!("no stored index for {orig_pathname}"));
        for (orig, curr) in self.vault.rename_candidates(&orig_pathname, &curr_pathname) {
            match self.store.rename_index(&self.folder_id, &orig, &curr).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Surrenders the document ID of `path`: removes its stored index
    /// under every generation that has one.
    pub async fn remove_file(&self, path: &Path) -> SealdexResult<()> {
        let pathname = self.relative_pathname(path)?;
        for doc_id in self.vault.doc_ids_for(&pathname) {
            self.store.delete_index(&self.folder_id, &doc_id).await?;
        }
        Ok(())
    }

    /// Searches `word` across every known generation and returns the
    /// pathnames of the documents possibly containing it, sorted
    /// lexicographically. Document IDs that fail to decrypt are logged
    /// and skipped.
    pub async fn search_word(&self, word: &str) -> SealdexResult<Vec<String>> {
        let trapdoors = self.vault.trapdoor_map(word);
        let doc_ids = self.store.search_word(&self.folder_id, &trapdoors).await?;

        let keys = self.vault.pathname_keys();
        let mut pathnames: Vec<String> = doc_ids
            .iter()
            .filter_map(|doc_id| match doc_id_to_pathname(doc_id, &keys) {
                Ok(pathname) => Some(pathname),
                Err(e) => {
                    warn!(doc_id = %doc_id, "skipping undecodable document ID: {e}");
                    None
                }
            })
            .collect();
        pathnames.sort();
        pathnames.dedup();
        Ok(pathnames)
    }
}

fn parse_hash(name: &str) -> SealdexResult<IndexHash> {
    match name {
        "sha256" => Ok(IndexHash::Sha256),
        "sha512" => Ok(IndexHash::Sha512),
        other => Err(SealdexError::Config(format!("unknown index hash: {other}"))),
    }
}
