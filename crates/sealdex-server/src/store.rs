//! Folder registration and the blob store for secure indexes.
//!
//! Layout, one directory per folder:
//! ```text
//! <folder_id>/meta.json        salts, index size, registration parameters
//! <folder_id>/<doc_id>.index   one marshalled secure index per document
//! ```
//! Backed by an OpenDAL operator so production runs on a filesystem and
//! tests on the in-memory service.

use std::collections::HashMap;
use std::f64::consts::LN_2;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use opendal::{ErrorKind, Operator};
use serde::{Deserialize, Serialize};
use tracing::warn;

use sealdex_core::{DocumentId, FolderId, KeyGen, SealdexError, SealdexResult};
use sealdex_crypto::{generate_salts, key_gen_from_doc_id, SecureIndex};

const META_FILE: &str = "meta.json";
const INDEX_SUFFIX: &str = ".index";

/// Public per-folder state persisted at registration time.
#[derive(Debug, Serialize, Deserialize)]
struct FolderMeta {
    /// Salts, base64-encoded for JSON
    salts: Vec<String>,
    /// Number of buckets in each bloom filter
    size: u64,
    fp_rate: f64,
    num_uniq_words: u64,
}

/// What a client needs to instantiate its index builders.
#[derive(Debug, Clone)]
pub struct Registration {
    pub salts: Vec<Vec<u8>>,
    pub size: u64,
}

pub struct FolderStore {
    op: Operator,
}

impl FolderStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// A store rooted at a local directory.
    pub fn local(root: &Path) -> SealdexResult<Self> {
        let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
        let op = Operator::new(builder).map_err(storage_err)?.finish();
        Ok(Self::new(op))
    }

    fn meta_path(folder: &FolderId) -> String {
        format!("{folder}/{META_FILE}")
    }

    fn index_path(folder: &FolderId, doc_id: &DocumentId) -> String {
        format!("{folder}/{doc_id}{INDEX_SUFFIX}")
    }

    /// Registers `folder` if it has no metadata yet, deriving the number
    /// of salts from `fp_rate` and the filter size from the optimal bloom
    /// sizing, then returns the (existing or fresh) public parameters.
    pub async fn register_tlf_if_not_exists(
        &self,
        folder: &FolderId,
        len_salt: usize,
        fp_rate: f64,
        num_uniq_words: u64,
    ) -> SealdexResult<Registration> {
        match self.try_read_meta(folder).await? {
            Some(meta) => registration_from_meta(&meta),
            None => {
                let num_keys = (-fp_rate.log2()).ceil() as usize;
                let size = (num_uniq_words as f64 * num_keys as f64 / LN_2).ceil() as u64;
                let salts = generate_salts(num_keys, len_salt)?;
                let meta = FolderMeta {
                    salts: salts.iter().map(|s| STANDARD.encode(s)).collect(),
                    size,
                    fp_rate,
                    num_uniq_words,
                };
                let raw = serde_json::to_vec(&meta)
                    .map_err(|e| SealdexError::Storage(e.to_string()))?;
                self.op
                    .write(&Self::meta_path(folder), raw)
                    .await
                    .map_err(storage_err)?;
                Ok(Registration { salts, size })
            }
        }
    }

    pub async fn get_salts(&self, folder: &FolderId) -> SealdexResult<Vec<Vec<u8>>> {
        Ok(registration_from_meta(&self.read_meta(folder).await?)?.salts)
    }

    pub async fn get_size(&self, folder: &FolderId) -> SealdexResult<u64> {
        Ok(self.read_meta(folder).await?.size)
    }

    async fn try_read_meta(&self, folder: &FolderId) -> SealdexResult<Option<FolderMeta>> {
        let raw = match self.op.read(&Self::meta_path(folder)).await {
            Ok(buf) => buf.to_vec(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| SealdexError::Storage(e.to_string()))
    }

    async fn read_meta(&self, folder: &FolderId) -> SealdexResult<FolderMeta> {
        self.try_read_meta(folder).await?.ok_or_else(|| {
            SealdexError::Storage(format!("folder not registered: {folder}"))
        })
    }

    pub async fn write_index(
        &self,
        folder: &FolderId,
        doc_id: &DocumentId,
        index: Vec<u8>,
    ) -> SealdexResult<()> {
        self.op
            .write(&Self::index_path(folder, doc_id), index)
            .await
            .map_err(storage_err)
    }

    /// Moves the index of a renamed document to its new identifier.
    pub async fn rename_index(
        &self,
        folder: &FolderId,
        orig: &DocumentId,
        curr: &DocumentId,
    ) -> SealdexResult<()> {
        let raw = match self.op.read(&Self::index_path(folder, orig)).await {
            Ok(buf) => buf.to_vec(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SealdexError::Storage(format!(
                    "no stored index for document {orig}"
                )));
            }
            Err(e) => return Err(storage_err(e)),
        };
        self.op
            .write(&Self::index_path(folder, curr), raw)
            .await
            .map_err(storage_err)?;
        self.op
            .delete(&Self::index_path(folder, orig))
            .await
            .map_err(storage_err)
    }

    pub async fn delete_index(&self, folder: &FolderId, doc_id: &DocumentId) -> SealdexResult<()> {
        self.op
            .delete(&Self::index_path(folder, doc_id))
            .await
            .map_err(storage_err)
    }

    /// Evaluates one trapdoor vector per key generation against every
    /// stored index of `folder` and returns the documents possibly
    /// containing the word, in traversal order. Indexes that fail to
    /// decode, or whose generation has no vector in `trapdoors`, are
    /// skipped.
    pub async fn search_word(
        &self,
        folder: &FolderId,
        trapdoors: &HashMap<KeyGen, Vec<Vec<u8>>>,
    ) -> SealdexResult<Vec<DocumentId>> {
        let mut matches = Vec::new();
        for doc_id in self.list_doc_ids(folder).await? {
            let key_gen = match key_gen_from_doc_id(&doc_id) {
                Ok(gen) => gen,
                Err(e) => {
                    warn!(doc_id = %doc_id, "skipping index with undecodable document ID: {e}");
                    continue;
                }
            };
            let Some(vector) = trapdoors.get(&key_gen) else {
                continue;
            };
            let raw = self
                .op
                .read(&Self::index_path(folder, &doc_id))
                .await
                .map_err(storage_err)?
                .to_vec();
            let index = match SecureIndex::unmarshal(&raw) {
                Ok(index) => index,
                Err(e) => {
                    warn!(doc_id = %doc_id, "skipping undecodable index: {e}");
                    continue;
                }
            };
            if index.contains(vector) {
                matches.push(doc_id);
            }
        }
        Ok(matches)
    }

    /// Key generations observed across the stored document IDs, ascending.
    pub async fn get_key_gens(&self, folder: &FolderId) -> SealdexResult<Vec<KeyGen>> {
        let mut gens: Vec<KeyGen> = Vec::new();
        for doc_id in self.list_doc_ids(folder).await? {
            match key_gen_from_doc_id(&doc_id) {
                Ok(gen) if !gens.contains(&gen) => gens.push(gen),
                Ok(_) => {}
                Err(e) => {
                    warn!(doc_id = %doc_id, "skipping undecodable document ID: {e}");
                }
            }
        }
        gens.sort();
        Ok(gens)
    }

    async fn list_doc_ids(&self, folder: &FolderId) -> SealdexResult<Vec<DocumentId>> {
        let entries = self
            .op
            .list(&format!("{folder}/"))
            .await
            .map_err(storage_err)?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.name().strip_suffix(INDEX_SUFFIX))
            .map(|id| DocumentId(id.to_string()))
            .collect())
    }
}

fn registration_from_meta(meta: &FolderMeta) -> SealdexResult<Registration> {
    let salts = meta
        .salts
        .iter()
        .map(|s| {
            STANDARD
                .decode(s)
                .map_err(|e| SealdexError::Storage(format!("corrupt salt in folder meta: {e}")))
        })
        .collect::<SealdexResult<Vec<_>>>()?;
    Ok(Registration {
        salts,
        size: meta.size,
    })
}

fn storage_err(e: opendal::Error) -> SealdexError {
    SealdexError::Storage(e.to_string())
}
