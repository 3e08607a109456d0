// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Document storage
//!
//! Summary documents are addressed by `(kind, id)`. Two stores are provided:
//! an in-memory map for tests and embedding, and a file store that keeps one
//! JSON file per document and loads everything on open.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{SummaryError, SummaryResult};
use async_trait::async_trait;
use recap_core::SummaryDocument;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

type DocumentKey = (String, String);

/// Entity store holding summary documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document; `Ok(None)` when absent
    async fn get(&self, kind: &str, id: &str) -> SummaryResult<Option<SummaryDocument>>;

    /// Insert or replace a document
    async fn upsert(&self, document: &SummaryDocument) -> SummaryResult<()>;

    /// Remove a document, returning whether it existed
    async fn delete(&self, kind: &str, id: &str) -> SummaryResult<bool>;

    /// Documents of a kind, most recently updated first
    async fn list(&self, kind: &str, limit: Option<usize>) -> SummaryResult<Vec<SummaryDocument>>;
}

/// Open the store selected by the configuration.
pub async fn open_store(config: &StorageConfig) -> SummaryResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryDocumentStore::new())),
        StorageBackend::File => Ok(Arc::new(FileDocumentStore::open(&config.data_dir).await?)),
    }
}

fn list_sorted(
    documents: &HashMap<DocumentKey, SummaryDocument>,
    kind: &str,
    limit: Option<usize>,
) -> Vec<SummaryDocument> {
    let mut results: Vec<SummaryDocument> = documents
        .values()
        .filter(|doc| doc.kind == kind)
        .cloned()
        .collect();

    // Newest first, ties broken by id for a stable order
    results.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.id.cmp(&b.id)));

    if let Some(limit) = limit {
        results.truncate(limit);
    }
    results
}

fn key(kind: &str, id: &str) -> DocumentKey {
    (kind.to_string(), id.to_string())
}

/// In-memory store for development/testing
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentKey, SummaryDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, kind: &str, id: &str) -> SummaryResult<Option<SummaryDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&key(kind, id)).cloned())
    }

    async fn upsert(&self, document: &SummaryDocument) -> SummaryResult<()> {
        let mut documents = self.documents.write().await;
        documents.insert(key(&document.kind, &document.id), document.clone());
        Ok(())
    }

    async fn delete(&self, kind: &str, id: &str) -> SummaryResult<bool> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(&key(kind, id)).is_some())
    }

    async fn list(&self, kind: &str, limit: Option<usize>) -> SummaryResult<Vec<SummaryDocument>> {
        let documents = self.documents.read().await;
        Ok(list_sorted(&documents, kind, limit))
    }
}

/// File-backed store: `<root>/<kind>/<id>.json`
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    documents: RwLock<HashMap<DocumentKey, SummaryDocument>>,
}

impl FileDocumentStore {
    /// Open a store rooted at `path`, loading existing documents
    pub async fn open(path: impl AsRef<Path>) -> SummaryResult<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&path).await?;

        let store = Self {
            path,
            documents: RwLock::new(HashMap::new()),
        };
        store.load_from_disk().await?;

        tracing::info!(
            path = %store.path.display(),
            documents = store.documents.read().await.len(),
            "Opened summary document store"
        );
        Ok(store)
    }

    /// Root directory of the store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document_path(&self, kind: &str, id: &str) -> PathBuf {
        self.path
            .join(file_component(kind))
            .join(format!("{}.json", file_component(id)))
    }

    async fn load_from_disk(&self) -> SummaryResult<()> {
        let mut documents = self.documents.write().await;

        let mut kinds = tokio::fs::read_dir(&self.path).await?;
        while let Some(kind_dir) = kinds.next_entry().await? {
            if !kind_dir.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(kind_dir.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if !path.extension().map(|e| e == "json").unwrap_or(false) {
                    continue;
                }
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| storage_error("reading", &path, e))?;
                let doc = match serde_json::from_str::<SummaryDocument>(&content) {
                    Ok(doc) => doc,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document file");
                        continue;
                    }
                };

                let expected = self.document_path(&doc.kind, &doc.id);
                if path != expected {
                    if tokio::fs::try_exists(&expected).await? {
                        // The file under the current name is loaded on its own
                        tracing::warn!(path = %path.display(), "Skipping stale copy of a stored document");
                        continue;
                    }
                    if let Some(dir) = expected.parent() {
                        tokio::fs::create_dir_all(dir)
                            .await
                            .map_err(|e| storage_error("creating", dir, e))?;
                    }
                    tokio::fs::rename(&path, &expected)
                        .await
                        .map_err(|e| storage_error("renaming", &path, e))?;
                    tracing::info!(
                        from = %path.display(),
                        to = %expected.display(),
                        "Renamed document file"
                    );
                }
                documents.insert(key(&doc.kind, &doc.id), doc);
            }
        }

        Ok(())
    }

    async fn persist(&self, document: &SummaryDocument) -> SummaryResult<()> {
        let file_path = self.document_path(&document.kind, &document.id);
        if let Some(dir) = file_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| storage_error("creating", dir, e))?;
        }

        // Write then rename so a crash never leaves a half-written document
        let tmp_path = file_path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| storage_error("writing", &tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &file_path)
            .await
            .map_err(|e| storage_error("renaming", &tmp_path, e))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get(&self, kind: &str, id: &str) -> SummaryResult<Option<SummaryDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&key(kind, id)).cloned())
    }

    async fn upsert(&self, document: &SummaryDocument) -> SummaryResult<()> {
        self.persist(document).await?;
        let mut documents = self.documents.write().await;
        documents.insert(key(&document.kind, &document.id), document.clone());
        Ok(())
    }

    async fn delete(&self, kind: &str, id: &str) -> SummaryResult<bool> {
        let mut documents = self.documents.write().await;
        let removed = documents.remove(&key(kind, id));

        if removed.is_some() {
            let path = self.document_path(kind, id);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(storage_error("removing", &path, e)),
            }
        }

        Ok(removed.is_some())
    }

    async fn list(&self, kind: &str, limit: Option<usize>) -> SummaryResult<Vec<SummaryDocument>> {
        let documents = self.documents.read().await;
        Ok(list_sorted(&documents, kind, limit))
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> SummaryError {
    SummaryError::Storage(format!("{} {}: {}", action, path.display(), e))
}

/// Encode an identifier as a single path component
///
/// Lowercase ASCII letters, digits, `-`, `_` and non-leading `.` are kept;
/// every other byte becomes `%XX` (uppercase hex). Distinct identifiers get
/// distinct names, also on case-insensitive filesystems.
fn file_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let keep = byte.is_ascii_lowercase()
            || byte.is_ascii_digit()
            || matches!(byte, b'-' | b'_')
            || (byte == b'.' && i > 0);
        if keep {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{:02X}", byte);
        }
    }
    out
}
