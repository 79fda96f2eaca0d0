//! Durable store backed by a single JSON file.
//!
//! # Atomic Writes
//!
//! Every mutation rewrites the whole document with write-to-temp-then-rename:
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename to `<path>`
//! 4. fsync the parent directory
//!
//! A reader (including the next process after a restart) sees either the old
//! or the new document, never a partial one. A mutation is applied to a copy
//! and only committed in memory once it is on disk, so a failed write leaves
//! the store unchanged. The write and the in-memory commit run in a task of
//! their own, so a caller that is dropped midway cannot leave memory behind
//! the file.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::fsync::{fsync_dir, fsync_file};
use super::{Document, KvStore, Result, SCHEMA_VERSION, StoreError};

/// A [`KvStore`] persisted to a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Arc<Mutex<Document>>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let load_path = path.clone();
        let doc = tokio::task::spawn_blocking(move || try_load_document(&load_path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??
            .unwrap_or_default();
        debug!(path = %path.display(), "Opened file store");
        Ok(FileStore {
            path,
            doc: Arc::new(Mutex::new(doc)),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T>(&self, f: impl FnOnce(&Document) -> Result<T>) -> Result<T> {
        let doc = self.doc.lock().await;
        f(&doc)
    }

    /// Applies `f` to a copy of the document and persists it if `f` reports a change.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> Result<(T, bool)>) -> Result<T> {
        let mut doc = Arc::clone(&self.doc).lock_owned().await;
        let mut next = (*doc).clone();
        let (out, changed) = f(&mut next)?;
        if changed {
            let bytes = serde_json::to_vec_pretty(&next)?;
            let path = self.path.clone();
            tokio::spawn(async move {
                tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
                    .await
                    .map_err(|e| StoreError::Task(e.to_string()))??;
                *doc = next;
                Ok::<_, StoreError>(())
            })
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        }
        Ok(out)
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read(|d| d.get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|d| d.set(key, value).map(|()| ((), true)))
            .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.mutate(|d| {
            let removed = d.delete(key);
            Ok((removed, removed))
        })
        .await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.mutate(|d| {
            let removed = d.compare_and_delete(key, expected)?;
            Ok((removed, removed))
        })
        .await
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<usize> {
        self.mutate(|d| {
            let added = d.set_add(key, members)?;
            Ok((added, added > 0))
        })
        .await
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        self.read(|d| d.set_members(key)).await
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.read(|d| d.is_member(key, member)).await
    }

    async fn hash_set(&self, key: &str, entries: &[(String, String)]) -> Result<()> {
        self.mutate(|d| d.hash_set(key, entries).map(|()| ((), true)))
            .await
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> Result<usize> {
        self.mutate(|d| {
            let removed = d.hash_delete(key, fields)?;
            Ok((removed, removed > 0))
        })
        .await
    }

    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.read(|d| d.hash_get_all(key)).await
    }
}

/// Writes `bytes` to `path` atomically.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;
    file.write_all(bytes)?;
    fsync_file(&file)?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fsync_dir(parent)?;
    }
    Ok(())
}

/// Loads the document, returning `None` if the file does not exist.
fn try_load_document(path: &Path) -> Result<Option<Document>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let doc: Document = serde_json::from_slice(&bytes)?;
    if doc.schema_version != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: doc.schema_version,
        });
    }
    Ok(Some(doc))
}
