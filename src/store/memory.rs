//! Process-local store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Document, KvStore, Result};

/// A [`KvStore`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given document.
    pub fn with_document(doc: Document) -> Self {
        MemoryStore {
            doc: Mutex::new(doc),
        }
    }

    fn with_doc<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        // A poisoned lock only means another caller panicked mid-operation;
        // every Document method leaves it consistent.
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut doc)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_doc(|d| d.get(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_doc(|d| d.set(key, value))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.with_doc(|d| Ok(d.delete(key)))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.with_doc(|d| d.compare_and_delete(key, expected))
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<usize> {
        self.with_doc(|d| d.set_add(key, members))
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        self.with_doc(|d| d.set_members(key))
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.with_doc(|d| d.is_member(key, member))
    }

    async fn hash_set(&self, key: &str, entries: &[(String, String)]) -> Result<()> {
        self.with_doc(|d| d.hash_set(key, entries))
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> Result<usize> {
        self.with_doc(|d| d.hash_delete(key, fields))
    }

    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.with_doc(|d| d.hash_get_all(key))
    }
}
