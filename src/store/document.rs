//! The in-memory shape shared by every store backend.
//!
//! Values live in one of three namespaces, mirroring the small subset of a
//! key-value server the bot relies on: plain strings, sets of strings, and
//! string-to-string hashes. A key belongs to exactly one namespace; using it
//! through another one is a [`StoreError::WrongType`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Result, StoreError};

/// Current on-disk schema version. Increment on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// All stored values plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// When the document was last mutated.
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub strings: BTreeMap<String, String>,

    #[serde(default)]
    pub sets: BTreeMap<String, BTreeSet<String>>,

    #[serde(default)]
    pub hashes: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Which namespace a key is being accessed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Set,
    Hash,
}

impl Document {
    pub fn new() -> Self {
        Document {
            schema_version: SCHEMA_VERSION,
            updated_at: Utc::now(),
            strings: BTreeMap::new(),
            sets: BTreeMap::new(),
            hashes: BTreeMap::new(),
        }
    }

    fn ensure_kind(&self, key: &str, kind: Kind) -> Result<()> {
        let clash = match kind {
            Kind::String => self.sets.contains_key(key) || self.hashes.contains_key(key),
            Kind::Set => self.strings.contains_key(key) || self.hashes.contains_key(key),
            Kind::Hash => self.strings.contains_key(key) || self.sets.contains_key(key),
        };
        if clash {
            return Err(StoreError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_kind(key, Kind::String)?;
        Ok(self.strings.get(key).cloned())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_kind(key, Kind::String)?;
        self.strings.insert(key.to_string(), value.to_string());
        self.touch();
        Ok(())
    }

    /// Removes a key from whichever namespace holds it.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.strings.remove(key).is_some()
            || self.sets.remove(key).is_some()
            || self.hashes.remove(key).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    /// Deletes a string key only if it currently holds `expected`.
    pub fn compare_and_delete(&mut self, key: &str, expected: &str) -> Result<bool> {
        self.ensure_kind(key, Kind::String)?;
        if self.strings.get(key).is_some_and(|v| v == expected) {
            self.strings.remove(key);
            self.touch();
            return Ok(true);
        }
        Ok(false)
    }

    /// Adds members to a set, returning how many were new.
    pub fn set_add(&mut self, key: &str, members: &[String]) -> Result<usize> {
        self.ensure_kind(key, Kind::Set)?;
        let set = self.sets.entry(key.to_string()).or_default();
        let added = members
            .iter()
            .filter(|m| set.insert((*m).clone()))
            .count();
        if added > 0 {
            self.touch();
        }
        Ok(added)
    }

    pub fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        self.ensure_kind(key, Kind::Set)?;
        Ok(self.sets.get(key).cloned().unwrap_or_default())
    }

    pub fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.ensure_kind(key, Kind::Set)?;
        Ok(self.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    pub fn hash_set(&mut self, key: &str, entries: &[(String, String)]) -> Result<()> {
        self.ensure_kind(key, Kind::Hash)?;
        let hash = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in entries {
            hash.insert(field.clone(), value.clone());
        }
        self.touch();
        Ok(())
    }

    /// Removes fields from a hash, dropping the hash once it is empty.
    pub fn hash_delete(&mut self, key: &str, fields: &[String]) -> Result<usize> {
        self.ensure_kind(key, Kind::Hash)?;
        let Some(hash) = self.hashes.get_mut(key) else {
            return Ok(0);
        };
        let removed = fields.iter().filter(|f| hash.remove(f.as_str()).is_some()).count();
        if hash.is_empty() {
            self.hashes.remove(key);
        }
        if removed > 0 {
            self.touch();
        }
        Ok(removed)
    }

    pub fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.ensure_kind(key, Kind::Hash)?;
        Ok(self.hashes.get(key).cloned().unwrap_or_default())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
