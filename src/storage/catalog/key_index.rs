use rustc_hash::FxHashMap;
use tracing::trace;

use crate::types::{KeyId, Result, SpiError};

/// Bidirectional mapping between key names and dense [`KeyId`]s.
///
/// Ids are handed out in first-use order starting at 0 and never change once
/// assigned. The index is not synchronized; owners that share one across
/// threads wrap it (see [`super::SharedKeyCatalog`]).
#[derive(Clone, Debug, Default)]
pub struct KeyIndex {
    keys: Vec<String>,
    ids: FxHashMap<String, KeyId>,
}

impl KeyIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `key`, registering it at the next free id if absent.
    ///
    /// # Errors
    /// `Invalid` once every `u32` id has been handed out.
    pub fn get_or_create(&mut self, key: &str) -> Result<KeyId> {
        if let Some(id) = self.lookup(key) {
            trace!(id = id.0, "key_index.hit");
            return Ok(id);
        }
        let id = id_at(self.keys.len())?;
        self.keys.push(key.to_owned());
        self.ids.insert(key.to_owned(), id);
        trace!(id = id.0, len = key.len(), "key_index.insert");
        Ok(id)
    }

    /// Returns the id registered for `key`.
    pub fn get_index(&self, key: &str) -> Result<KeyId> {
        self.lookup(key)
            .ok_or_else(|| SpiError::KeyNotFound(key.to_owned()))
    }

    /// Returns the key registered at `id`.
    pub fn get_key(&self, id: KeyId) -> Result<&str> {
        self.keys
            .get(id.0 as usize)
            .map(String::as_str)
            .ok_or(SpiError::KeyIdNotFound(id))
    }

    /// Looks up `key` without failing.
    pub fn lookup(&self, key: &str) -> Option<KeyId> {
        self.ids.get(key).copied()
    }

    /// Number of registered keys; also the next id to be assigned.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key has been registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates `(id, key)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &str)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(idx, key)| (KeyId(idx as u32), key.as_str()))
    }
}

/// Id for the entry stored at position `len`.
fn id_at(len: usize) -> Result<KeyId> {
    u32::try_from(len)
        .map(KeyId)
        .map_err(|_| SpiError::Invalid("key id space exhausted"))
}
