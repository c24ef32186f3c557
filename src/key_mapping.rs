//! List key declarations
//!
//! Maps a list SID to the ordered SIDs of the leaves that identify its
//! entries. Loaded from a compact CBOR blob `{list_sid: [key_sid, ...]}` or
//! from the `key-mapping` section of a YANG `.sid` file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::cbor;
use crate::error::{CoreconfError, Result};
use crate::value::Value;

/// Ordered key SIDs per list SID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapping {
    keys: HashMap<u64, Vec<u64>>,
}

/// The part of a `.sid` file this module cares about
#[derive(Debug, Deserialize)]
struct RawSidFile {
    #[serde(rename = "key-mapping", default)]
    key_mapping: HashMap<String, Vec<u64>>,
}

impl KeyMapping {
    /// Empty mapping: no list declares keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a key mapping blob of at most `max_len` bytes
    pub fn from_cbor(bytes: &[u8], max_len: usize) -> Result<Self> {
        let value = cbor::decode(bytes, max_len)?;
        Self::from_value(&value)
    }

    /// Build from an already decoded `{list_sid: [key_sid, ...]}` map
    pub fn from_value(value: &Value) -> Result<Self> {
        let entries = value
            .as_map()
            .ok_or_else(|| CoreconfError::InvalidKeyMapping("expected a map".into()))?;

        let mut keys = HashMap::with_capacity(entries.len());
        for (list_sid, key_sids) in entries {
            let key_sids = key_sids
                .as_array()
                .ok_or_else(|| {
                    CoreconfError::InvalidKeyMapping(format!(
                        "keys of list {} are not an array",
                        list_sid
                    ))
                })?
                .iter()
                .map(|k| {
                    k.as_u64().ok_or_else(|| {
                        CoreconfError::InvalidKeyMapping(format!(
                            "key {} of list {} is not a SID",
                            k, list_sid
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            keys.insert(*list_sid, key_sids);
        }
        Ok(Self { keys })
    }

    /// Read the `key-mapping` section of a `.sid` file
    pub fn from_sid_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_sid_json(&content)
    }

    /// Parse the `key-mapping` section of `.sid` JSON
    pub fn from_sid_json(content: &str) -> Result<Self> {
        let raw: RawSidFile = serde_json::from_str(content)?;

        let keys = raw
            .key_mapping
            .into_iter()
            .map(|(k, v)| {
                k.parse::<u64>()
                    .map(|sid| (sid, v))
                    .map_err(|_| CoreconfError::InvalidKeyMapping(format!("bad list SID '{}'", k)))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { keys })
    }

    /// Declare keys for a list, replacing any previous declaration
    pub fn insert(&mut self, list_sid: u64, key_sids: Vec<u64>) {
        self.keys.insert(list_sid, key_sids);
    }

    /// Key SIDs of a list in match order; empty when none are declared
    pub fn keys_for(&self, list_sid: u64) -> &[u64] {
        self.keys.get(&list_sid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u64])> {
        self.keys.iter().map(|(sid, keys)| (*sid, keys.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check the model against the declarations.
    ///
    /// Every key SID must sit below its list SID, and every entry of a keyed
    /// list present in the model must carry all of its key leaves.
    pub fn validate(&self, model: &Value, base: u64) -> Result<()> {
        for (list_sid, key_sids) in &self.keys {
            if let Some(key_sid) = key_sids.iter().find(|k| **k <= *list_sid) {
                return Err(CoreconfError::InvalidKeyMapping(format!(
                    "key {} does not follow list {}",
                    key_sid, list_sid
                )));
            }
        }
        self.check_entries(model, base)
    }

    fn check_entries(&self, value: &Value, parent_sid: u64) -> Result<()> {
        match value {
            Value::Map(entries) => {
                for (delta, child) in entries {
                    let sid = parent_sid.saturating_add(*delta);
                    if let Value::Array(items) = child {
                        for key_sid in self.keys_for(sid) {
                            let key_delta = key_sid - sid;
                            if items.iter().any(|entry| entry.get(key_delta).is_none()) {
                                return Err(CoreconfError::MissingKey {
                                    list_sid: sid,
                                    key_sid: *key_sid,
                                });
                            }
                        }
                    }
                    self.check_entries(child, sid)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.check_entries(item, parent_sid)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
