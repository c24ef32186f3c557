//! SID index: absolute SID to delta path
//!
//! Built once per model by a pre-order walk. Each entry records the deltas
//! from the root to the node and the node's kind, never a reference into
//! the tree, so the index outlives tree edits and can be shared freely.

use std::collections::HashMap;

use crate::error::{CoreconfError, Result};
use crate::value::{NodeKind, Value};

/// Where a SID lives in the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    /// Delta-SIDs from the root map down to the node
    pub deltas: Vec<u64>,
    /// Shape of the node
    pub kind: NodeKind,
}

/// Reverse index from absolute SID to [`PathSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidIndex {
    base: u64,
    entries: HashMap<u64, PathSpec>,
}

impl SidIndex {
    /// Index a model whose top-level deltas are absolute SIDs
    pub fn build(model: &Value) -> Result<Self> {
        Self::build_with_base(model, 0)
    }

    /// Index a model whose top-level deltas are relative to `base`
    pub fn build_with_base(model: &Value, base: u64) -> Result<Self> {
        let mut index = Self {
            base,
            entries: HashMap::new(),
        };
        let mut path = Vec::new();
        index.walk(model, base, &mut path)?;
        tracing::debug!(sids = index.entries.len(), base, "SID index built");
        Ok(index)
    }

    fn walk(&mut self, value: &Value, parent_sid: u64, path: &mut Vec<u64>) -> Result<()> {
        match value {
            Value::Map(entries) => {
                for (delta, child) in entries {
                    let sid = parent_sid
                        .checked_add(*delta)
                        .ok_or(CoreconfError::SidOverflow {
                            parent: parent_sid,
                            delta: *delta,
                        })?;
                    path.push(*delta);
                    self.insert(sid, path, child.kind())?;
                    self.walk(child, sid, path)?;
                    path.pop();
                }
            }
            // Entries of a list share its SID; keys inside them are deltas from it
            Value::Array(items) => {
                for item in items {
                    self.walk(item, parent_sid, path)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn insert(&mut self, sid: u64, path: &[u64], kind: NodeKind) -> Result<()> {
        match self.entries.get(&sid) {
            // Same schema node seen again in a sibling list entry
            Some(existing) if existing.deltas == path => {
                if existing.kind != kind {
                    return Err(CoreconfError::ConflictingKind(sid));
                }
                Ok(())
            }
            Some(existing) => Err(CoreconfError::DuplicateSid {
                sid,
                existing: existing.deltas.clone(),
                found: path.to_vec(),
            }),
            None => {
                self.entries.insert(
                    sid,
                    PathSpec {
                        deltas: path.to_vec(),
                        kind,
                    },
                );
                Ok(())
            }
        }
    }

    /// Look up where `sid` lives, in constant time
    pub fn resolve(&self, sid: u64) -> Option<&PathSpec> {
        self.entries.get(&sid)
    }

    /// SID the root map's deltas are relative to
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn contains(&self, sid: u64) -> bool {
        self.entries.contains_key(&sid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All indexed SIDs in ascending order
    pub fn sids(&self) -> Vec<u64> {
        let mut sids: Vec<u64> = self.entries.keys().copied().collect();
        sids.sort_unstable();
        sids
    }
}
