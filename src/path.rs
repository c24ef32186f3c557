//! Path resolution: SID plus key values to a root-to-target walk
//!
//! The index gives the delta path; this module replays it, classifies each
//! step and hands the requester's key values to the lists that declare keys.

use crate::key_mapping::KeyMapping;
use crate::sid::SidIndex;
use crate::value::{NodeKind, Value};

/// Append-only key values collected for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyList {
    values: Vec<Value>,
}

impl KeyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<Value> for KeyList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// One step of a resolved path
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    /// Absolute SID reached by this step
    pub sid: u64,
    /// Delta consumed from the parent map
    pub delta: u64,
    pub kind: NodeKind,
    /// Key values selecting a list entry, in declared key order
    pub keys: Vec<Value>,
}

/// Root-to-target walk for one query
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub nodes: Vec<PathNode>,
    /// A keyed list on the way down got no key values and falls back to its
    /// first entry
    pub positional: bool,
}

impl ResolvedPath {
    pub fn target(&self) -> Option<&PathNode> {
        self.nodes.last()
    }
}

/// Resolve `sid` and distribute `supplied` keys along its path.
///
/// Each list that declares N keys takes the next (up to) N supplied values,
/// in path order. Returns `None` when the SID is unknown or when key values
/// are left over, since the query then names an instance the model cannot
/// key by.
pub fn resolve_path(
    index: &SidIndex,
    keys: &KeyMapping,
    sid: u64,
    supplied: &[Value],
) -> Option<ResolvedPath> {
    let spec = index.resolve(sid)?;

    let mut nodes = Vec::with_capacity(spec.deltas.len());
    let mut current = index.base();
    let mut cursor = 0;
    let mut positional = false;
    let last = spec.deltas.len().saturating_sub(1);

    for (i, delta) in spec.deltas.iter().enumerate() {
        current += delta;
        let kind = if i == last {
            spec.kind
        } else {
            index.resolve(current)?.kind
        };

        let mut node = PathNode {
            sid: current,
            delta: *delta,
            kind,
            keys: Vec::new(),
        };

        if kind == NodeKind::List {
            let declared = keys.keys_for(current);
            let take = declared.len().min(supplied.len() - cursor);
            node.keys = supplied[cursor..cursor + take].to_vec();
            cursor += take;

            if !declared.is_empty() && take == 0 && i != last {
                positional = true;
            }
        }
        nodes.push(node);
    }

    if cursor < supplied.len() {
        tracing::debug!(
            sid,
            unused = supplied.len() - cursor,
            "key values left over after path resolution"
        );
        return None;
    }
    if positional {
        tracing::debug!(sid, "keyed list crossed without keys, using first entry");
    }

    Some(ResolvedPath { nodes, positional })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor;

    const SAMPLE_MODEL: &[u8] = include_bytes!("../testdata/sample_model.cbor");
    const SAMPLE_KEYS: &[u8] = include_bytes!("../testdata/sample_keys.cbor");

    fn fixtures() -> (SidIndex, KeyMapping) {
        let model = cbor::decode(SAMPLE_MODEL, 4096).unwrap();
        (
            SidIndex::build(&model).unwrap(),
            KeyMapping::from_cbor(SAMPLE_KEYS, 128).unwrap(),
        )
    }

    #[test]
    fn test_resolve_interior_node() {
        let (index, keys) = fixtures();
        let path = resolve_path(&index, &keys, 1012, &[]).unwrap();

        let sids: Vec<u64> = path.nodes.iter().map(|n| n.sid).collect();
        assert_eq!(sids, vec![1000, 1012]);
        assert_eq!(path.target().map(|n| n.kind), Some(NodeKind::Container));
        assert!(!path.positional);
    }

    #[test]
    fn test_resolve_keyed_list() {
        let (index, keys) = fixtures();
        let path = resolve_path(&index, &keys, 1013, &[Value::Uint(2)]).unwrap();

        let target = path.target().unwrap();
        assert_eq!(target.kind, NodeKind::List);
        assert_eq!(target.delta, 1);
        assert_eq!(target.keys, vec![Value::Uint(2)]);
    }

    #[test]
    fn test_resolve_leaf_below_list() {
        let (index, keys) = fixtures();

        let path = resolve_path(&index, &keys, 1014, &[Value::Uint(1)]).unwrap();
        assert_eq!(path.nodes[2].keys, vec![Value::Uint(1)]);
        assert!(!path.positional);

        let path = resolve_path(&index, &keys, 1014, &[]).unwrap();
        assert!(path.positional);
    }

    #[test]
    fn test_unknown_sid() {
        let (index, keys) = fixtures();
        assert_eq!(resolve_path(&index, &keys, 4242, &[]), None);
    }

    #[test]
    fn test_leftover_keys_miss() {
        let (index, keys) = fixtures();
        // 1012 has no keyed list on its path
        assert_eq!(resolve_path(&index, &keys, 1012, &[Value::Uint(2)]), None);
        // 1013 declares a single key
        assert_eq!(
            resolve_path(&index, &keys, 1013, &[Value::Uint(2), Value::Uint(3)]),
            None
        );
    }

    #[test]
    fn test_key_list() {
        let mut list = KeyList::new();
        assert!(list.is_empty());
        list.push(Value::Uint(1));
        list.push(Value::Uint(2));
        assert_eq!(list.len(), 2);
        assert_eq!(list.as_slice(), &[Value::Uint(1), Value::Uint(2)]);
    }
}
