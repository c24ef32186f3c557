//! Subtree extraction along a resolved path

use crate::key_mapping::KeyMapping;
use crate::path::{PathNode, ResolvedPath};
use crate::value::Value;

/// Walk `model` along `path` and return the addressed subtree.
///
/// At each list step, key values select the first entry whose key leaves
/// match; without key values an intermediate list yields its first entry
/// and a target list is returned whole. Descending through a scalar, or a
/// key filter that matches nothing, gives `None`. Neither `model` nor the
/// index behind `path` is modified.
pub fn extract<'a>(model: &'a Value, path: &ResolvedPath, keys: &KeyMapping) -> Option<&'a Value> {
    if path.nodes.is_empty() {
        return None;
    }

    let last = path.nodes.len() - 1;
    let mut current = model;
    for (i, node) in path.nodes.iter().enumerate() {
        let child = current.get(node.delta)?;
        current = match child {
            Value::Array(entries) if !node.keys.is_empty() => select_entry(entries, node, keys)?,
            Value::Array(entries) if i != last => entries.first()?,
            other => other,
        };
    }
    Some(current)
}

fn select_entry<'a>(entries: &'a [Value], node: &PathNode, keys: &KeyMapping) -> Option<&'a Value> {
    let declared = keys.keys_for(node.sid);
    entries.iter().find(|entry| {
        declared
            .iter()
            .zip(&node.keys)
            .all(|(key_sid, wanted)| match key_sid.checked_sub(node.sid) {
                Some(delta) => entry.get(delta).is_some_and(|v| v.key_eq(wanted)),
                None => false,
            })
    })
}
