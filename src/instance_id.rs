//! FETCH query entries
//!
//! A FETCH payload is a CBOR array whose entries identify the requested
//! nodes. Each entry is either a bare SID or an array of the SID followed
//! by the key values of the list instances on its path:
//!
//! ```text
//! [1008, [1013, 2]]
//! ```

use crate::error::{CoreconfError, Result};
use crate::path::KeyList;
use crate::value::Value;

/// One query from a FETCH payload
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceId {
    /// Absolute SID of the requested node
    pub sid: u64,
    /// Key values in the order the requester intends them
    pub keys: KeyList,
}

impl InstanceId {
    /// Query a node by SID alone
    pub fn new(sid: u64) -> Self {
        Self {
            sid,
            keys: KeyList::new(),
        }
    }

    /// Query a node with list key values
    pub fn with_keys(sid: u64, keys: impl IntoIterator<Item = Value>) -> Self {
        Self {
            sid,
            keys: keys.into_iter().collect(),
        }
    }

    /// Parse one request entry
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Uint(sid) => Ok(Self::new(*sid)),
            Value::Array(items) => {
                let (first, rest) = items
                    .split_first()
                    .ok_or_else(|| CoreconfError::BadRequest("empty query array".into()))?;
                let sid = first.as_u64().ok_or_else(|| {
                    CoreconfError::BadRequest(format!("query SID {} is not unsigned", first))
                })?;

                let mut keys = KeyList::new();
                for key in rest {
                    if !key.is_scalar() {
                        return Err(CoreconfError::BadRequest(format!(
                            "key value {} of SID {} is not a scalar",
                            key, sid
                        )));
                    }
                    keys.push(key.clone());
                }
                Ok(Self { sid, keys })
            }
            other => Err(CoreconfError::BadRequest(format!(
                "query entry {} is neither a SID nor an array",
                other
            ))),
        }
    }

    /// Encode back to the request entry shape
    pub fn to_value(&self) -> Value {
        if self.keys.is_empty() {
            return Value::Uint(self.sid);
        }
        let mut items = Vec::with_capacity(self.keys.len() + 1);
        items.push(Value::Uint(self.sid));
        items.extend(self.keys.as_slice().iter().cloned());
        Value::Array(items)
    }
}
