//! In-memory CORECONF value model
//!
//! A decoded configuration tree. Map keys are delta-SIDs: the absolute SID
//! of a child is its parent's SID plus the key. List entries share the SID
//! of the list that holds them, so keys inside an entry are deltas from the
//! list SID.

use std::fmt;

/// Shape of a node as seen by the SID index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Any scalar (integer, float, text, ...)
    Leaf,
    /// An array: a YANG list or leaf-list
    List,
    /// A map of delta-SID to child
    Container,
}

/// A decoded CORECONF value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer (CBOR major type 0)
    Uint(u64),
    /// Negative integer (CBOR major type 1); non-negative integers are always `Uint`
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Bool(bool),
    Null,
    Array(Vec<Value>),
    /// Delta-SID to child, in construction order
    Map(Vec<(u64, Value)>),
}

impl Value {
    /// Build a map from `(delta, value)` pairs, keeping their order
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u64, Value)>,
    {
        Value::Map(entries.into_iter().collect())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Value::Array(_) => NodeKind::List,
            Value::Map(_) => NodeKind::Container,
            _ => NodeKind::Leaf,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(u64, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Child of a map by delta-SID
    pub fn get(&self, delta: u64) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(key, _)| *key == delta)
            .map(|(_, v)| v)
    }

    pub fn is_scalar(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    /// Equality used when matching list keys.
    ///
    /// Integers compare exactly. A float equals an integer only when it
    /// holds that exact integral value, so a request key `2` selects an
    /// entry whose key leaf holds `2.0`.
    pub fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(f), n) | (n, Value::Float(f)) if n.is_integer() => {
                float_eq_integer(*f, n)
            }
            _ => self == other,
        }
    }

    fn is_integer(&self) -> bool {
        matches!(self, Value::Uint(_) | Value::Int(_))
    }
}

/// `f` is integral, in range, and converts to exactly `n`
fn float_eq_integer(f: f64, n: &Value) -> bool {
    if f.fract() != 0.0 {
        return false;
    }
    match n {
        Value::Uint(n) => (0.0..18_446_744_073_709_551_616.0).contains(&f) && f as u64 == *n,
        Value::Int(n) => {
            (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&f)
                && f as i64 == *n
        }
        _ => false,
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        if n >= 0 {
            Value::Uint(n as u64)
        } else {
            Value::Int(n)
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bytes(b) => {
                f.write_str("h'")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                f.write_str("'")
            }
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, v)?;
                }
                f.write_str("}")
            }
        }
    }
}
