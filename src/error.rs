//! Error types for coreconf-sid

use thiserror::Error;

/// Failure while turning CBOR bytes into a [`Value`](crate::Value)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended in the middle of an item
    #[error("CBOR input truncated")]
    Truncated,

    /// Nesting deeper than the configured bound
    #[error("CBOR nesting exceeds depth {0}")]
    DepthExceeded(usize),

    /// A map key that is not an unsigned integer (delta-SID)
    #[error("map key is not an unsigned integer: {0}")]
    BadKeyType(String),

    /// The same key appears twice in one map
    #[error("duplicate map key {0}")]
    DuplicateKey(u64),

    /// Anything else: bad syntax, tags, trailing bytes
    #[error("malformed CBOR: {0}")]
    Malformed(String),
}

/// Failure while turning a [`Value`](crate::Value) into CBOR bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Encoded form does not fit in the output bound
    #[error("encoded size {needed} exceeds buffer of {max} bytes")]
    BufferTooSmall { needed: usize, max: usize },

    /// Writer failure
    #[error("CBOR write failed: {0}")]
    Writer(String),
}

/// Main error type for coreconf operations
#[derive(Debug, Error)]
pub enum CoreconfError {
    /// CBOR decoding error
    #[error("CBOR decode error: {0}")]
    Decode(#[from] DecodeError),

    /// CBOR encoding error
    #[error("CBOR encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The same SID is reachable through two different delta paths
    #[error("duplicate SID {sid}: reached via {existing:?} and {found:?}")]
    DuplicateSid {
        sid: u64,
        existing: Vec<u64>,
        found: Vec<u64>,
    },

    /// Sibling list entries disagree on the shape of a node
    #[error("SID {0} has conflicting node kinds across list entries")]
    ConflictingKind(u64),

    /// Parent SID plus delta does not fit in 64 bits
    #[error("SID overflow: {parent} + {delta}")]
    SidOverflow { parent: u64, delta: u64 },

    /// Key mapping blob is not a map of SID to SID arrays
    #[error("invalid key mapping: {0}")]
    InvalidKeyMapping(String),

    /// A keyed list entry lacks one of its declared key fields
    #[error("list {list_sid} has an entry without key {key_sid}")]
    MissingKey { list_sid: u64, key_sid: u64 },

    /// Request payload has the wrong shape (maps to CoAP 4.00)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// More queries in one batch than allowed (maps to CoAP 4.00)
    #[error("too many queries in one request: {count} > {max}")]
    TooManyQueries { count: usize, max: usize },

    /// Input buffer larger than its configured bound
    #[error("{what} of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input local to one decode call
    Format,
    /// A bound on request cardinality, input or output size was hit
    Capacity,
    /// The model or key mapping is inconsistent; the load must be aborted
    StateConsistency,
    /// File or configuration access
    Io,
}

impl CoreconfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) | Self::BadRequest(_) | Self::InvalidKeyMapping(_) => {
                ErrorKind::Format
            }
            Self::Encode(_) | Self::TooManyQueries { .. } | Self::PayloadTooLarge { .. } => {
                ErrorKind::Capacity
            }
            Self::DuplicateSid { .. }
            | Self::ConflictingKind(_)
            | Self::SidOverflow { .. }
            | Self::MissingKey { .. } => ErrorKind::StateConsistency,
            Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for coreconf operations
pub type Result<T> = std::result::Result<T, CoreconfError>;
