//! Client-side request building utilities
//!
//! Helpers for constructing FETCH payloads and parsing the responses.

use crate::cbor;
use crate::error::{CoreconfError, Result};
use crate::instance_id::InstanceId;
use crate::value::Value;

/// Client-side builder for one FETCH batch
#[derive(Debug, Clone)]
pub struct FetchRequestBuilder {
    queries: Vec<InstanceId>,
    max_entries: usize,
}

impl FetchRequestBuilder {
    /// Create a builder that refuses to build more than `max_entries` queries
    pub fn new(max_entries: usize) -> Self {
        Self {
            queries: Vec::new(),
            max_entries,
        }
    }

    /// Query a node by SID alone
    pub fn sid(mut self, sid: u64) -> Self {
        self.queries.push(InstanceId::new(sid));
        self
    }

    /// Query a node inside keyed list entries
    pub fn keyed(mut self, sid: u64, keys: impl IntoIterator<Item = Value>) -> Self {
        self.queries.push(InstanceId::with_keys(sid, keys));
        self
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Build the FETCH request payload
    ///
    /// # Returns
    /// CBOR-encoded payload (application/cbor)
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.queries.len() > self.max_entries {
            return Err(CoreconfError::TooManyQueries {
                count: self.queries.len(),
                max: self.max_entries,
            });
        }

        let request = Value::Array(self.queries.iter().map(InstanceId::to_value).collect());
        Ok(cbor::encode(&request, usize::MAX)?)
    }

    /// Parse a FETCH response into the resolved subtrees
    pub fn parse_response(cbor: &[u8], max_len: usize) -> Result<Vec<Value>> {
        match cbor::decode(cbor, max_len)? {
            Value::Array(values) => Ok(values),
            other => Err(CoreconfError::BadRequest(format!(
                "FETCH response {} is not an array",
                other
            ))),
        }
    }
}
