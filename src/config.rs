//! Resolver limits and settings

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Bounds and switches for model loading and FETCH handling.
///
/// Defaults match the buffer sizes of the constrained-device build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Largest accepted model blob
    pub max_model_len: usize,
    /// Largest accepted key mapping blob
    pub max_key_mapping_len: usize,
    /// Largest accepted FETCH payload
    pub max_request_len: usize,
    /// Largest FETCH/GET response body
    pub max_response_len: usize,
    /// Most queries in one FETCH
    pub max_fetch_entries: usize,
    /// Deepest nesting accepted by the CBOR decoder
    pub max_depth: usize,
    /// SID the model's top-level deltas are relative to
    pub sid_base: u64,
    /// Answer 4.04 instead of an empty array when a single-query FETCH misses
    pub not_found_on_single_miss: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_model_len: 4096,
            max_key_mapping_len: 128,
            max_request_len: 32,
            max_response_len: 128,
            max_fetch_entries: 5,
            max_depth: 16,
            sid_base: 0,
            not_found_on_single_miss: false,
        }
    }
}

impl ResolverConfig {
    /// Parse a JSON config file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
