//! Model datastore
//!
//! Holds the decoded model together with its SID index and key mapping as
//! one immutable snapshot. Reload builds a fresh snapshot off to the side
//! and swaps it in under the write lock; resolutions in flight keep the
//! snapshot they started with.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::cbor;
use crate::config::ResolverConfig;
use crate::error::{CoreconfError, Result};
use crate::key_mapping::KeyMapping;
use crate::sid::SidIndex;
use crate::value::Value;

/// A loaded model and the lookup structures derived from it
#[derive(Debug)]
pub struct ModelSnapshot {
    model: Value,
    index: SidIndex,
    keys: KeyMapping,
    generation: u64,
}

impl ModelSnapshot {
    /// Index `model` and check it against `keys`.
    ///
    /// The snapshot has generation 0 until a [`Datastore`] publishes it.
    pub fn build(model: Value, keys: KeyMapping, base: u64) -> Result<Self> {
        let index = SidIndex::build_with_base(&model, base)?;
        keys.validate(&model, base)?;
        Ok(Self {
            model,
            index,
            keys,
            generation: 0,
        })
    }

    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn index(&self) -> &SidIndex {
        &self.index
    }

    pub fn keys(&self) -> &KeyMapping {
        &self.keys
    }

    /// Load count this snapshot belongs to, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owner of the current model snapshot
#[derive(Debug)]
pub struct Datastore {
    config: ResolverConfig,
    current: RwLock<Arc<ModelSnapshot>>,
    generation: AtomicU64,
}

impl Datastore {
    /// Decode and index a model and key mapping from their CBOR blobs
    pub fn load(config: ResolverConfig, model: &[u8], keys: &[u8]) -> Result<Self> {
        let snapshot = Self::prepare(&config, model, keys)?;
        Ok(Self::from_snapshot(config, snapshot))
    }

    /// Wrap an already decoded model
    pub fn with_model(config: ResolverConfig, model: Value, keys: KeyMapping) -> Result<Self> {
        let snapshot = ModelSnapshot::build(model, keys, config.sid_base)?;
        Ok(Self::from_snapshot(config, snapshot))
    }

    fn from_snapshot(config: ResolverConfig, mut snapshot: ModelSnapshot) -> Self {
        snapshot.generation = 1;
        tracing::info!(
            sids = snapshot.index.len(),
            keyed_lists = snapshot.keys.len(),
            "model loaded"
        );
        Self {
            config,
            current: RwLock::new(Arc::new(snapshot)),
            generation: AtomicU64::new(1),
        }
    }

    fn prepare(config: &ResolverConfig, model: &[u8], keys: &[u8]) -> Result<ModelSnapshot> {
        if model.len() > config.max_model_len {
            return Err(CoreconfError::PayloadTooLarge {
                what: "model",
                len: model.len(),
                max: config.max_model_len,
            });
        }
        if keys.len() > config.max_key_mapping_len {
            return Err(CoreconfError::PayloadTooLarge {
                what: "key mapping",
                len: keys.len(),
                max: config.max_key_mapping_len,
            });
        }

        let model = cbor::decode_with_depth(model, config.max_model_len, config.max_depth)?;
        let keys = KeyMapping::from_cbor(keys, config.max_key_mapping_len)?;
        ModelSnapshot::build(model, keys, config.sid_base)
    }

    /// Replace the model. On error the previous snapshot stays in place.
    pub fn reload(&self, model: &[u8], keys: &[u8]) -> Result<u64> {
        let snapshot = Self::prepare(&self.config, model, keys)?;
        Ok(self.publish(snapshot))
    }

    /// Replace the model with an already decoded one
    pub fn reload_value(&self, model: Value, keys: KeyMapping) -> Result<u64> {
        let snapshot = ModelSnapshot::build(model, keys, self.config.sid_base)?;
        Ok(self.publish(snapshot))
    }

    /// Swap in a fully built snapshot; the generation is assigned under the lock
    fn publish(&self, mut snapshot: ModelSnapshot) -> u64 {
        let mut current = self.current.write();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        snapshot.generation = generation;
        tracing::info!(generation, sids = snapshot.index.len(), "model reloaded");
        *current = Arc::new(snapshot);
        generation
    }

    /// The snapshot to resolve against; never blocks other readers
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MODEL: &[u8] = include_bytes!("../testdata/sample_model.cbor");
    const SAMPLE_KEYS: &[u8] = include_bytes!("../testdata/sample_keys.cbor");

    #[test]
    fn test_load_sample() {
        let ds = Datastore::load(ResolverConfig::default(), SAMPLE_MODEL, SAMPLE_KEYS).unwrap();
        let snapshot = ds.snapshot();

        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.index().len(), 10);
        assert_eq!(snapshot.keys().keys_for(1013), &[1015]);
    }

    #[test]
    fn test_model_too_large() {
        let config = ResolverConfig {
            max_model_len: 64,
            ..ResolverConfig::default()
        };
        let err = Datastore::load(config, SAMPLE_MODEL, SAMPLE_KEYS).unwrap_err();
        assert!(matches!(err, CoreconfError::PayloadTooLarge { what: "model", .. }));
    }

    #[test]
    fn test_inconsistent_model_aborts_load() {
        // {1013: [1016]}: key leaf absent from every entry
        let keys = hex::decode("a11903f5811903f8").unwrap();
        let err = Datastore::load(ResolverConfig::default(), SAMPLE_MODEL, &keys).unwrap_err();
        assert!(matches!(err, CoreconfError::MissingKey { .. }));
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let ds = Datastore::load(ResolverConfig::default(), SAMPLE_MODEL, SAMPLE_KEYS).unwrap();
        let old = ds.snapshot();

        let model = Value::map([(2000, Value::map([(1, Value::Uint(5))]))]);
        let generation = ds.reload_value(model, KeyMapping::new()).unwrap();

        assert_eq!(generation, 2);
        assert_eq!(ds.generation(), 2);
        assert!(ds.snapshot().index().contains(2001));
        // The earlier snapshot is untouched
        assert!(old.index().contains(1013));
        assert!(!old.index().contains(2001));
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let ds = Datastore::load(ResolverConfig::default(), SAMPLE_MODEL, SAMPLE_KEYS).unwrap();

        let truncated = &SAMPLE_MODEL[..20];
        assert!(ds.reload(truncated, SAMPLE_KEYS).is_err());
        assert_eq!(ds.generation(), 1);
        assert!(ds.snapshot().index().contains(1013));
    }
}
