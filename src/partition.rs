//! Partition registry and mount lifecycle (spec.md §3 "Partition mount",
//! §4.2).
//!
//! Grounded on `src/mnt/mod.rs`'s named-mount-table shape in the teacher,
//! generalized per the design note in spec.md §9: the intrusive,
//! must-be-first-member mount record becomes an owned collection entry
//! keyed by label, with byte-exact (no Unicode normalization) comparison.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::MountConfig;
use crate::engine::{EngineStats, FsEngine};
use crate::error::MountError;

/// A mounted filesystem: static geometry plus the engine state the per-mount
/// mutex serializes access to (spec.md §3: "at most one engine_state per
/// label; all block-device calls for that mount are serialized by its
/// mutex").
pub struct Mount {
    pub label: String,
    pub base_address: u32,
    pub byte_length: u32,
    pub block_size: u32,
    pub block_count: u32,
    pub cache_size: u32,
    pub lookahead_size: u32,
    pub block_cycles: u32,
    engine: Mutex<Box<dyn FsEngine>>,
}

impl Mount {
    pub fn new(config: &MountConfig, engine: Box<dyn FsEngine>) -> Self {
        Self {
            label: config.label.clone(),
            base_address: config.base_address,
            byte_length: config.byte_length,
            block_size: config.block_size,
            block_count: config.block_count(),
            cache_size: config.cache_size,
            lookahead_size: config.lookahead_size,
            block_cycles: config.block_cycles,
            engine: Mutex::new(engine),
        }
    }

    /// Acquire the per-mount lock and run `f` against the engine. Bracketing
    /// every engine call this way is the Rust equivalent of spec.md §4.1's
    /// "the engine is expected to bracket every metadata operation with
    /// lock/unlock" — the `MutexGuard`'s drop is the unlock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn FsEngine) -> R) -> R {
        let mut guard = self.engine.lock();
        f(&mut **guard)
    }

    pub fn stats(&self) -> EngineStats {
        self.with_engine(|e| e.stats())
    }
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("label", &self.label)
            .field("base_address", &self.base_address)
            .field("byte_length", &self.byte_length)
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .finish()
    }
}

/// Process-global set of registered mounts, keyed by label. Lazily built up
/// by one-shot `register` calls at init; lookups are a short linear scan
/// (spec.md §4.2: "n is small, ≤8").
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    mounts: parking_lot::RwLock<Vec<Arc<Mount>>>,
}

impl PartitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mount. Duplicate registration of the same label is
    /// rejected (spec.md §4.2: "undefined — implementations must reject
    /// it").
    pub fn register(&self, mount: Mount) -> Result<Arc<Mount>, MountError> {
        let mut guard = self.mounts.write();
        if guard.iter().any(|m| m.label == mount.label) {
            return Err(MountError::DuplicateLabel(mount.label));
        }
        let mount = Arc::new(mount);
        guard.push(mount.clone());
        Ok(mount)
    }

    pub fn lookup(&self, label: &str) -> Option<Arc<Mount>> {
        self.mounts.read().iter().find(|m| m.label == label).cloned()
    }
}
