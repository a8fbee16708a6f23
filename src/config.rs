//! Configuration knobs (spec.md §6 "Configuration knobs").
//!
//! This module is ambient scaffolding — spec.md enumerates the knobs but
//! does not mandate a format. We follow the pack's `kata-types` idiom of a
//! `serde` struct deserialized from TOML, with defaults matching the
//! scenario values used in spec.md §8.

use serde::{Deserialize, Serialize};

/// Per-mount configuration (spec.md §6, §3 "Partition mount").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountConfig {
    pub label: String,
    pub base_address: u32,
    pub byte_length: u32,
    pub block_size: u32,
    pub read_size: u32,
    pub program_size: u32,
    pub cache_size: u32,
    pub lookahead_size: u32,
    pub block_cycles: u32,
}

impl MountConfig {
    pub fn block_count(&self) -> u32 {
        self.byte_length / self.block_size
    }
}

/// Per-server configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub task_stack_size: u32,
    pub task_priority: u8,
}

/// Descriptor pool configuration (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 4 }
    }
}

/// Dispatch configuration (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    pub max_message_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_message_size: 4096,
        }
    }
}

/// Script worker configuration (spec.md §4.10).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptWorkerConfig {
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub last_message_capacity: usize,
}

impl Default for ScriptWorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4,
            enqueue_timeout_ms: 100,
            last_message_capacity: 900,
        }
    }
}

/// Top-level configuration for the appliance binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub mounts: Vec<MountConfig>,
    pub stream_server: Option<ServerConfig>,
    pub datagram_server: Option<ServerConfig>,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub script_worker: ScriptWorkerConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
