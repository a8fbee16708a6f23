//! Shared server state: the partition registry and the descriptor pool
//! (spec.md §5 "Shared state").
//!
//! Both transport servers reference the same `Arc<AppState>`. The
//! descriptor pool is wrapped in a mutex exactly per spec.md §5: "if both
//! transport servers share one pool, the pool must be wrapped in a mutex."

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::descriptor_pool::DescriptorPool;
use crate::partition::PartitionRegistry;

pub struct AppState {
    pub registry: PartitionRegistry,
    pub pool: Mutex<DescriptorPool>,
}

impl AppState {
    pub fn new(registry: PartitionRegistry, pool_config: &PoolConfig) -> Self {
        Self {
            registry,
            pool: Mutex::new(DescriptorPool::new(pool_config.capacity)),
        }
    }
}
