//! Fixed-size pool of open-file/open-directory descriptors (spec.md §3 "Open
//! descriptor", §4.3).
//!
//! Grounded on the teacher's forget-tracking slot bookkeeping
//! (`src/forget_one.rs`) and its fd-keyed cache-entry idea in
//! `src/session.rs`, generalized from an intrusive list to an owned `Vec`
//! of slots per spec.md §9's design note.

use std::sync::Arc;

use crate::engine::{EngineDirHandle, EngineFileHandle};
use crate::error::PoolError;
use crate::partition::Mount;

/// What an in-use slot holds. An open-fd cache entry (spec.md §3) augments
/// this with the mount and, for files, the last-stat info used for
/// diagnostics in `fileopen`.
#[derive(Debug, Clone)]
pub enum SlotContents {
    File {
        mount: Arc<Mount>,
        handle: EngineFileHandle,
        last_stat_path: String,
    },
    Dir {
        mount: Arc<Mount>,
        handle: EngineDirHandle,
    },
}

#[derive(Debug, Clone)]
enum Slot {
    Available,
    InUse(SlotContents),
}

/// A fixed-capacity pool of descriptor slots. Remote callers only ever see
/// the integer index (the fd); the pool never reuses a slot while it is
/// in-use.
#[derive(Debug)]
pub struct DescriptorPool {
    slots: Vec<Slot>,
}

impl DescriptorPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Available; capacity],
        }
    }

    /// Find the lowest free index, mark it in-use, and return its fd.
    /// Lowest-index-first keeps acquisition order predictable for testing
    /// (spec.md §4.3).
    pub fn acquire(&mut self, contents: SlotContents) -> Result<i32, PoolError> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Available) {
                *slot = Slot::InUse(contents);
                return Ok(idx as i32);
            }
        }
        Err(PoolError::Exhausted)
    }

    /// Idempotent release is an error: releasing an already-available slot
    /// returns `PoolError::AlreadyReleased` (spec.md §8).
    pub fn release(&mut self, fd: i32) -> Result<SlotContents, PoolError> {
        let slot = self.slot_mut(fd)?;
        match std::mem::replace(slot, Slot::Available) {
            Slot::InUse(contents) => Ok(contents),
            Slot::Available => {
                // put it back; nothing changed
                *slot = Slot::Available;
                Err(PoolError::AlreadyReleased(fd))
            }
        }
    }

    pub fn get(&self, fd: i32) -> Result<Option<&SlotContents>, PoolError> {
        match self.slot_ref(fd)? {
            Slot::InUse(contents) => Ok(Some(contents)),
            Slot::Available => Ok(None),
        }
    }

    pub fn get_mut(&mut self, fd: i32) -> Result<Option<&mut SlotContents>, PoolError> {
        match self.slot_mut(fd)? {
            Slot::InUse(contents) => Ok(Some(contents)),
            Slot::Available => Ok(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::InUse(_)))
            .count()
    }

    fn slot_ref(&self, fd: i32) -> Result<&Slot, PoolError> {
        if fd < 0 {
            return Err(PoolError::OutOfRange(fd));
        }
        self.slots.get(fd as usize).ok_or(PoolError::OutOfRange(fd))
    }

    fn slot_mut(&mut self, fd: i32) -> Result<&mut Slot, PoolError> {
        if fd < 0 {
            return Err(PoolError::OutOfRange(fd));
        }
        self.slots
            .get_mut(fd as usize)
            .ok_or(PoolError::OutOfRange(fd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineStats, InMemoryFsEngine};

    fn mount() -> Arc<Mount> {
        let cfg = crate::config::MountConfig {
            label: "data".into(),
            base_address: 0,
            byte_length: 4096 * 4,
            block_size: 4096,
            read_size: 64,
            program_size: 64,
            cache_size: 64,
            lookahead_size: 64,
            block_cycles: 100,
        };
        Arc::new(Mount::new(
            &cfg,
            Box::new(InMemoryFsEngine::new(EngineStats {
                address: 0,
                size: cfg.byte_length,
                block_size: cfg.block_size,
                block_count: cfg.block_count(),
            })),
        ))
    }

    fn file_contents(mount: &Arc<Mount>, n: u32) -> SlotContents {
        SlotContents::File {
            mount: mount.clone(),
            handle: crate::engine::EngineFileHandle(n),
            last_stat_path: format!("/f{n}"),
        }
    }

    #[test]
    fn exhaustion_then_release_reuses_lowest_fd() {
        let m = mount();
        let mut pool = DescriptorPool::new(2);
        let fd0 = pool.acquire(file_contents(&m, 1)).unwrap();
        let fd1 = pool.acquire(file_contents(&m, 2)).unwrap();
        assert_eq!((fd0, fd1), (0, 1));
        assert!(matches!(
            pool.acquire(file_contents(&m, 3)),
            Err(PoolError::Exhausted)
        ));

        pool.release(0).unwrap();
        let fd_again = pool.acquire(file_contents(&m, 4)).unwrap();
        assert_eq!(fd_again, 0);
    }

    #[test]
    fn double_release_is_an_error() {
        let m = mount();
        let mut pool = DescriptorPool::new(1);
        let fd = pool.acquire(file_contents(&m, 1)).unwrap();
        pool.release(fd).unwrap();
        assert!(matches!(
            pool.release(fd),
            Err(PoolError::AlreadyReleased(_))
        ));
    }

    #[test]
    fn capacity_minus_in_use_is_invariant_across_matched_pairs() {
        let m = mount();
        let mut pool = DescriptorPool::new(3);
        let invariant = |p: &DescriptorPool| p.capacity() - p.in_use_count();
        let base = invariant(&pool);
        let fd = pool.acquire(file_contents(&m, 1)).unwrap();
        assert_eq!(invariant(&pool), base - 1);
        pool.release(fd).unwrap();
        assert_eq!(invariant(&pool), base);
    }

    #[test]
    fn stale_fd_lookup_after_release() {
        let m = mount();
        let mut pool = DescriptorPool::new(1);
        let fd = pool.acquire(file_contents(&m, 1)).unwrap();
        pool.release(fd).unwrap();
        assert!(pool.get(fd).unwrap().is_none());
    }
}
