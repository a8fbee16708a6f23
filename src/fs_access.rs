//! Filesystem access capability interface (spec.md §4.4).
//!
//! The teacher's function-table-polymorphism note (spec.md §9) maps this
//! onto a capability abstraction bound to one mount. Per the Open Question
//! in spec.md §9.1 ("one in-flight handle per instance... multi-handle is
//! achieved by creating multiple instances"), we keep that one-handle
//! limitation rather than widening it to the descriptor-pool model: the only
//! consumer of this narrower interface is the script worker (spec.md
//! §4.10), which only ever has one script file open at a time. RPC handlers
//! that need concurrently-open fds go through [`crate::descriptor_pool`]
//! directly instead (see DESIGN.md "Open Questions").

use std::sync::Arc;

use crate::engine::{EngineFileHandle, OpenFlags, Whence};
use crate::error::FsAccessError;
use crate::partition::Mount;

/// One concrete mount, one concrete in-flight open handle.
pub struct FsAccess {
    mount: Arc<Mount>,
    open: Option<EngineFileHandle>,
}

impl FsAccess {
    pub fn new(mount: Arc<Mount>) -> Self {
        Self { mount, open: None }
    }

    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<(), FsAccessError> {
        if self.open.is_some() {
            return Err(FsAccessError::HandleBusy);
        }
        let handle = self.mount.with_engine(|e| e.file_open(path, flags))?;
        self.open = Some(handle);
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), FsAccessError> {
        let handle = self.open.take().ok_or(FsAccessError::Invalid)?;
        self.mount.with_engine(|e| e.file_close(handle))
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsAccessError> {
        let handle = self.open.ok_or(FsAccessError::Invalid)?;
        self.mount.with_engine(|e| e.file_read(handle, buf))
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize, FsAccessError> {
        let handle = self.open.ok_or(FsAccessError::Invalid)?;
        self.mount.with_engine(|e| e.file_write(handle, buf))
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, FsAccessError> {
        let handle = self.open.ok_or(FsAccessError::Invalid)?;
        self.mount.with_engine(|e| e.file_seek(handle, offset, whence))
    }

    pub fn size(&mut self) -> Result<u64, FsAccessError> {
        let handle = self.open.ok_or(FsAccessError::Invalid)?;
        self.mount.with_engine(|e| e.file_size(handle))
    }
}

impl Drop for FsAccess {
    fn drop(&mut self) {
        if let Some(handle) = self.open.take() {
            if let Err(err) = self.mount.with_engine(|e| e.file_close(handle)) {
                log::warn!("FsAccess dropped with an open handle, close failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountConfig;
    use crate::engine::{EngineStats, InMemoryFsEngine};

    fn mount_with(seed: &[(&str, &[u8])]) -> Arc<Mount> {
        let cfg = MountConfig {
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
        let mut engine = InMemoryFsEngine::new(EngineStats {
            address: 0,
            size: cfg.byte_length,
            block_size: cfg.block_size,
            block_count: cfg.block_count(),
        });
        for (path, data) in seed {
            engine.seed_file(path, data);
        }
        Arc::new(Mount::new(&cfg, Box::new(engine)))
    }

    #[test]
    fn single_handle_limitation_is_enforced() {
        let m = mount_with(&[("/a", b"x"), ("/b", b"y")]);
        let mut fs = FsAccess::new(m);
        fs.open("/a", OpenFlags::RDONLY).unwrap();
        assert!(matches!(
            fs.open("/b", OpenFlags::RDONLY),
            Err(FsAccessError::HandleBusy)
        ));
    }

    #[test]
    fn read_whole_file() {
        let m = mount_with(&[("/script.lua", b"print('hi')")]);
        let mut fs = FsAccess::new(m);
        fs.open("/script.lua", OpenFlags::RDONLY).unwrap();
        let size = fs.size().unwrap() as usize;
        let mut buf = vec![0u8; size];
        assert_eq!(fs.read(&mut buf).unwrap(), size);
        assert_eq!(&buf, b"print('hi')");
    }
}
