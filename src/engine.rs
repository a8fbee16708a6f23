//! The log-structured filesystem engine is an external collaborator
//! (spec.md §1): this module defines the narrow trait surface the rest of
//! the crate is built against, plus one in-memory test double used by the
//! unit/integration tests and the demo binary in place of a real `littlefs`
//! mount (`examples/original_source/littlefs/`, `Lfs_Api.c`).

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::error::FsAccessError;

bitflags! {
    /// Open flags, per the table in spec.md §4.4.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const RDONLY = 0b0000_0001;
        const WRONLY = 0b0000_0010;
        const RDWR   = 0b0000_0100;
        const CREAT  = 0b0000_1000;
        const EXCL   = 0b0001_0000;
        const TRUNC  = 0b0010_0000;
        const APPEND = 0b0100_0000;
    }
}

/// Seek origin, mirroring `Whence` in the wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl From<crate::proto::Whence> for Whence {
    fn from(w: crate::proto::Whence) -> Self {
        match w {
            crate::proto::Whence::Set => Whence::Set,
            crate::proto::Whence::Cur => Whence::Cur,
            crate::proto::Whence::End => Whence::End,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineFileHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineDirHandle(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub address: u32,
    pub size: u32,
    pub block_size: u32,
    pub block_count: u32,
}

/// Narrow capability surface a mounted filesystem engine presents.
/// Out-of-scope per spec.md §1 — real mounts wrap `littlefs`; this trait is
/// the seam.
pub trait FsEngine: Send {
    fn stats(&self) -> EngineStats;
    fn exists(&self, path: &str) -> bool;

    fn dir_open(&mut self, path: &str) -> Result<EngineDirHandle, FsAccessError>;
    fn dir_read(&mut self, handle: EngineDirHandle) -> Result<Option<DirEntryInfo>, FsAccessError>;
    fn dir_close(&mut self, handle: EngineDirHandle) -> Result<(), FsAccessError>;

    fn file_open(&mut self, path: &str, flags: OpenFlags) -> Result<EngineFileHandle, FsAccessError>;
    fn file_read(&mut self, handle: EngineFileHandle, buf: &mut [u8]) -> Result<usize, FsAccessError>;
    fn file_write(&mut self, handle: EngineFileHandle, buf: &[u8]) -> Result<usize, FsAccessError>;
    fn file_seek(
        &mut self,
        handle: EngineFileHandle,
        offset: i64,
        whence: Whence,
    ) -> Result<u64, FsAccessError>;
    fn file_size(&mut self, handle: EngineFileHandle) -> Result<u64, FsAccessError>;
    fn file_close(&mut self, handle: EngineFileHandle) -> Result<(), FsAccessError>;

    fn remove(&mut self, path: &str) -> Result<(), FsAccessError>;
}

#[derive(Debug, Clone)]
struct InMemoryFile {
    data: Vec<u8>,
}

/// A toy filesystem engine: paths are flat byte-exact-compared strings in a
/// `BTreeMap`, directories are derived from the `/`-prefix of file paths.
/// Exists purely so the rest of the crate (dispatch, handlers, script
/// worker) can be exercised end-to-end without a real flash-backed mount.
#[derive(Debug)]
pub struct InMemoryFsEngine {
    stats: EngineStats,
    files: BTreeMap<String, InMemoryFile>,
    open_files: BTreeMap<u32, (String, u64)>,
    open_dirs: BTreeMap<u32, (Vec<String>, usize)>,
    next_handle: u32,
}

impl InMemoryFsEngine {
    pub fn new(stats: EngineStats) -> Self {
        Self {
            stats,
            files: BTreeMap::new(),
            open_files: BTreeMap::new(),
            open_dirs: BTreeMap::new(),
            next_handle: 1,
        }
    }

    /// Test/demo convenience: pre-seed a file.
    pub fn seed_file(&mut self, path: &str, contents: &[u8]) {
        self.files.insert(
            path.to_string(),
            InMemoryFile {
                data: contents.to_vec(),
            },
        );
    }

    fn alloc_handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn children_of(&self, dir: &str) -> Vec<String> {
        let prefix = if dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(|s| s.to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl FsEngine for InMemoryFsEngine {
    fn stats(&self) -> EngineStats {
        self.stats
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || !self.children_of(path).is_empty() || path == "/"
    }

    fn dir_open(&mut self, path: &str) -> Result<EngineDirHandle, FsAccessError> {
        if !self.exists(path) {
            return Err(FsAccessError::NotFound);
        }
        let names = self.children_of(path);
        let handle = self.alloc_handle();
        self.open_dirs.insert(handle, (names, 0));
        Ok(EngineDirHandle(handle))
    }

    fn dir_read(&mut self, handle: EngineDirHandle) -> Result<Option<DirEntryInfo>, FsAccessError> {
        let (names, idx) = self
            .open_dirs
            .get_mut(&handle.0)
            .ok_or(FsAccessError::Invalid)?;
        if *idx >= names.len() {
            return Ok(None);
        }
        let name = names[*idx].clone();
        *idx += 1;
        let size = self
            .files
            .values()
            .next()
            .map(|f| f.data.len() as u64)
            .unwrap_or(0);
        Ok(Some(DirEntryInfo {
            name,
            is_dir: false,
            size,
        }))
    }

    fn dir_close(&mut self, handle: EngineDirHandle) -> Result<(), FsAccessError> {
        self.open_dirs
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(FsAccessError::Invalid)
    }

    fn file_open(&mut self, path: &str, flags: OpenFlags) -> Result<EngineFileHandle, FsAccessError> {
        let exists = self.files.contains_key(path);
        if flags.contains(OpenFlags::EXCL) && flags.contains(OpenFlags::CREAT) && exists {
            return Err(FsAccessError::Exists);
        }
        if !exists {
            if flags.contains(OpenFlags::CREAT) {
                self.files.insert(path.to_string(), InMemoryFile { data: Vec::new() });
            } else {
                return Err(FsAccessError::NotFound);
            }
        }
        if flags.contains(OpenFlags::TRUNC) {
            if let Some(f) = self.files.get_mut(path) {
                f.data.clear();
            }
        }
        let handle = self.alloc_handle();
        let start = if flags.contains(OpenFlags::APPEND) {
            self.files[path].data.len() as u64
        } else {
            0
        };
        self.open_files.insert(handle, (path.to_string(), start));
        Ok(EngineFileHandle(handle))
    }

    fn file_read(&mut self, handle: EngineFileHandle, buf: &mut [u8]) -> Result<usize, FsAccessError> {
        let (path, pos) = self
            .open_files
            .get(&handle.0)
            .ok_or(FsAccessError::Invalid)?
            .clone();
        let file = self.files.get(&path).ok_or(FsAccessError::Invalid)?;
        let pos = pos as usize;
        if pos >= file.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(file.data.len() - pos);
        buf[..n].copy_from_slice(&file.data[pos..pos + n]);
        self.open_files.get_mut(&handle.0).unwrap().1 = (pos + n) as u64;
        Ok(n)
    }

    fn file_write(&mut self, handle: EngineFileHandle, buf: &[u8]) -> Result<usize, FsAccessError> {
        let (path, pos) = self
            .open_files
            .get(&handle.0)
            .ok_or(FsAccessError::Invalid)?
            .clone();
        let file = self.files.get_mut(&path).ok_or(FsAccessError::Invalid)?;
        let pos = pos as usize;
        if pos + buf.len() > file.data.len() {
            file.data.resize(pos + buf.len(), 0);
        }
        file.data[pos..pos + buf.len()].copy_from_slice(buf);
        self.open_files.get_mut(&handle.0).unwrap().1 = (pos + buf.len()) as u64;
        Ok(buf.len())
    }

    fn file_seek(
        &mut self,
        handle: EngineFileHandle,
        offset: i64,
        whence: Whence,
    ) -> Result<u64, FsAccessError> {
        let (path, pos) = self
            .open_files
            .get(&handle.0)
            .ok_or(FsAccessError::Invalid)?
            .clone();
        let len = self.files.get(&path).ok_or(FsAccessError::Invalid)?.data.len() as i64;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => pos as i64,
            Whence::End => len,
        };
        let new_pos = base + offset;
        if new_pos < 0 {
            return Err(FsAccessError::Invalid);
        }
        self.open_files.get_mut(&handle.0).unwrap().1 = new_pos as u64;
        Ok(new_pos as u64)
    }

    fn file_size(&mut self, handle: EngineFileHandle) -> Result<u64, FsAccessError> {
        let (path, _) = self.open_files.get(&handle.0).ok_or(FsAccessError::Invalid)?;
        Ok(self.files.get(path).ok_or(FsAccessError::Invalid)?.data.len() as u64)
    }

    fn file_close(&mut self, handle: EngineFileHandle) -> Result<(), FsAccessError> {
        self.open_files
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(FsAccessError::Invalid)
    }

    fn remove(&mut self, path: &str) -> Result<(), FsAccessError> {
        self.files.remove(path).map(|_| ()).ok_or(FsAccessError::NotFound)
    }
}
