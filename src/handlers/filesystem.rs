//! Filesystem verb handlers (spec.md §4.8), grounded on
//! `examples/original_source/Lfs_Part/src/Lfs_PartRpc.c`'s per-verb
//! status-translation boundary: every verb looks up its mount, does the
//! narrowest possible engine operation, and never lets a raw engine error
//! code reach the wire — only [`crate::proto::StatusCode`] does.

use crate::descriptor_pool::SlotContents;
use crate::engine::{EngineDirHandle, EngineFileHandle, OpenFlags, Whence};
use crate::proto::{self, StatusCode};
use crate::state::AppState;

/// `dirList` returns at most this many entries per call; a caller wanting
/// more pages again with a higher `start_idx` (spec.md §4.8).
const MAX_DIR_LIST_ENTRIES: usize = 32;

/// Capacity of the `fileRead` reply's `data` array; mirrors the `size_max`
/// check against `PROTORPC_ARRAY_LENGTH(reply->data.bytes)` in
/// `Lfs_PartRpc.c` (spec.md §4.8).
const MAX_FILE_READ_SIZE: usize = 2048;

fn handler_error<T: Default>() -> (T, StatusCode) {
    (T::default(), StatusCode::RpcHandlerError)
}

pub fn get_fs_info(state: &AppState, call: &proto::GetFsInfoCall) -> (proto::GetFsInfoReply, StatusCode) {
    match state.registry.lookup(&call.label) {
        Some(mount) => {
            let stats = mount.stats();
            (
                proto::GetFsInfoReply {
                    address: stats.address,
                    size: stats.size,
                    block_size: stats.block_size,
                    block_count: stats.block_count,
                },
                StatusCode::Success,
            )
        }
        None => handler_error(),
    }
}

pub fn dir_open(state: &AppState, call: &proto::DirOpenCall) -> (proto::DirOpenReply, StatusCode) {
    let mount = match state.registry.lookup(&call.label) {
        Some(m) => m,
        None => return (proto::DirOpenReply { fd: -1 }, StatusCode::RpcHandlerError),
    };
    if !mount.with_engine(|e| e.exists(&call.path)) {
        return (proto::DirOpenReply { fd: -1 }, StatusCode::RpcHandlerError);
    }
    let mut pool = state.pool.lock();
    let fd = match pool.acquire(SlotContents::Dir {
        mount: mount.clone(),
        handle: EngineDirHandle(0),
    }) {
        Ok(fd) => fd,
        Err(_) => return (proto::DirOpenReply { fd: -1 }, StatusCode::RpcHandlerError),
    };
    match mount.with_engine(|e| e.dir_open(&call.path)) {
        Ok(handle) => {
            if let Ok(Some(slot)) = pool.get_mut(fd) {
                *slot = SlotContents::Dir { mount, handle };
            }
            (proto::DirOpenReply { fd }, StatusCode::Success)
        }
        Err(_) => {
            let _ = pool.release(fd);
            (proto::DirOpenReply { fd: -1 }, StatusCode::RpcHandlerError)
        }
    }
}

pub fn dir_close(state: &AppState, call: &proto::DirCloseCall) -> (proto::DirCloseReply, StatusCode) {
    let mut pool = state.pool.lock();
    let contents = match pool.get(call.fd) {
        Ok(Some(SlotContents::Dir { mount, handle })) => (mount.clone(), *handle),
        _ => return handler_error(),
    };
    let (mount, handle) = contents;
    if mount.with_engine(|e| e.dir_close(handle)).is_err() {
        return handler_error();
    }
    match pool.release(call.fd) {
        Ok(_) => (proto::DirCloseReply {}, StatusCode::Success),
        Err(_) => handler_error(),
    }
}

pub fn dir_read(state: &AppState, call: &proto::DirReadCall) -> (proto::DirReadReply, StatusCode) {
    let mut pool = state.pool.lock();
    let (mount, handle) = match pool.get(call.fd) {
        Ok(Some(SlotContents::Dir { mount, handle })) => (mount.clone(), *handle),
        _ => return handler_error(),
    };
    match mount.with_engine(|e| e.dir_read(handle)) {
        Ok(Some(entry)) => (
            proto::DirReadReply {
                valid: true,
                info: Some(proto::DirEntryInfo {
                    name: entry.name,
                    is_dir: entry.is_dir,
                    size: entry.size,
                }),
            },
            StatusCode::Success,
        ),
        Ok(None) => (
            proto::DirReadReply {
                valid: false,
                info: None,
            },
            StatusCode::Success,
        ),
        Err(_) => handler_error(),
    }
}

pub fn dir_list(state: &AppState, call: &proto::DirListCall) -> (proto::DirListReply, StatusCode) {
    let mount = match state.registry.lookup(&call.label) {
        Some(m) => m,
        None => return handler_error(),
    };
    let handle = match mount.with_engine(|e| e.dir_open(&call.path)) {
        Ok(h) => h,
        Err(_) => return handler_error(),
    };
    let mut entries = Vec::new();
    let mut idx = 0u32;
    loop {
        match mount.with_engine(|e| e.dir_read(handle)) {
            Ok(Some(entry)) => {
                if idx >= call.start_idx && entries.len() < MAX_DIR_LIST_ENTRIES {
                    entries.push(proto::DirEntryInfo {
                        name: entry.name,
                        is_dir: entry.is_dir,
                        size: entry.size,
                    });
                }
                idx += 1;
            }
            Ok(None) => break,
            Err(_) => {
                let _ = mount.with_engine(|e| e.dir_close(handle));
                return handler_error();
            }
        }
    }
    let _ = mount.with_engine(|e| e.dir_close(handle));
    (
        proto::DirListReply {
            valid: true,
            num_entries: idx,
            start_idx: call.start_idx,
            info: entries,
        },
        StatusCode::Success,
    )
}

pub fn file_open(state: &AppState, call: &proto::FileOpenCall) -> (proto::FileOpenReply, StatusCode) {
    let mount = match state.registry.lookup(&call.label) {
        Some(m) => m,
        None => return (proto::FileOpenReply { fd: -1 }, StatusCode::RpcHandlerError),
    };
    let flags = match OpenFlags::from_bits(call.flags) {
        Some(f) if !f.is_empty() => f,
        _ => return (proto::FileOpenReply { fd: -1 }, StatusCode::RpcHandlerError),
    };
    let mut pool = state.pool.lock();
    let fd = match pool.acquire(SlotContents::File {
        mount: mount.clone(),
        handle: EngineFileHandle(0),
        last_stat_path: call.path.clone(),
    }) {
        Ok(fd) => fd,
        Err(_) => return (proto::FileOpenReply { fd: -1 }, StatusCode::RpcHandlerError),
    };
    match mount.with_engine(|e| e.file_open(&call.path, flags)) {
        Ok(handle) => {
            if let Ok(Some(slot)) = pool.get_mut(fd) {
                *slot = SlotContents::File {
                    mount,
                    handle,
                    last_stat_path: call.path.clone(),
                };
            }
            (proto::FileOpenReply { fd }, StatusCode::Success)
        }
        Err(_) => {
            let _ = pool.release(fd);
            (proto::FileOpenReply { fd: -1 }, StatusCode::RpcHandlerError)
        }
    }
}

pub fn file_close(state: &AppState, call: &proto::FileCloseCall) -> (proto::FileCloseReply, StatusCode) {
    let mut pool = state.pool.lock();
    let (mount, handle) = match pool.get(call.fd) {
        Ok(Some(SlotContents::File { mount, handle, .. })) => (mount.clone(), *handle),
        _ => return handler_error(),
    };
    if mount.with_engine(|e| e.file_close(handle)).is_err() {
        return handler_error();
    }
    match pool.release(call.fd) {
        Ok(_) => (proto::FileCloseReply {}, StatusCode::Success),
        Err(_) => handler_error(),
    }
}

pub fn file_read(state: &AppState, call: &proto::FileReadCall) -> (proto::FileReadReply, StatusCode) {
    let whence: Whence = match proto::Whence::try_from(call.whence) {
        Ok(w) => w.into(),
        Err(_) => return handler_error(),
    };
    let mut pool = state.pool.lock();
    let (mount, handle) = match pool.get(call.fd) {
        Ok(Some(SlotContents::File { mount, handle, .. })) => (mount.clone(), *handle),
        _ => return handler_error(),
    };
    if mount.with_engine(|e| e.file_seek(handle, call.offset, whence)).is_err() {
        return handler_error();
    }
    if call.read_size as usize > MAX_FILE_READ_SIZE {
        return handler_error();
    }
    let mut buf = vec![0u8; call.read_size as usize];
    match mount.with_engine(|e| e.file_read(handle, &mut buf)) {
        Ok(n) => {
            buf.truncate(n);
            (
                proto::FileReadReply {
                    offset: call.offset,
                    data: buf,
                },
                StatusCode::Success,
            )
        }
        Err(_) => handler_error(),
    }
}

pub fn file_write(state: &AppState, call: &proto::FileWriteCall) -> (proto::FileWriteReply, StatusCode) {
    let whence: Whence = match proto::Whence::try_from(call.whence) {
        Ok(w) => w.into(),
        Err(_) => return handler_error(),
    };
    let mut pool = state.pool.lock();
    let (mount, handle) = match pool.get(call.fd) {
        Ok(Some(SlotContents::File { mount, handle, .. })) => (mount.clone(), *handle),
        _ => return handler_error(),
    };
    if mount.with_engine(|e| e.file_seek(handle, call.offset, whence)).is_err() {
        return handler_error();
    }
    match mount.with_engine(|e| e.file_write(handle, &call.data)) {
        Ok(n) => (
            proto::FileWriteReply {
                bytes_written: n as i32,
            },
            StatusCode::Success,
        ),
        Err(_) => handler_error(),
    }
}

pub fn remove(state: &AppState, call: &proto::RemoveCall) -> (proto::RemoveReply, StatusCode) {
    match state.registry.lookup(&call.label) {
        Some(mount) => match mount.with_engine(|e| e.remove(&call.path)) {
            Ok(()) => (proto::RemoveReply {}, StatusCode::Success),
            Err(_) => handler_error(),
        },
        None => handler_error(),
    }
}
