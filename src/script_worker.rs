//! The script worker: a single-threaded interpreter host fed by a
//! bounded queue (spec.md §4.10).
//!
//! Grounded on `examples/original_source/lua/src/lua_thread.c`: each run
//! creates a fresh interpreter restricted to a narrow stdlib, installs a
//! message handler that captures a traceback on error, loads the chunk via
//! the filesystem capability, and calls it protected. The interpreter
//! itself is out of scope (spec.md §1) — no Lua crate is grounded anywhere
//! in the example pack, so [`ScriptInterpreter`] stays a trait the demo
//! binary and tests supply a fake for, the same way [`crate::engine::FsEngine`]
//! stands in for `littlefs`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::engine::OpenFlags;
use crate::error::ScriptWorkerError;
use crate::fs_access::FsAccess;
use crate::partition::Mount;

/// The restricted stdlib subset a script interpreter is allowed to expose
/// (spec.md §11 point 4, grounded on `lua_thread.c`'s `luaL_requiref` table):
/// `base`, `package`, `debug`, `string`, `table`, plus a `timer` extension.
/// `io`, `os`, `coroutine`, `math`, and `utf8` are explicitly excluded —
/// nothing in this runtime should let a script touch the clock, spawn a
/// coroutine, or open a file other than through [`FsAccess`].
#[derive(Debug, Clone, Copy)]
pub struct ScriptStdlibProfile {
    pub modules: &'static [&'static str],
    pub extensions: &'static [&'static str],
}

impl ScriptStdlibProfile {
    pub const DEFAULT: ScriptStdlibProfile = ScriptStdlibProfile {
        modules: &["base", "package", "debug", "string", "table"],
        extensions: &["timer"],
    };
}

/// One interpreter run. `Err` carries the captured traceback message, the
/// same text `getLastMessage` (spec.md §4.9) later returns.
pub trait ScriptInterpreter: Send {
    fn run(&mut self, chunk_name: &str, source: &[u8]) -> Result<(), String>;
}

/// Builds a fresh [`ScriptInterpreter`] per run — `lua_thread.c` tears down
/// and recreates its Lua state for every script so that a wedged script
/// can't corrupt the next run's globals.
pub trait ScriptInterpreterFactory: Send + Sync {
    fn create(&self, profile: &ScriptStdlibProfile) -> Box<dyn ScriptInterpreter>;
}

struct RunRequest {
    filename: String,
}

/// Handle given to RPC handlers: enqueues run requests and reads back the
/// last captured message, without touching the worker's internals.
#[derive(Clone)]
pub struct ScriptWorkerHandle {
    sender: mpsc::Sender<RunRequest>,
    last_message: Arc<Mutex<String>>,
    last_message_capacity: usize,
}

impl ScriptWorkerHandle {
    /// Enqueue a run, waiting up to `timeout` for a free queue slot
    /// (spec.md §4.10: "enqueue blocks up to a bounded timeout, then fails").
    pub async fn enqueue(&self, filename: String, timeout: Duration) -> Result<(), ScriptWorkerError> {
        tokio::time::timeout(timeout, self.sender.send(RunRequest { filename }))
            .await
            .map_err(|_| ScriptWorkerError::QueueFull)?
            .map_err(|_| ScriptWorkerError::QueueFull)
    }

    /// The most recent captured message, truncated to the wire's string
    /// capacity (spec.md §6: "string fields are capped at a configured
    /// byte length").
    pub fn last_message(&self) -> String {
        let msg = self.last_message.lock();
        if msg.len() > self.last_message_capacity {
            msg[..self.last_message_capacity].to_string()
        } else {
            msg.clone()
        }
    }
}

/// Owns the single in-flight filesystem handle and the interpreter
/// factory; runs forever on its own task, draining the bounded queue.
pub struct ScriptWorker {
    fs: FsAccess,
    profile: ScriptStdlibProfile,
    factory: Box<dyn ScriptInterpreterFactory>,
    receiver: mpsc::Receiver<RunRequest>,
    last_message: Arc<Mutex<String>>,
}

impl ScriptWorker {
    pub fn new(
        mount: Arc<Mount>,
        profile: ScriptStdlibProfile,
        factory: Box<dyn ScriptInterpreterFactory>,
        queue_capacity: usize,
        last_message_capacity: usize,
    ) -> (Self, ScriptWorkerHandle) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let last_message = Arc::new(Mutex::new(String::new()));
        let worker = Self {
            fs: FsAccess::new(mount),
            profile,
            factory,
            receiver,
            last_message: last_message.clone(),
        };
        let handle = ScriptWorkerHandle {
            sender,
            last_message,
            last_message_capacity,
        };
        (worker, handle)
    }

    /// Drain the queue until the handle side is dropped. Spawn with
    /// `tokio::spawn(worker.run_loop())`, mirroring the teacher's
    /// per-connection `tokio::spawn` in `src/session.rs`.
    pub async fn run_loop(mut self) {
        while let Some(req) = self.receiver.recv().await {
            self.run_one(&req.filename);
        }
    }

    fn run_one(&mut self, filename: &str) {
        if let Err(err) = self.fs.open(filename, OpenFlags::RDONLY) {
            log::warn!("script worker: failed to open {filename}: {err}");
            *self.last_message.lock() = format!("cannot open {filename}: {err}");
            return;
        }
        let result = self.read_and_run(filename);
        if let Err(err) = self.fs.close() {
            log::warn!("script worker: failed to close {filename}: {err}");
        }
        if let Err(message) = result {
            *self.last_message.lock() = message;
        }
    }

    fn read_and_run(&mut self, filename: &str) -> Result<(), String> {
        let size = self.fs.size().map_err(|e| e.to_string())? as usize;
        let mut buf = vec![0u8; size];
        let mut total = 0;
        while total < size {
            let n = self
                .fs
                .read(&mut buf[total..])
                .map_err(|e| e.to_string())?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        let mut interpreter = self.factory.create(&self.profile);
        interpreter.run(filename, &buf)
    }
}
