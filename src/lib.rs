//! Embedded RPC-controlled appliance core runtime.
//!
//! This crate implements the RPC dispatch core, flash-backed filesystem
//! access layer, and script worker described in `SPEC_FULL.md`: a
//! COBS/protobuf-framed RPC service that exposes a small set of filesystem
//! verbs and a script-running facility over a stream and a datagram
//! transport. The log-structured filesystem engine and the script
//! interpreter are external collaborators ([`engine::FsEngine`],
//! [`script_worker::ScriptInterpreter`]) — this crate defines the seams,
//! not those subsystems themselves.

#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod block_device;
pub mod cobs;
pub mod codec;
pub mod config;
pub mod descriptor_pool;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fs_access;
pub mod handlers;
pub mod partition;
pub mod proto;
pub mod script_worker;
pub mod state;
pub mod transport;

pub use config::AppConfig;
pub use dispatch::Dispatcher;
pub use state::AppState;
