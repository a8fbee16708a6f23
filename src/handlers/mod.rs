//! RPC verb handlers (spec.md §4.8, §4.9).
//!
//! Each handler is a plain function from a decoded call message to a reply
//! message plus a [`crate::proto::StatusCode`] — the only place internal
//! error types ([`crate::error::FsAccessError`], [`crate::error::PoolError`])
//! are translated onto the wire (spec.md §7). [`crate::dispatch`] is the only
//! caller.

pub mod filesystem;
pub mod script;
