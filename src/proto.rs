//! Generated wire types for the RPC frame schema (spec.md §6).
//!
//! `proto/rpc.proto` is the schema descriptor referenced throughout spec.md
//! §4.5/§4.7 ("schema handle", "schema-driven pack/unpack"); `prost` compiles
//! it at build time into the tagged-union types used by [`crate::codec`] and
//! [`crate::dispatch`].

#![allow(clippy::derive_partial_eq_without_eq)]

include!(concat!(env!("OUT_DIR"), "/appliance.rpc.v1.rs"));

pub use rpc_frame::WhichCallset;
pub use fs_callset::WhichMsg as FsWhichMsg;
pub use script_callset::WhichMsg as ScriptWhichMsg;
