//! Layer-local error types.
//!
//! Each subsystem defines its own error enum and never lets it cross the RPC
//! boundary directly — handlers translate these into the wire `StatusCode`
//! at the seam (spec.md §7). Internal code propagates with `?`; the only
//! places that swallow an error are the ones spec.md says must never be
//! fatal to the server (handler errors, frame errors).

use thiserror::Error;

/// Errors from the block device facade (spec.md §4.1).
#[derive(Debug, Error)]
pub enum BlockDeviceError {
    #[error("I/O failure at block {block} offset {offset}")]
    Io { block: u32, offset: u32 },
    #[error("block {0} out of range")]
    OutOfRange(u32),
}

/// Errors from the partition registry (spec.md §4.2).
#[derive(Debug, Error)]
pub enum MountError {
    #[error("label {0:?} already registered")]
    DuplicateLabel(String),
    #[error("no mount registered for label {0:?}")]
    NotFound(String),
}

/// Errors from the descriptor pool (spec.md §4.3).
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("descriptor pool exhausted")]
    Exhausted,
    #[error("fd {0} out of range")]
    OutOfRange(i32),
    #[error("fd {0} already released")]
    AlreadyReleased(i32),
    #[error("fd {0} is not in use")]
    NotInUse(i32),
}

/// Errors from the filesystem access layer / engine (spec.md §4.4).
#[derive(Debug, Error)]
pub enum FsAccessError {
    #[error("I/O error")]
    Io,
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    Exists,
    #[error("invalid argument")]
    Invalid,
    #[error("no space left")]
    NoSpace,
    #[error("handle already in use by this access instance")]
    HandleBusy,
}

/// Errors surfaced by the script worker (spec.md §4.10).
#[derive(Debug, Error)]
pub enum ScriptWorkerError {
    #[error("script run queue is full")]
    QueueFull,
    #[error("filesystem error opening script: {0}")]
    Fs(#[from] FsAccessError),
}

/// Errors from the frame codec (spec.md §4.5).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message exceeds configured max size ({0} > {1})")]
    TooLarge(usize, usize),
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("encode failed: {0}")]
    Encode(#[from] prost::EncodeError),
}

/// Errors from the COBS framer/deframer (spec.md §4.6).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CobsError {
    #[error("payload too large for destination buffer")]
    DestinationTooSmall,
    #[error("zero byte encountered before expected stuffing position")]
    MalformedFrame,
    #[error("frame exceeded the configured maximum length")]
    Overflow,
}
