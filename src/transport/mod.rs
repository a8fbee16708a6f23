//! Transport servers (spec.md §4.11, §4.12).
//!
//! Grounded on `examples/original_source/TcpRpcServer/src/TcpRpcServer.c`
//! (stream transport: COBS deframe → dispatch → COBS frame → send) and
//! `examples/original_source/UdpRpcServer/src/UdpRpcServer.c` (datagram
//! transport: packet boundaries are message boundaries, no COBS framing
//! needed). Both run as `tokio` tasks, one per listener, the way the
//! teacher's `src/session.rs` spawns one task per mounted session.

pub mod datagram;
pub mod stream;

use crate::codec;
use crate::proto::RpcFrame;

fn encode_or_log(frame: &RpcFrame, max_message_size: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    match codec::encode(frame, max_message_size, &mut buf) {
        Ok(_) => Some(buf),
        Err(err) => {
            log::warn!("failed to encode reply frame: {err}");
            None
        }
    }
}
