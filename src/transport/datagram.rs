//! Datagram (UDP) RPC transport (spec.md §4.12).
//!
//! Grounded on `examples/original_source/UdpRpcServer/src/UdpRpcServer.c`:
//! unlike the stream transport, a datagram's boundaries are the message's
//! boundaries, so there is no COBS deframer here — one `recv_from` is one
//! RPC frame.

use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::codec;
use crate::dispatch::Dispatcher;

/// Mirrors `PROTORPC_MSG_MAX_SIZE`-sized static buffers in the original;
/// sized to the configured max message size by the caller instead of a
/// compile-time constant (spec.md §11 point 3).
pub async fn serve(socket: UdpSocket, dispatcher: Arc<Dispatcher>, max_message_size: usize) {
    let mut buf = vec![0u8; max_message_size];
    loop {
        let (n, source) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                log::error!("datagram transport: recv failed: {err}");
                continue;
            }
        };
        if n == 0 {
            continue;
        }

        let frame = match codec::decode(&buf[..n], max_message_size) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("datagram transport: decode failed from {source}: {err}");
                continue;
            }
        };
        let reply = dispatcher.dispatch(frame).await;

        let Some(reply) = reply else { continue };
        let Some(encoded) = super::encode_or_log(&reply, max_message_size) else {
            continue;
        };
        if let Err(err) = socket.send_to(&encoded, source).await {
            log::warn!("datagram transport: send to {source} failed: {err}");
        }
    }
}
