//! Stream (TCP) RPC transport (spec.md §4.11).
//!
//! One task per accepted connection, each with its own [`crate::cobs::Deframer`]
//! — the deframer's accumulator is per-connection state, not global, so two
//! concurrent streams can never interleave a partial frame.

use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::cobs::{self, Deframer};
use crate::codec;
use crate::dispatch::Dispatcher;

/// Mirrors `TCP_BUFFER_SIZE` in `TcpRpcServer.c`.
const READ_BUFFER_SIZE: usize = 1024;

/// Keep-alive idle/interval/retry settings applied to every accepted
/// connection, matching `TcpRpcServer.c`'s socket option setup — a link
/// to an appliance can otherwise sit half-open indefinitely.
const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
const KEEPALIVE_RETRIES: u32 = 3;

fn apply_keepalive(stream: &TcpStream) {
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_IDLE)
        .with_interval(KEEPALIVE_INTERVAL);
    #[cfg(not(target_os = "windows"))]
    let keepalive = keepalive.with_retries(KEEPALIVE_RETRIES);

    if let Err(err) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        log::warn!("stream transport: failed to set TCP keepalive: {err}");
    }
}

/// Accept connections until the listener errors out or is dropped.
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, max_message_size: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                log::info!("stream transport: accepted {addr}");
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, dispatcher, max_message_size).await {
                        log::debug!("stream transport: connection {addr} closed: {err}");
                    }
                });
            }
            Err(err) => log::error!("stream transport: accept failed: {err}"),
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
    max_message_size: usize,
) -> std::io::Result<()> {
    apply_keepalive(&stream);

    let mut deframer = Deframer::new(max_message_size);
    let mut rx_buf = vec![0u8; READ_BUFFER_SIZE];
    let mut frames = Vec::new();

    loop {
        let n = stream.read(&mut rx_buf).await?;
        if n == 0 {
            return Ok(());
        }

        frames.clear();
        deframer.feed(&rx_buf[..n], &mut frames);

        for raw in frames.drain(..) {
            // `ProtoRpc_server` returns with reply size 0 when unpacking
            // fails — the caller cannot be meaningfully addressed, since we
            // don't even have a `seqn` to echo, so nothing is sent back
            // (spec.md §4.7 step 1, §7 kind 2).
            let frame = match codec::decode(&raw, max_message_size) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("stream transport: decode failed: {err}");
                    continue;
                }
            };
            let reply = dispatcher.dispatch(frame).await;

            let Some(reply) = reply else { continue };
            let Some(encoded) = super::encode_or_log(&reply, max_message_size) else {
                continue;
            };
            let mut framed = Vec::new();
            if let Err(err) = cobs::encode(&encoded, &mut framed) {
                log::warn!("stream transport: cobs encode failed: {err}");
                continue;
            }
            stream.write_all(&framed).await?;
        }
    }
}
