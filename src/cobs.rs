//! Consistent Overhead Byte Stuffing — frame delimiting for the stream
//! transport (spec.md §4.6).
//!
//! `0x00` is reserved as the sole frame terminator. [`encode`] stuffs a
//! payload so no zero appears before the terminator it appends; [`Deframer`]
//! is fed arbitrary stream chunks and yields decoded payloads as the
//! terminator is encountered, resynchronizing after an oversized frame.

use crate::error::CobsError;

/// Maximum run length between overhead bytes in a COBS-encoded buffer.
const MAX_BLOCK: usize = 254;

/// COBS-encode `payload` into `out`, appending the `0x00` terminator.
///
/// Overhead is bounded by `ceil(payload.len() / 254) + 1` bytes, matching
/// spec.md §4.6. Returns the number of bytes written to `out`.
pub fn encode(payload: &[u8], out: &mut Vec<u8>) -> Result<usize, CobsError> {
    out.clear();
    let start_len = out.len();

    let mut code_pos = out.len();
    out.push(0); // placeholder for the first code byte
    let mut code: u8 = 1;

    for &byte in payload {
        if byte == 0 {
            out[code_pos] = code;
            code_pos = out.len();
            out.push(0);
            code = 1;
        } else {
            out.push(byte);
            code += 1;
            if code as usize == MAX_BLOCK + 1 {
                out[code_pos] = code;
                code_pos = out.len();
                out.push(0);
                code = 1;
            }
        }
    }
    out[code_pos] = code;
    out.push(0x00);

    Ok(out.len() - start_len)
}

/// Decode one COBS-encoded frame (without its trailing `0x00`) into `out`.
pub fn decode(encoded: &[u8], out: &mut Vec<u8>) -> Result<(), CobsError> {
    out.clear();
    let mut i = 0;
    while i < encoded.len() {
        let code = encoded[i] as usize;
        if code == 0 {
            return Err(CobsError::MalformedFrame);
        }
        i += 1;
        let block_end = i + (code - 1);
        if block_end > encoded.len() {
            return Err(CobsError::MalformedFrame);
        }
        out.extend_from_slice(&encoded[i..block_end]);
        i = block_end;
        // A block capped at MAX_BLOCK (code == 255) was closed because the
        // encoder hit the length limit, not because it saw a real zero byte
        // — no zero is implied between it and the next block.
        if code <= MAX_BLOCK && i < encoded.len() {
            out.push(0);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Accumulating,
    OverflowWaitingForTerminator,
}

/// Restartable stream deframer. Tolerates arbitrary chunk boundaries,
/// including multiple frames per chunk and a frame split across chunks.
#[derive(Debug)]
pub struct Deframer {
    state: State,
    accumulator: Vec<u8>,
    max_len: usize,
}

impl Deframer {
    /// `max_len` bounds the accumulator; an in-progress frame exceeding it
    /// is dropped and the deframer resyncs at the next terminator.
    pub fn new(max_len: usize) -> Self {
        Self {
            state: State::Empty,
            accumulator: Vec::with_capacity(max_len.min(4096)),
            max_len,
        }
    }

    /// Feed a chunk of stream bytes, appending any decoded payloads to
    /// `out_frames`. A zero-length feed is a no-op (spec.md §9 open
    /// question 2).
    pub fn feed(&mut self, chunk: &[u8], out_frames: &mut Vec<Vec<u8>>) {
        if chunk.is_empty() {
            return;
        }

        let mut rest = chunk;
        while !rest.is_empty() {
            let zero_at = memchr::memchr(0, rest);
            let (segment, remainder) = match zero_at {
                Some(idx) => (&rest[..idx], &rest[idx + 1..]),
                None => (rest, &[][..]),
            };

            if !segment.is_empty() {
                match self.state {
                    State::Empty => {
                        self.accumulator.clear();
                        self.state = State::Accumulating;
                        self.push_segment(segment);
                    }
                    State::Accumulating => self.push_segment(segment),
                    State::OverflowWaitingForTerminator => {}
                }
            }

            if zero_at.is_some() {
                match self.state {
                    State::Accumulating => {
                        let mut payload = Vec::new();
                        match decode(&self.accumulator, &mut payload) {
                            Ok(()) => out_frames.push(payload),
                            Err(err) => {
                                log::warn!("COBS decode failed, dropping frame: {err}");
                            }
                        }
                        self.accumulator.clear();
                        self.state = State::Empty;
                    }
                    State::OverflowWaitingForTerminator => {
                        log::warn!("resynchronized after oversized frame");
                        self.accumulator.clear();
                        self.state = State::Empty;
                    }
                    State::Empty => {}
                }
            }

            rest = remainder;
        }
    }

    fn push_segment(&mut self, segment: &[u8]) {
        if self.state == State::OverflowWaitingForTerminator {
            return;
        }
        if self.accumulator.len() + segment.len() > self.max_len {
            log::warn!(
                "COBS accumulator overflow ({} + {} > {}), dropping in-progress frame",
                self.accumulator.len(),
                segment.len(),
                self.max_len
            );
            self.accumulator.clear();
            self.state = State::OverflowWaitingForTerminator;
            return;
        }
        self.accumulator.extend_from_slice(segment);
    }
}
