//! Frame codec: schema-driven pack/unpack of the tagged-union RPC message
//! (spec.md §4.5).
//!
//! The "schema" is the generated [`crate::proto::RpcFrame`] type; offsets and
//! oneof tags are handled by `prost` rather than hand-rolled field-offset
//! tables, but the contract spec.md describes — total within a configured
//! budget, clean failure rather than silent truncation — is preserved
//! exactly.

use crate::error::CodecError;
use crate::proto::RpcFrame;
use prost::Message;

/// Encode `frame` into `out`, failing if the encoded form would exceed
/// `max_len`. Mirrors spec.md: "messages exceeding the configured max fail
/// cleanly, do not truncate silently."
pub fn encode(frame: &RpcFrame, max_len: usize, out: &mut Vec<u8>) -> Result<usize, CodecError> {
    let needed = frame.encoded_len();
    if needed > max_len {
        return Err(CodecError::TooLarge(needed, max_len));
    }
    out.clear();
    out.reserve(needed);
    frame.encode(out)?;
    Ok(out.len())
}

/// Decode a received buffer into an [`RpcFrame`], failing if its length
/// exceeds `max_len` or the bytes are not a valid encoding.
pub fn decode(buf: &[u8], max_len: usize) -> Result<RpcFrame, CodecError> {
    if buf.len() > max_len {
        return Err(CodecError::TooLarge(buf.len(), max_len));
    }
    Ok(RpcFrame::decode(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{fs_callset, rpc_frame, FsCallset, GetFsInfoCall, Header};

    #[test]
    fn roundtrip_is_identity() {
        let frame = RpcFrame {
            header: Some(Header {
                seqn: 7,
                no_reply: false,
                status: 0,
            }),
            which_callset: Some(rpc_frame::WhichCallset::Fs(FsCallset {
                which_msg: Some(fs_callset::WhichMsg::GetFsInfoCall(GetFsInfoCall {
                    label: "data".to_string(),
                })),
            })),
        };
        let mut buf = Vec::new();
        encode(&frame, 4096, &mut buf).unwrap();
        let decoded = decode(&buf, 4096).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn encode_over_budget_fails_cleanly() {
        let frame = RpcFrame {
            header: Some(Header {
                seqn: 1,
                no_reply: false,
                status: 0,
            }),
            which_callset: Some(rpc_frame::WhichCallset::Fs(FsCallset {
                which_msg: Some(fs_callset::WhichMsg::GetFsInfoCall(GetFsInfoCall {
                    label: "x".repeat(100),
                })),
            })),
        };
        let mut buf = Vec::new();
        let err = encode(&frame, 8, &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::TooLarge(_, 8)));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode(&[0xff, 0xff, 0xff, 0xff, 0xff], 4096).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
