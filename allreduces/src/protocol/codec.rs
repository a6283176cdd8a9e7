//! rkyv encoding for `ControlMessage` payloads.
//!
//! The stream layer already length-prefixes every payload, so a frame here
//! is just the archived bytes.

use crate::error::{AlError, Result};
use crate::protocol::ControlMessage;

/// Largest control payload accepted from a peer.
pub const MAX_CONTROL_BYTES: usize = 64 * 1024;

pub fn encode_message(msg: &ControlMessage) -> Result<Vec<u8>> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| AlError::EncodeFailed(e.to_string()))?;
    Ok(bytes.to_vec())
}

pub fn decode_message(payload: &[u8]) -> Result<ControlMessage> {
    if payload.len() > MAX_CONTROL_BYTES {
        return Err(AlError::DecodeFailed(format!(
            "control payload of {} bytes exceeds {MAX_CONTROL_BYTES}",
            payload.len()
        )));
    }
    // Payloads arrive in pooled byte buffers with no alignment guarantee.
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    rkyv::from_bytes::<ControlMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| AlError::DecodeFailed(e.to_string()))
}
