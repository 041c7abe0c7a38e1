//! Frame handling: several PDUs of one type in a buffer, with failures isolated per PDU.
//!
//! Back-to-back PDUs are octet-aligned (each complete encoding is padded to whole octets), so a
//! frame is decoded by repeatedly decoding at the next octet. Unaligned PER carries no outer
//! length, so once a PDU fails to decode the position of the next one is unknown: the failure is
//! recorded and the rest of the frame is reported as one malformed range. Independently delimited
//! PDUs (one per packet, say) go through [`decode_batch`], where a bad PDU never affects the next.

use crate::codec::{Codec, Decoded, Warning};
use crate::error::CodecError;
use crate::value::Value;
use std::ops::Range;

#[derive(Debug)]
pub struct FrameDecodeResult {
    /// PDUs that decoded.
    pub messages: Vec<DecodedMessage>,
    /// PDUs that failed, with the octets they cover.
    pub malformed: Vec<MalformedMessage>,
}

#[derive(Debug)]
pub struct DecodedMessage {
    pub value: Value,
    pub byte_range: Range<usize>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
pub struct MalformedMessage {
    pub byte_range: Range<usize>,
    pub error: CodecError,
}

impl FrameDecodeResult {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
    }
}

/// Decode consecutive PDUs of `type_name` from `bytes`.
pub fn decode_frame(codec: &Codec, type_name: &str, bytes: &[u8]) -> FrameDecodeResult {
    let mut messages = Vec::new();
    let mut malformed = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        match codec.decode_message(type_name, &bytes[offset..]) {
            Ok(decoded) => {
                let consumed = decoded.octets;
                messages.push(DecodedMessage {
                    value: decoded.value,
                    byte_range: offset..offset + consumed,
                    warnings: decoded.warnings,
                });
                offset += consumed;
            }
            Err(error) => {
                log::debug!("{}: malformed PDU at octet {}: {}", type_name, offset, error);
                malformed.push(MalformedMessage {
                    byte_range: offset..bytes.len(),
                    error,
                });
                break;
            }
        }
    }
    FrameDecodeResult {
        messages,
        malformed,
    }
}

/// Decode independently delimited PDUs; each result stands alone.
pub fn decode_batch<'a, I>(codec: &Codec, type_name: &str, pdus: I) -> Vec<Result<Decoded, CodecError>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    pdus.into_iter()
        .enumerate()
        .map(|(i, pdu)| {
            codec.decode_message(type_name, pdu).map_err(|e| {
                log::debug!("{}: PDU #{} malformed: {}", type_name, i, e);
                e
            })
        })
        .collect()
}

/// Concatenate the complete encodings of `values`.
pub fn encode_frame(codec: &Codec, type_name: &str, values: &[Value]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for value in values {
        out.extend(codec.encode_message(type_name, value)?);
    }
    Ok(out)
}
