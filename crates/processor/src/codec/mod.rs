//! Decode/encode bridge
//!
//! A [`Codec`] turns an inbound UPER payload into a decoded value and writes
//! that value out as XER. [`Transcoder`] runs one payload through both halves
//! and keeps the first-block flag in step with successful decodes.

pub mod octet_string;

use thiserror::Error;

pub use octet_string::OctetStringCodec;

/// Encoder failure reported by a [`Codec`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("XER encoding failed: {0}")]
    Encode(String),
}

/// Per-message transcoding failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The payload is not a valid encoding of the message type
    #[error("failed to decode {len} byte payload")]
    DecodeFailed { len: usize },

    /// The payload decoded but could not be written as XML
    #[error("failed to encode decoded {len} byte payload: {reason}")]
    EncodeFailed { len: usize, reason: String },
}

/// A message set's UPER decoder paired with its XER encoder
pub trait Codec {
    /// In-memory form of one decoded message
    type Decoded;

    /// Decode one payload; `first_block` is set until the first successful decode
    fn decode(&self, payload: &[u8], first_block: bool) -> Option<Self::Decoded>;

    /// Append the XML encoding of `value` to `out`
    fn encode(&self, value: &Self::Decoded, out: &mut Vec<u8>) -> Result<(), CodecError>;
}

/// Decoder state carried across messages for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeState {
    first_block: bool,
}

impl DecodeState {
    pub fn new() -> Self {
        Self { first_block: true }
    }

    /// True until a payload has decoded successfully
    pub fn is_first_block(&self) -> bool {
        self.first_block
    }
}

impl Default for DecodeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs payloads through a [`Codec`]
#[derive(Debug, Clone)]
pub struct Transcoder<C> {
    codec: C,
}

impl<C: Codec> Transcoder<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Decode `payload` and append its XML encoding to `out`
    ///
    /// Returns the number of bytes appended, always non-zero. On failure
    /// `out` is left at the length it had on entry.
    pub fn transcode(
        &self,
        payload: &[u8],
        state: &mut DecodeState,
        out: &mut Vec<u8>,
    ) -> Result<usize, BridgeError> {
        let decoded = self
            .codec
            .decode(payload, state.first_block)
            .ok_or(BridgeError::DecodeFailed { len: payload.len() })?;

        state.first_block = false;

        let start = out.len();
        let reason = match self.codec.encode(&decoded, out) {
            Ok(()) if out.len() > start => return Ok(out.len() - start),
            Ok(()) => "encoder produced no output".to_string(),
            Err(e) => e.to_string(),
        };

        out.truncate(start);
        Err(BridgeError::EncodeFailed {
            len: payload.len(),
            reason,
        })
    }
}
