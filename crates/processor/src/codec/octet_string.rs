//! UPER to XER codec for the ASN.1 type `OCTET STRING`
//!
//! The unaligned PER encoding of an unconstrained `OCTET STRING` is a general
//! length determinant followed by the content octets:
//!
//! - `0nnnnnnn`: fewer than 128 octets follow
//! - `10nnnnnn nnnnnnnn`: fewer than 16384 octets follow
//! - `11mmmmmm` with `m` in `1..=4`: a fragment of `m * 16384` octets follows,
//!   then another length determinant for the remainder
//!
//! The XER form is the content in upper-case hex inside an `OCTET_STRING`
//! element.

use super::{Codec, CodecError};

const FRAGMENT_UNIT: usize = 16 * 1024;
const MAX_FRAGMENT_UNITS: u8 = 4;

const XER_OPEN: &[u8] = b"<OCTET_STRING>";
const XER_CLOSE: &[u8] = b"</OCTET_STRING>";

/// Codec for an unconstrained `OCTET STRING`
///
/// `skip_bytes` leading bytes are dropped from the first block of the
/// stream before decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OctetStringCodec {
    skip_bytes: usize,
}

impl OctetStringCodec {
    pub fn new(skip_bytes: usize) -> Self {
        Self { skip_bytes }
    }
}

impl Codec for OctetStringCodec {
    type Decoded = Vec<u8>;

    fn decode(&self, payload: &[u8], first_block: bool) -> Option<Vec<u8>> {
        let input = if first_block {
            payload.get(self.skip_bytes..)?
        } else {
            payload
        };

        decode_uper(input)
    }

    fn encode(&self, value: &Vec<u8>, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.reserve(XER_OPEN.len() + value.len() * 2 + XER_CLOSE.len());
        out.extend_from_slice(XER_OPEN);
        out.extend_from_slice(hex::encode_upper(value).as_bytes());
        out.extend_from_slice(XER_CLOSE);
        Ok(())
    }
}

/// Decode a complete encoding; trailing octets are an error
fn decode_uper(mut input: &[u8]) -> Option<Vec<u8>> {
    let mut content = Vec::new();

    loop {
        let (&first, rest) = input.split_first()?;

        let (len, rest, fragment) = match first >> 6 {
            0b00 | 0b01 => (usize::from(first & 0x7F), rest, false),
            0b10 => {
                let (&second, rest) = rest.split_first()?;
                ((usize::from(first & 0x3F) << 8) | usize::from(second), rest, false)
            }
            _ => {
                let units = first & 0x3F;
                if units == 0 || units > MAX_FRAGMENT_UNITS {
                    return None;
                }
                (usize::from(units) * FRAGMENT_UNIT, rest, true)
            }
        };

        if rest.len() < len {
            return None;
        }
        let (octets, rest) = rest.split_at(len);
        content.extend_from_slice(octets);

        if !fragment {
            return rest.is_empty().then_some(content);
        }
        input = rest;
    }
}
