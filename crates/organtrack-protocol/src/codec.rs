//! Length-prefixed framing shared by control messages and image payloads.
//!
//! ```text
//! [u32 LE length][payload: length bytes]
//! ```
//!
//! Frames carry no type tag. A connection alternates one control frame
//! (UTF-8 JSON) and one image frame per tick; a zero-length frame marks the
//! slot as absent for that tick.

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed, LengthDelimitedCodec};

use crate::error::ProtocolError;
use crate::messages::ControlMessage;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX: usize = 4;

/// Default maximum frame payload size (16 MB)
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Stream codec for `[u32 LE length][payload]` frames.
///
/// A stream that ends in the middle of a frame is reported as a clean end of
/// stream rather than an error: the peer simply went away.
#[derive(Debug)]
pub struct WireCodec {
    inner: LengthDelimitedCodec,
}

impl WireCodec {
    pub fn new(max_frame_length: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_PREFIX)
            .little_endian()
            .max_frame_length(max_frame_length)
            .new_codec();
        Self { inner }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_LENGTH)
    }
}

impl Decoder for WireCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ProtocolError> {
        Ok(self.inner.decode(src)?)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, ProtocolError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // Peer closed mid-frame; drop the partial bytes.
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for WireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        Ok(self.inner.encode(item, dst)?)
    }
}

/// Wrap any byte stream in the wire codec
pub fn framed<T>(io: T, max_frame_length: usize) -> Framed<T, WireCodec>
where
    T: AsyncRead + AsyncWrite,
{
    Framed::new(io, WireCodec::new(max_frame_length))
}

/// Serialize a message to its JSON payload (without length prefix)
pub fn to_payload<T: Serialize>(message: &T) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// Encode a payload into a complete wire frame
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encode a control message into a complete wire frame
pub fn encode_control(message: &ControlMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(message)?;
    Ok(encode_frame(&payload))
}

/// Result of decoding one frame from an in-memory buffer
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A complete frame and the number of buffer bytes it occupied
    Frame { payload: &'a [u8], consumed: usize },
    /// The buffer ends before the frame does
    Incomplete { needed: usize },
}

/// Decode a single frame from the front of `buf`
pub fn decode_frame(buf: &[u8]) -> Decoded<'_> {
    let Some(prefix) = buf.get(..LENGTH_PREFIX) else {
        return Decoded::Incomplete {
            needed: LENGTH_PREFIX - buf.len(),
        };
    };

    let mut len = [0u8; LENGTH_PREFIX];
    len.copy_from_slice(prefix);
    let len = u32::from_le_bytes(len) as usize;
    let end = LENGTH_PREFIX + len;

    match buf.get(LENGTH_PREFIX..end) {
        Some(payload) => Decoded::Frame {
            payload,
            consumed: end,
        },
        None => Decoded::Incomplete {
            needed: end - buf.len(),
        },
    }
}

/// Parse a control-slot payload.
///
/// An empty payload means no control message this tick.
pub fn parse_control(payload: &[u8]) -> Result<Option<ControlMessage>, ProtocolError> {
    if payload.is_empty() {
        return Ok(None);
    }
    let text = std::str::from_utf8(payload)?;
    Ok(Some(serde_json::from_str(text)?))
}
