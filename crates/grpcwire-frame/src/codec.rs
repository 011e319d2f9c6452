use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame prefix: compression flag (1) + length (4) = 5 bytes.
pub const PREFIX_SIZE: usize = 5;

/// Compression flag for an uncompressed payload.
pub const FLAG_UNCOMPRESSED: u8 = 0;

/// Compression flag for a payload compressed with the negotiated encoding.
pub const FLAG_COMPRESSED: u8 = 1;

/// Default maximum message size: 4 MiB, the usual gRPC receive limit.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// A complete gRPC message with its compression flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Compression flag from the frame prefix.
    pub flag: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create an uncompressed frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::with_flag(FLAG_UNCOMPRESSED, payload)
    }

    /// Create a frame with an explicit compression flag.
    pub fn with_flag(flag: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            flag,
            payload: payload.into(),
        }
    }

    /// Returns true if the payload is marked as compressed.
    pub fn is_compressed(&self) -> bool {
        self.flag != FLAG_UNCOMPRESSED
    }

    /// The total wire size of this frame (prefix + payload).
    pub fn wire_size(&self) -> usize {
        PREFIX_SIZE + self.payload.len()
    }

    /// Encode this frame into a new buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.flag, &self.payload, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// One frame parsed in place from a borrowed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub flag: u8,
    pub payload: &'a [u8],
    /// Bytes following the frame; they belong to the next frame.
    pub remainder: &'a [u8],
}

impl DecodedFrame<'_> {
    /// Number of buffer bytes this frame occupied.
    pub fn consumed(&self) -> usize {
        PREFIX_SIZE + self.payload.len()
    }
}

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────┐
/// │ Flag (1B)    │ Length       │ Payload          │
/// │ 0 = plain    │ (4B BE)      │ (Length bytes)   │
/// └──────────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_frame(flag: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::OversizeFrame {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(PREFIX_SIZE + payload.len());
    dst.put_u8(flag);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of `src` without consuming it.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// A declared length above `max_message_size` fails as soon as the prefix is
/// available, before any payload bytes are required.
pub fn decode_frame(
    src: &[u8],
    max_message_size: Option<usize>,
) -> Result<Option<DecodedFrame<'_>>> {
    let Some(len) = declared_length(src) else {
        return Ok(None); // Need more data
    };

    if let Some(max) = max_message_size {
        if len > max {
            return Err(FrameError::OversizeFrame { size: len, max });
        }
    }

    let total = frame_len(len)?;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    Ok(Some(DecodedFrame {
        flag: src[0],
        payload: &src[PREFIX_SIZE..total],
        remainder: &src[total..],
    }))
}

/// Decode one frame and remove it from the front of `src`.
///
/// The payload is split off without copying; bytes of following frames stay
/// in `src`.
pub fn split_frame(
    src: &mut BytesMut,
    max_message_size: Option<usize>,
) -> Result<Option<Frame>> {
    let (flag, consumed) = match decode_frame(src, max_message_size)? {
        Some(decoded) => (decoded.flag, decoded.consumed()),
        None => return Ok(None),
    };

    let mut frame = src.split_to(consumed);
    frame.advance(PREFIX_SIZE);
    Ok(Some(Frame {
        flag,
        payload: frame.freeze(),
    }))
}

/// Payload length declared by the prefix at the front of `src`, if complete.
pub(crate) fn declared_length(src: &[u8]) -> Option<usize> {
    let prefix: [u8; 4] = src.get(1..PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix) as usize)
}

/// Prefix plus payload size of a frame, if it fits in `usize`.
pub(crate) fn frame_len(payload_len: usize) -> Result<usize> {
    PREFIX_SIZE
        .checked_add(payload_len)
        .ok_or(FrameError::OversizeFrame {
            size: payload_len,
            max: usize::MAX - PREFIX_SIZE,
        })
}

/// Error for a body that ended while `src` still held part of a frame.
pub(crate) fn truncated(src: &[u8]) -> FrameError {
    let expected = declared_length(src).map_or(PREFIX_SIZE, |len| {
        PREFIX_SIZE.saturating_add(len)
    });
    FrameError::TruncatedFrame {
        buffered: src.len(),
        expected,
    }
}

/// Configuration for framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size in bytes, `None` for no limit. Default: 4 MiB.
    pub max_message_size: Option<usize>,
    /// Bytes per read when pulling body data from a byte stream. Default: 8 KiB.
    pub read_chunk_size: usize,
}

impl FrameConfig {
    /// Configuration without a message size limit.
    pub fn unbounded() -> Self {
        Self {
            max_message_size: None,
            ..Self::default()
        }
    }

    /// Override the maximum message size.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = Some(max);
        self
    }

    /// Reject `len` if it exceeds the configured limit.
    pub(crate) fn check_len(&self, len: usize) -> Result<()> {
        match self.max_message_size {
            Some(max) if len > max => Err(FrameError::OversizeFrame { size: len, max }),
            _ => Ok(()),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            read_chunk_size: grpcwire_transport::DEFAULT_CHUNK_SIZE,
        }
    }
}
