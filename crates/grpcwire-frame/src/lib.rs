//! gRPC message framing over chunked HTTP/2 bodies.
//!
//! This is the core value-add layer of grpcwire. Every message on the wire is
//! framed with:
//! - A 1-byte compression flag (0 = uncompressed)
//! - A 4-byte big-endian payload length
//! - Exactly that many payload bytes
//!
//! [`MessageReader`] turns arbitrarily chunked body data into complete
//! messages; [`ResponseWriter`] keeps the outbound headers, messages and
//! trailers in order. No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod status;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_frame, encode_frame, split_frame, DecodedFrame, Frame, FrameConfig,
    DEFAULT_MAX_MESSAGE_SIZE, FLAG_COMPRESSED, FLAG_UNCOMPRESSED, PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::{MessageReader, ReassemblyState};
pub use status::{status_from_trailers, status_trailers, Status};
pub use writer::{Phase, ResponseWriter};

#[cfg(feature = "async")]
pub use async_codec::GrpcCodec;
