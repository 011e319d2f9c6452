//! gRPC length-prefixed message framing over chunked transports.
//!
//! grpcwire turns the raw, arbitrarily chunked body of a gRPC stream into
//! whole messages, and writes responses in the order the protocol demands:
//! headers, length-prefixed messages, then status trailers.
//!
//! # Crate Structure
//!
//! - [`transport`]: the chunk source / response sink boundary and adapters
//! - [`frame`]: wire codec, message reassembly and the response writer
//! - [`stream`]: per-stream workers with handler dispatch (behind `stream`)
//!
//! ```
//! use grpcwire::frame::{Frame, FrameConfig, MessageReader};
//!
//! let mut body = Frame::new("hello").encode().unwrap().to_vec();
//! body.extend_from_slice(&Frame::new("world").encode().unwrap());
//!
//! let reader = MessageReader::from_bytes(body, FrameConfig::default());
//! let payloads: Vec<_> = reader.map(|frame| frame.unwrap().payload).collect();
//! assert_eq!(payloads, ["hello", "world"]);
//! ```

/// Re-export transport types.
pub mod transport {
    pub use grpcwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use grpcwire_frame::*;
}

/// Re-export stream worker types (requires `stream` feature).
#[cfg(feature = "stream")]
pub mod stream {
    pub use grpcwire_stream::*;
}
