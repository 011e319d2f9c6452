//! Transport boundary for gRPC message framing.
//!
//! The framing layer never talks to sockets or HTTP/2 streams directly. It
//! pulls raw body chunks through a [`ChunkSource`] and pushes the outbound
//! response through a [`ResponseSink`]. Whatever owns the real connection
//! (an HTTP/2 server, a test harness, a file replay) implements these two
//! traits.
//!
//! This is the lowest layer of grpcwire. Everything else builds on top of
//! the contracts defined here.

pub mod error;
pub mod metadata;
pub mod sink;
pub mod source;
pub mod traits;

pub use error::{Result, TransportError};
pub use metadata::Metadata;
pub use sink::{RecordingSink, SinkEvent, WriteSink};
pub use source::{channel_source, ChannelSource, ChunkQueue, ChunkSender, ReadSource};
pub use traits::{Chunk, ChunkSource, ResponseSink};

/// Default size of a single read when pulling chunks from a byte reader.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
