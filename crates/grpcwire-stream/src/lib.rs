//! Per-stream gRPC workers.
//!
//! This is the "just works" layer. Hand a worker the inbound body, the
//! outbound response and a handler; it reassembles messages, feeds them to
//! the handler, writes the replies and always closes the response with
//! status trailers. Failures end only the stream they happen on.

pub mod error;
pub mod handler;
pub mod worker;

pub use error::{Result, StreamError};
pub use handler::{Echo, HandlerError, StreamHandler};
pub use worker::{serve_stream, StreamConfig, StreamOutcome, StreamWorker};
