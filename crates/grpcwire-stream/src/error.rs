use grpcwire_frame::{FrameError, Status};

use crate::handler::HandlerError;

/// Errors that end a single stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Framing or transport failure.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The handler rejected the call.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// The handler panicked; the panic message is kept.
    #[error("stream handler panicked: {0}")]
    HandlerPanicked(String),

    /// The worker thread could not be started.
    #[error("failed to spawn stream worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked.
    #[error("stream worker panicked")]
    WorkerPanicked,
}

impl StreamError {
    /// gRPC status reported in the trailers of the failed stream.
    pub fn status(&self) -> Status {
        match self {
            StreamError::Frame(err) => err.status(),
            StreamError::Handler(err) => err.status,
            StreamError::HandlerPanicked(_)
            | StreamError::Spawn(_)
            | StreamError::WorkerPanicked => Status::Internal,
        }
    }

    /// Message reported in the `grpc-message` trailer.
    pub fn status_message(&self) -> String {
        match self {
            StreamError::Handler(err) => err.message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
