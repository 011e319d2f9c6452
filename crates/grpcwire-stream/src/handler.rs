use bytes::Bytes;
use grpcwire_frame::{Frame, Status};

/// A call-level failure raised by a handler, reported as trailers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct HandlerError {
    pub status: Status,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Application logic for one stream.
///
/// Payloads are opaque bytes; decoding them is up to the handler.
pub trait StreamHandler {
    /// Handle one inbound message, returning zero or more replies.
    fn on_message(&mut self, frame: Frame) -> Result<Vec<Bytes>, HandlerError>;

    /// Called once after the inbound body ended cleanly.
    fn on_end(&mut self) -> Result<Vec<Bytes>, HandlerError> {
        Ok(Vec::new())
    }
}

impl<F> StreamHandler for F
where
    F: FnMut(Frame) -> Result<Vec<Bytes>, HandlerError>,
{
    fn on_message(&mut self, frame: Frame) -> Result<Vec<Bytes>, HandlerError> {
        self(frame)
    }
}

/// Replies to every message with its own payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl StreamHandler for Echo {
    fn on_message(&mut self, frame: Frame) -> Result<Vec<Bytes>, HandlerError> {
        Ok(vec![frame.payload])
    }
}
