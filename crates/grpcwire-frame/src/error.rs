use grpcwire_transport::TransportError;

use crate::status::Status;
use crate::writer::Phase;

/// Errors that can occur during frame encoding, decoding and sequencing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body ended in the middle of a frame.
    #[error("truncated frame (body ended with {buffered} of {expected} bytes)")]
    TruncatedFrame { buffered: usize, expected: usize },

    /// The declared length exceeds the configured maximum message size.
    #[error("frame too large ({size} bytes, max {max})")]
    OversizeFrame { size: usize, max: usize },

    /// An outbound call was made out of phase order.
    #[error("{operation} not allowed in phase {phase}")]
    SequencingViolation {
        operation: &'static str,
        phase: Phase,
    },

    /// The transport failed while pulling or pushing bytes.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error occurred on an async framed stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// gRPC status reported to the peer when this error ends a stream.
    pub fn status(&self) -> Status {
        match self {
            FrameError::TruncatedFrame { .. } => Status::Internal,
            FrameError::OversizeFrame { .. } => Status::ResourceExhausted,
            FrameError::SequencingViolation { .. } => Status::Internal,
            FrameError::Transport(_) | FrameError::Io(_) => Status::Unavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FrameError::TruncatedFrame {
            buffered: 8,
            expected: 15,
        };
        assert_eq!(
            err.to_string(),
            "truncated frame (body ended with 8 of 15 bytes)"
        );

        let err = FrameError::SequencingViolation {
            operation: "send_message",
            phase: Phase::NotStarted,
        };
        assert_eq!(err.to_string(), "send_message not allowed in phase not-started");
    }

    #[test]
    fn errors_map_to_status() {
        let oversize = FrameError::OversizeFrame { size: 10, max: 4 };
        assert_eq!(oversize.status(), Status::ResourceExhausted);

        let truncated = FrameError::TruncatedFrame {
            buffered: 1,
            expected: 5,
        };
        assert_eq!(truncated.status(), Status::Internal);

        let transport = FrameError::from(TransportError::Closed);
        assert_eq!(transport.status(), Status::Unavailable);
    }
}
