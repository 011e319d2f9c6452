/// Errors that can occur at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound side was already closed.
    #[error("transport closed")]
    Closed,

    /// The peer went away without finishing the stream.
    #[error("peer disconnected: {0}")]
    Disconnected(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
