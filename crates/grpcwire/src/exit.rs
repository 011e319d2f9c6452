use std::fmt;
use std::io;

use grpcwire_frame::FrameError;
use grpcwire_stream::StreamError;
use grpcwire_transport::TransportError;

// Exit codes. Truncated and oversize input have distinct codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_TRUNCATED: i32 = 60;
pub const DATA_TOO_LARGE: i32 = 61;
pub const HANDLER_FAILED: i32 = 70;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Transport(source) => transport_error(context, source),
        FrameError::TruncatedFrame { .. } => {
            CliError::new(DATA_TRUNCATED, format!("{context}: {err}"))
        }
        FrameError::OversizeFrame { .. } => {
            CliError::new(DATA_TOO_LARGE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn stream_error(context: &str, err: StreamError) -> CliError {
    match err {
        StreamError::Frame(err) => frame_error(context, err),
        StreamError::Handler(_) | StreamError::HandlerPanicked(_) => {
            CliError::new(HANDLER_FAILED, format!("{context}: {err}"))
        }
        StreamError::Spawn(source) => io_error(context, source),
        StreamError::WorkerPanicked => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
