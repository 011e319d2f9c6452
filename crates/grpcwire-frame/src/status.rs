//! gRPC status codes and the trailers that carry them.

use grpcwire_transport::Metadata;

/// Trailer carrying the numeric status code.
pub const GRPC_STATUS: &str = "grpc-status";

/// Trailer carrying the percent-encoded status message.
pub const GRPC_MESSAGE: &str = "grpc-message";

/// Header naming the body content type.
pub const CONTENT_TYPE: &str = "content-type";

/// Content type of a gRPC body.
pub const GRPC_CONTENT_TYPE: &str = "application/grpc";

/// gRPC status codes (<https://grpc.github.io/grpc/core/md_doc_statuscodes.html>).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Status {
    /// Parse a status code; unknown values map to `Unknown`.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            Self::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::ResourceExhausted => write!(f, "RESOURCE_EXHAUSTED"),
            Self::FailedPrecondition => write!(f, "FAILED_PRECONDITION"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::OutOfRange => write!(f, "OUT_OF_RANGE"),
            Self::Unimplemented => write!(f, "UNIMPLEMENTED"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::DataLoss => write!(f, "DATA_LOSS"),
            Self::Unauthenticated => write!(f, "UNAUTHENTICATED"),
        }
    }
}

/// Build trailers for a final status. An empty message is omitted.
pub fn status_trailers(status: Status, message: &str) -> Metadata {
    let mut trailers = Metadata::new().with(GRPC_STATUS, status.code().to_string());
    if !message.is_empty() {
        trailers.insert(GRPC_MESSAGE, percent_encode(message));
    }
    trailers
}

/// Extract status and message from trailers.
///
/// A missing status reads as `Ok`, an unparseable one as `Unknown`.
pub fn status_from_trailers(trailers: &Metadata) -> (Status, String) {
    let status = match trailers.get(GRPC_STATUS) {
        None => Status::Ok,
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map(Status::from_code)
            .unwrap_or(Status::Unknown),
    };
    let message = trailers
        .get(GRPC_MESSAGE)
        .map(percent_decode)
        .unwrap_or_default();
    (status, message)
}

// grpc-message is percent-encoded: anything outside printable ASCII, and '%'.
fn percent_encode(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for byte in message.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'%' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for code in 0..=16u32 {
            assert_eq!(Status::from_code(code).code(), code);
        }
    }

    #[test]
    fn unknown_status_code() {
        assert_eq!(Status::from_code(99), Status::Unknown);
        assert_eq!(Status::from_code(u32::MAX), Status::Unknown);
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::Ok.to_string(), "OK");
        assert_eq!(Status::ResourceExhausted.to_string(), "RESOURCE_EXHAUSTED");
        assert_eq!(Status::Unauthenticated.to_string(), "UNAUTHENTICATED");
    }

    #[test]
    fn trailers_round_trip() {
        let trailers = status_trailers(Status::NotFound, "no such method: 100% sure");
        assert_eq!(trailers.get(GRPC_STATUS), Some("5"));
        assert_eq!(
            trailers.get(GRPC_MESSAGE),
            Some("no such method: 100%25 sure")
        );

        let (status, message) = status_from_trailers(&trailers);
        assert_eq!(status, Status::NotFound);
        assert_eq!(message, "no such method: 100% sure");
    }

    #[test]
    fn non_ascii_message_is_encoded() {
        let trailers = status_trailers(Status::Internal, "caf\u{e9}\n");
        assert_eq!(trailers.get(GRPC_MESSAGE), Some("caf%C3%A9%0A"));
        assert_eq!(status_from_trailers(&trailers).1, "caf\u{e9}\n");
    }

    #[test]
    fn ok_without_message_has_status_only() {
        let trailers = status_trailers(Status::Ok, "");
        assert_eq!(trailers.len(), 1);
    }

    #[test]
    fn missing_or_bad_status() {
        assert_eq!(status_from_trailers(&Metadata::new()), (Status::Ok, String::new()));

        let bad = Metadata::new().with(GRPC_STATUS, "nope");
        assert_eq!(status_from_trailers(&bad).0, Status::Unknown);
    }

    #[test]
    fn malformed_escape_is_kept() {
        assert_eq!(percent_decode("50%"), "50%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
