use bytes::BytesMut;
use grpcwire_transport::{Metadata, ResponseSink};

use crate::codec::{encode_frame, FrameConfig, FLAG_UNCOMPRESSED};
use crate::error::{FrameError, Result};
use crate::status::{
    status_trailers, Status, CONTENT_TYPE, GRPC_CONTENT_TYPE, GRPC_MESSAGE, GRPC_STATUS,
};

/// HTTP status of every gRPC response; the call outcome travels in trailers.
const HTTP_OK: u16 = 200;

/// Outbound phase of one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    HeadersSent,
    BodyInProgress,
    /// Terminal.
    TrailersSent,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::NotStarted => "not-started",
            Phase::HeadersSent => "headers-sent",
            Phase::BodyInProgress => "body-in-progress",
            Phase::TrailersSent => "trailers-sent",
        };
        f.write_str(name)
    }
}

/// Writes one gRPC response: headers, then framed messages, then trailers.
///
/// Each call is written through to the sink immediately; the writer keeps
/// only the phase marker. Out-of-order calls fail with
/// [`FrameError::SequencingViolation`] and write nothing. In debug builds
/// they also panic, unless [`ResponseWriter::strict_sequencing`] turned
/// that off.
pub struct ResponseWriter<S> {
    sink: S,
    phase: Phase,
    config: FrameConfig,
    messages: usize,
    strict: bool,
}

impl<S: ResponseSink> ResponseWriter<S> {
    /// Create a response writer with default configuration.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, FrameConfig::default())
    }

    /// Create a response writer with explicit configuration.
    pub fn with_config(sink: S, config: FrameConfig) -> Self {
        Self {
            sink,
            phase: Phase::NotStarted,
            config,
            messages: 0,
            strict: true,
        }
    }

    /// Whether out-of-order calls panic in debug builds. Default: true.
    ///
    /// With `false` they only return the error.
    pub fn strict_sequencing(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Send the response headers. Legal only as the first call.
    ///
    /// `content-type: application/grpc` is added unless the caller set one.
    pub fn send_headers(&mut self, metadata: &Metadata) -> Result<()> {
        self.require("send_headers", &[Phase::NotStarted])?;

        let mut headers = Metadata::new();
        if !metadata.contains(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, GRPC_CONTENT_TYPE);
        }
        headers.extend(metadata);

        self.sink.open_response(HTTP_OK, &headers)?;
        self.phase = Phase::HeadersSent;
        tracing::trace!(headers = headers.len(), "response headers sent");
        Ok(())
    }

    /// Encode and send an uncompressed message.
    pub fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        self.send_frame(FLAG_UNCOMPRESSED, payload)
    }

    /// Encode and send a message with an explicit compression flag.
    pub fn send_frame(&mut self, flag: u8, payload: &[u8]) -> Result<()> {
        self.require("send_message", &[Phase::HeadersSent, Phase::BodyInProgress])?;
        self.config.check_len(payload.len())?;

        let mut buf = BytesMut::new();
        encode_frame(flag, payload, &mut buf)?;

        self.sink.write_bytes(buf.freeze())?;
        self.phase = Phase::BodyInProgress;
        self.messages += 1;
        tracing::trace!(size = payload.len(), flag, "response message sent");
        Ok(())
    }

    /// Send the trailers and end the response.
    pub fn send_trailers(&mut self, metadata: &Metadata) -> Result<()> {
        self.require("send_trailers", &[Phase::HeadersSent, Phase::BodyInProgress])?;

        self.sink.close_response(metadata)?;
        self.phase = Phase::TrailersSent;
        tracing::debug!(messages = self.messages, "response closed");
        Ok(())
    }

    /// End the response with `grpc-status` / `grpc-message` trailers.
    pub fn finish(&mut self, status: Status, message: &str) -> Result<()> {
        self.finish_with(status, message, &Metadata::new())
    }

    /// End the response with status trailers followed by `extra` metadata.
    ///
    /// Any `grpc-status` / `grpc-message` in `extra` is dropped; `status` and
    /// `message` win.
    pub fn finish_with(&mut self, status: Status, message: &str, extra: &Metadata) -> Result<()> {
        let mut extra = extra.clone();
        extra.remove(GRPC_STATUS);
        extra.remove(GRPC_MESSAGE);

        let mut trailers = status_trailers(status, message);
        trailers.extend(&extra);
        self.send_trailers(&trailers)
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        tracing::error!(operation, phase = %self.phase, "response calls out of order");
        debug_assert!(
            !self.strict,
            "{operation} not allowed in phase {}",
            self.phase
        );
        Err(FrameError::SequencingViolation {
            operation,
            phase: self.phase,
        })
    }

    /// Current outbound phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true once trailers were sent.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::TrailersSent
    }

    /// Number of messages sent so far.
    pub fn messages(&self) -> usize {
        self.messages
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the writer and return the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
