use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use grpcwire_frame::{FrameConfig, MessageReader, Phase, ResponseWriter, Status};
use grpcwire_transport::{ChunkSource, Metadata, ResponseSink};

use crate::error::{Result, StreamError};
use crate::handler::{HandlerError, StreamHandler};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Per-stream behavior config.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Limits applied to inbound and outbound messages.
    pub frame: FrameConfig,
    /// Worker name used in logs and as the thread name.
    pub name: Option<String>,
    /// Extra response headers sent before the first message.
    pub headers: Metadata,
}

impl StreamConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// What happened on one served stream.
#[derive(Debug)]
pub struct StreamOutcome {
    /// Status reported in the trailers.
    pub status: Status,
    /// Message reported in the trailers (empty on success).
    pub message: String,
    /// Inbound messages reassembled.
    pub received: usize,
    /// Outbound messages written.
    pub sent: usize,
    /// Whether the trailers reached the sink.
    pub trailers_sent: bool,
    /// The failure that ended the stream early, if any.
    pub error: Option<StreamError>,
}

impl StreamOutcome {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok() && self.error.is_none()
    }
}

/// Serve one stream to completion on the calling thread.
///
/// Headers go out first, then every reply the handler produces, then
/// trailers carrying the final status. Framing failures, transport
/// failures, handler errors and handler panics end this stream only: they
/// are reported in the trailers and in the returned outcome, never
/// propagated.
pub fn serve_stream<Src, Snk, H>(
    source: Src,
    sink: Snk,
    config: &StreamConfig,
    handler: &mut H,
) -> StreamOutcome
where
    Src: ChunkSource,
    Snk: ResponseSink,
    H: StreamHandler + ?Sized,
{
    let name = config.name.as_deref().unwrap_or("stream");
    let mut reader = MessageReader::with_config(source, config.frame.clone());
    let mut writer = ResponseWriter::with_config(sink, config.frame.clone());

    let mut error = match writer.send_headers(&config.headers) {
        Ok(()) => pump(&mut reader, &mut writer, handler).err(),
        Err(err) => Some(StreamError::from(err)),
    };

    let (status, message) = match &error {
        None => (Status::Ok, String::new()),
        Some(err) => (err.status(), err.status_message()),
    };

    // Trailers need an opened response.
    let trailers_sent = writer.phase() != Phase::NotStarted
        && match writer.finish(status, &message) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(stream = name, error = %err, "failed to send trailers");
                if error.is_none() {
                    error = Some(err.into());
                }
                false
            }
        };

    let outcome = StreamOutcome {
        status,
        message,
        received: reader.frames(),
        sent: writer.messages(),
        trailers_sent,
        error,
    };

    if outcome.is_ok() {
        tracing::debug!(
            stream = name,
            received = outcome.received,
            sent = outcome.sent,
            "stream complete"
        );
    } else {
        tracing::warn!(
            stream = name,
            status = %outcome.status,
            message = %outcome.message,
            received = outcome.received,
            "stream failed"
        );
    }
    outcome
}

fn pump<Src, Snk, H>(
    reader: &mut MessageReader<Src>,
    writer: &mut ResponseWriter<Snk>,
    handler: &mut H,
) -> Result<()>
where
    Src: ChunkSource,
    Snk: ResponseSink,
    H: StreamHandler + ?Sized,
{
    while let Some(frame) = reader.next_message()? {
        tracing::trace!(len = frame.payload.len(), "dispatching message");
        for reply in guarded(|| handler.on_message(frame))? {
            writer.send_message(&reply)?;
        }
    }
    for reply in guarded(|| handler.on_end())? {
        writer.send_message(&reply)?;
    }
    Ok(())
}

/// Run a handler callback, turning a panic into a stream error.
fn guarded<F>(call: F) -> Result<Vec<Bytes>>
where
    F: FnOnce() -> std::result::Result<Vec<Bytes>, HandlerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(replies) => Ok(replies?),
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::error!(panic = %message, "stream handler panicked");
            Err(StreamError::HandlerPanicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "non-string panic payload".to_string()
}

/// A stream served on its own OS thread.
pub struct StreamWorker {
    name: String,
    handle: JoinHandle<StreamOutcome>,
}

impl StreamWorker {
    /// Spawn a worker thread that serves one stream.
    ///
    /// Unnamed workers get an auto-generated `grpc-stream-N` name.
    pub fn spawn<Src, Snk, H>(
        source: Src,
        sink: Snk,
        mut config: StreamConfig,
        handler: H,
    ) -> Result<Self>
    where
        Src: ChunkSource + Send + 'static,
        Snk: ResponseSink + Send + 'static,
        H: StreamHandler + Send + 'static,
    {
        let name = match &config.name {
            Some(name) => name.clone(),
            None => {
                let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
                format!("grpc-stream-{id}")
            }
        };
        config.name = Some(name.clone());

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut handler = handler;
                serve_stream(source, sink, &config, &mut handler)
            })
            .map_err(StreamError::Spawn)?;

        tracing::debug!(stream = %name, "stream worker started");
        Ok(Self { name, handle })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the stream to end.
    pub fn join(self) -> Result<StreamOutcome> {
        self.handle.join().map_err(|_| {
            tracing::error!(stream = %self.name, "stream worker panicked");
            StreamError::WorkerPanicked
        })
    }
}

impl std::fmt::Debug for StreamWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWorker")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use grpcwire_frame::{
        encode_frame, status_from_trailers, Frame, FrameError, FLAG_UNCOMPRESSED,
    };
    use grpcwire_transport::{ChunkQueue, RecordingSink, SinkEvent, TransportError};

    use super::*;
    use crate::handler::{Echo, HandlerError};

    type HandlerResult = std::result::Result<Vec<Bytes>, HandlerError>;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(FLAG_UNCOMPRESSED, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn final_status(sink: &RecordingSink) -> (Status, String) {
        status_from_trailers(&sink.trailers().expect("trailers"))
    }

    #[test]
    fn echo_stream_ends_ok() {
        let body = wire(&[b"one", b"two", b""]);
        let sink = RecordingSink::new();

        let outcome = serve_stream(
            ChunkQueue::split(&body, 3),
            sink.clone(),
            &StreamConfig::default(),
            &mut Echo,
        );

        assert!(outcome.is_ok());
        assert_eq!(outcome.received, 3);
        assert_eq!(outcome.sent, 3);
        assert!(outcome.trailers_sent);
        assert_eq!(sink.body(), body);
        assert_eq!(final_status(&sink), (Status::Ok, String::new()));
    }

    #[test]
    fn empty_body_still_gets_headers_and_trailers() {
        let sink = RecordingSink::new();
        let outcome = serve_stream(
            ChunkQueue::new().trailing_finished(),
            sink.clone(),
            &StreamConfig::default(),
            &mut Echo,
        );

        assert!(outcome.is_ok());
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SinkEvent::Open { status: 200, .. }));
        assert!(matches!(events[1], SinkEvent::Close { .. }));
    }

    #[test]
    fn truncated_body_reports_internal() {
        let mut body = wire(&[b"whole"]);
        body.extend_from_slice(&[0, 0, 0, 0, 9, b'p']);
        let sink = RecordingSink::new();

        let outcome = serve_stream(
            ChunkQueue::from_chunks([body]),
            sink.clone(),
            &StreamConfig::default(),
            &mut Echo,
        );

        assert_eq!(outcome.status, Status::Internal);
        assert_eq!(outcome.received, 1);
        assert_eq!(outcome.sent, 1);
        assert!(matches!(
            outcome.error,
            Some(StreamError::Frame(FrameError::TruncatedFrame { .. }))
        ));
        let (status, message) = final_status(&sink);
        assert_eq!(status, Status::Internal);
        assert!(message.contains("truncated"));
    }

    #[test]
    fn oversize_reports_resource_exhausted() {
        let body = wire(&[b"0123456789"]);
        let sink = RecordingSink::new();
        let config = StreamConfig::default()
            .with_frame_config(FrameConfig::default().with_max_message_size(4));

        let outcome = serve_stream(
            ChunkQueue::from_chunks([body]),
            sink.clone(),
            &config,
            &mut Echo,
        );

        assert_eq!(outcome.status, Status::ResourceExhausted);
        assert_eq!(outcome.received, 0);
        assert_eq!(final_status(&sink).0, Status::ResourceExhausted);
    }

    #[test]
    fn handler_error_becomes_trailers() {
        let body = wire(&[b"ok", b"bad", b"never"]);
        let sink = RecordingSink::new();
        let mut seen = Vec::new();
        let mut handler = |frame: Frame| -> HandlerResult {
            seen.push(frame.payload.clone());
            if frame.payload.as_ref() == b"bad" {
                return Err(HandlerError::new(Status::InvalidArgument, "bad payload"));
            }
            Ok(vec![frame.payload])
        };

        let outcome = serve_stream(
            ChunkQueue::from_chunks([body]),
            sink.clone(),
            &StreamConfig::default(),
            &mut handler,
        );

        assert_eq!(outcome.status, Status::InvalidArgument);
        assert_eq!(outcome.message, "bad payload");
        assert_eq!(outcome.sent, 1);
        assert_eq!(seen.len(), 2);
        assert_eq!(
            final_status(&sink),
            (Status::InvalidArgument, "bad payload".to_string())
        );
    }

    struct Summing(usize);

    impl StreamHandler for Summing {
        fn on_message(&mut self, frame: Frame) -> HandlerResult {
            self.0 += frame.payload.len();
            Ok(Vec::new())
        }

        fn on_end(&mut self) -> HandlerResult {
            Ok(vec![Bytes::from(self.0.to_string())])
        }
    }

    #[test]
    fn on_end_replies_are_sent_before_trailers() {
        let body = wire(&[b"abc", b"de"]);
        let sink = RecordingSink::new();

        let outcome = serve_stream(
            ChunkQueue::from_chunks([body]),
            sink.clone(),
            &StreamConfig::default(),
            &mut Summing(0),
        );

        assert!(outcome.is_ok());
        assert_eq!(outcome.sent, 1);
        assert_eq!(sink.body(), wire(&[b"5"]));
    }

    #[test]
    fn configured_headers_are_sent() {
        let sink = RecordingSink::new();
        let config = StreamConfig::named("hdr").with_header("x-served-by", "grpcwire");

        serve_stream(ChunkQueue::new(), sink.clone(), &config, &mut Echo);

        match &sink.events()[0] {
            SinkEvent::Open { headers, .. } => {
                assert_eq!(headers.get("x-served-by"), Some("grpcwire"));
                assert_eq!(headers.get("content-type"), Some("application/grpc"));
            }
            other => panic!("unexpected first event: {other:?}"),
        }
    }

    struct FailingSink;

    impl ResponseSink for FailingSink {
        fn open_response(&mut self, _: u16, _: &Metadata) -> grpcwire_transport::Result<()> {
            Err(TransportError::Closed)
        }

        fn write_bytes(&mut self, _: Bytes) -> grpcwire_transport::Result<()> {
            Err(TransportError::Closed)
        }

        fn close_response(&mut self, _: &Metadata) -> grpcwire_transport::Result<()> {
            Err(TransportError::Closed)
        }
    }

    #[test]
    fn dead_sink_is_reported_not_propagated() {
        let outcome = serve_stream(
            ChunkQueue::from_chunks([wire(&[b"x"])]),
            FailingSink,
            &StreamConfig::default(),
            &mut Echo,
        );

        assert_eq!(outcome.status, Status::Unavailable);
        assert!(!outcome.trailers_sent);
        assert_eq!(outcome.received, 0);
        assert!(matches!(
            outcome.error,
            Some(StreamError::Frame(FrameError::Transport(TransportError::Closed)))
        ));
    }

    #[test]
    fn handler_panic_closes_with_internal_trailers() {
        let body = wire(&[b"first", b"boom", b"never"]);
        let sink = RecordingSink::new();
        let mut handler = |frame: Frame| -> HandlerResult {
            if frame.payload.as_ref() == b"boom" {
                panic!("handler exploded");
            }
            Ok(vec![frame.payload])
        };

        let outcome = serve_stream(
            ChunkQueue::from_chunks([body]),
            sink.clone(),
            &StreamConfig::default(),
            &mut handler,
        );

        assert_eq!(outcome.status, Status::Internal);
        assert_eq!(outcome.sent, 1);
        assert!(outcome.trailers_sent);
        assert!(matches!(
            &outcome.error,
            Some(StreamError::HandlerPanicked(message)) if message == "handler exploded"
        ));
        let (status, message) = final_status(&sink);
        assert_eq!(status, Status::Internal);
        assert!(message.contains("handler exploded"));
    }

    #[test]
    fn panic_in_on_end_is_contained() {
        struct PanicsAtEnd;

        impl StreamHandler for PanicsAtEnd {
            fn on_message(&mut self, _: Frame) -> HandlerResult {
                Ok(Vec::new())
            }

            fn on_end(&mut self) -> HandlerResult {
                panic!("{} replies lost", 2)
            }
        }

        let sink = RecordingSink::new();
        let outcome = serve_stream(
            ChunkQueue::from_chunks([wire(&[b"x"])]),
            sink.clone(),
            &StreamConfig::default(),
            &mut PanicsAtEnd,
        );

        assert!(matches!(
            &outcome.error,
            Some(StreamError::HandlerPanicked(message)) if message == "2 replies lost"
        ));
        assert_eq!(final_status(&sink).0, Status::Internal);
    }

    #[test]
    fn worker_thread_uses_name() {
        let sink = RecordingSink::new();
        let worker = StreamWorker::spawn(
            ChunkQueue::from_chunks([wire(&[b"hi"])]),
            sink.clone(),
            StreamConfig::named("named-worker"),
            |frame: Frame| -> HandlerResult {
                let name = thread::current().name().map(str::to_owned).unwrap_or_default();
                assert_eq!(name, "named-worker");
                Ok(vec![frame.payload])
            },
        )
        .unwrap();

        assert_eq!(worker.name(), "named-worker");
        let outcome = worker.join().unwrap();
        assert!(outcome.is_ok());
        assert_eq!(sink.body(), wire(&[b"hi"]));
    }

    #[test]
    fn unnamed_workers_get_distinct_names() {
        let spawn = || {
            StreamWorker::spawn(
                ChunkQueue::new(),
                RecordingSink::new(),
                StreamConfig::default(),
                Echo,
            )
            .unwrap()
        };
        let a = spawn();
        let b = spawn();

        assert!(a.name().starts_with("grpc-stream-"));
        assert_ne!(a.name(), b.name());
        assert!(a.join().unwrap().is_ok());
        assert!(b.join().unwrap().is_ok());
    }
}
