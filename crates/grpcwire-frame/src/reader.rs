use bytes::{Bytes, BytesMut};
use grpcwire_transport::{ChunkQueue, ChunkSource, ReadSource};

use crate::codec::{split_frame, truncated, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Where the reassembler is in its pull/parse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyState {
    /// The buffer can't yield a frame; the next step pulls a chunk.
    Filling,
    /// The next step parses the buffer without pulling.
    Draining,
    /// The stream is over (clean end or error). Terminal.
    Exhausted,
}

/// Reassembles complete gRPC messages from a chunked body.
///
/// Handles partial chunks internally; callers always get complete frames.
/// A chunk is only pulled once the buffered bytes are proven insufficient
/// for one more frame, so at most one chunk beyond the next frame is held.
///
/// The reader is also an [`Iterator`] of `Result<Frame>`. After a clean end or
/// an error it is fused and yields nothing more.
pub struct MessageReader<S> {
    source: S,
    buf: BytesMut,
    state: ReassemblyState,
    at_stream_end: bool,
    config: FrameConfig,
    pulls: usize,
    frames: usize,
}

impl<S: ChunkSource> MessageReader<S> {
    /// Create a reader with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, FrameConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(source: S, config: FrameConfig) -> Self {
        Self {
            source,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ReassemblyState::Filling,
            at_stream_end: false,
            config,
            pulls: 0,
            frames: 0,
        }
    }

    /// Produce the next complete message.
    ///
    /// Returns `Ok(None)` once the body ended on a frame boundary. A body
    /// that ends mid-frame fails with [`FrameError::TruncatedFrame`]; no
    /// partial payload is ever returned.
    pub fn next_message(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                ReassemblyState::Exhausted => return Ok(None),
                ReassemblyState::Draining => {
                    match split_frame(&mut self.buf, self.config.max_message_size) {
                        Ok(Some(frame)) => {
                            self.frames += 1;
                            tracing::trace!(
                                size = frame.payload.len(),
                                flag = frame.flag,
                                buffered = self.buf.len(),
                                "message reassembled"
                            );
                            return Ok(Some(frame));
                        }
                        Ok(None) if !self.at_stream_end => self.state = ReassemblyState::Filling,
                        Ok(None) => return self.finish(),
                        Err(err) => return Err(self.fail(err)),
                    }
                }
                ReassemblyState::Filling => {
                    let chunk = match self.source.pull_chunk() {
                        Ok(chunk) => chunk,
                        Err(err) => return Err(self.fail(err.into())),
                    };
                    self.pulls += 1;

                    let (data, last) = chunk.into_parts();
                    tracing::trace!(size = data.len(), last, "pulled body chunk");
                    self.buf.extend_from_slice(&data);
                    self.at_stream_end = last;
                    self.state = ReassemblyState::Draining;
                }
            }
        }
    }

    fn finish(&mut self) -> Result<Option<Frame>> {
        self.state = ReassemblyState::Exhausted;
        if self.buf.is_empty() {
            tracing::debug!(frames = self.frames, "body ended cleanly");
            return Ok(None);
        }
        let err = truncated(&self.buf);
        tracing::warn!(error = %err, "body ended mid-frame");
        self.buf.clear();
        Err(err)
    }

    fn fail(&mut self, err: FrameError) -> FrameError {
        tracing::warn!(error = %err, "message reassembly failed");
        self.state = ReassemblyState::Exhausted;
        self.buf.clear();
        err
    }

    /// Current state of the pull/parse cycle.
    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Number of chunks pulled from the source.
    pub fn pulls(&self) -> usize {
        self.pulls
    }

    /// Number of frames returned so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns true once the reader can yield nothing more.
    pub fn is_exhausted(&self) -> bool {
        self.state == ReassemblyState::Exhausted
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader and return the source. Buffered bytes are dropped.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<R: std::io::Read> MessageReader<ReadSource<R>> {
    /// Create a reader over a byte stream, reading `config.read_chunk_size`
    /// bytes per pull.
    pub fn from_reader(inner: R, config: FrameConfig) -> Self {
        let source = ReadSource::with_chunk_size(inner, config.read_chunk_size);
        Self::with_config(source, config)
    }
}

impl MessageReader<ChunkQueue> {
    /// Create a reader over a complete in-memory body delivered as one chunk.
    pub fn from_bytes(body: impl Into<Bytes>, config: FrameConfig) -> Self {
        let body: Bytes = body.into();
        Self::with_config(ChunkQueue::from_chunks([body]), config)
    }
}

impl<S: ChunkSource> Iterator for MessageReader<S> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}

impl<S: ChunkSource> std::iter::FusedIterator for MessageReader<S> {}

impl<S> std::fmt::Debug for MessageReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReader")
            .field("state", &self.state)
            .field("buffered", &self.buf.len())
            .field("at_stream_end", &self.at_stream_end)
            .field("pulls", &self.pulls)
            .field("frames", &self.frames)
            .finish()
    }
}
