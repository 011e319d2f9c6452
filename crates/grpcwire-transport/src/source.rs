use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::mpsc;

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::traits::{Chunk, ChunkSource};
use crate::DEFAULT_CHUNK_SIZE;

/// Pulls chunks from any `Read` stream.
///
/// Each pull performs one read of at most `chunk_size` bytes. EOF is reported
/// as [`Chunk::Finished`].
pub struct ReadSource<R> {
    inner: R,
    chunk: Vec<u8>,
    finished: bool,
}

impl<R: Read> ReadSource<R> {
    /// Create a source with the default chunk size.
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Create a source that reads at most `chunk_size` bytes per pull.
    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk: vec![0u8; chunk_size.max(1)],
            finished: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the source and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ChunkSource for ReadSource<R> {
    fn pull_chunk(&mut self) -> Result<Chunk> {
        if self.finished {
            return Ok(Chunk::Finished);
        }
        loop {
            match self.inner.read(&mut self.chunk) {
                Ok(0) => {
                    self.finished = true;
                    return Ok(Chunk::Finished);
                }
                Ok(n) => return Ok(Chunk::More(Bytes::copy_from_slice(&self.chunk[..n]))),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

/// In-memory chunk source with pre-split chunks.
///
/// By default the last queued chunk is delivered as [`Chunk::Final`]; with
/// `trailing_finished` it is delivered as [`Chunk::More`] followed by a
/// separate [`Chunk::Finished`].
#[derive(Debug, Default, Clone)]
pub struct ChunkQueue {
    chunks: VecDeque<Bytes>,
    trailing_finished: bool,
    done: bool,
    pulls: usize,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every chunk of `chunks` in order.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Split `data` into chunks of `chunk_size` bytes (the last may be shorter).
    pub fn split(data: &[u8], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self::from_chunks(data.chunks(chunk_size).map(Bytes::copy_from_slice))
    }

    /// Report end of body as a separate `Finished` pull.
    pub fn trailing_finished(mut self) -> Self {
        self.trailing_finished = true;
        self
    }

    /// Number of times `pull_chunk` has been called.
    pub fn pulls(&self) -> usize {
        self.pulls
    }

    /// Chunks not yet pulled.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

impl ChunkSource for ChunkQueue {
    fn pull_chunk(&mut self) -> Result<Chunk> {
        self.pulls += 1;
        if self.done {
            return Ok(Chunk::Finished);
        }
        match self.chunks.pop_front() {
            Some(bytes) if self.chunks.is_empty() && !self.trailing_finished => {
                self.done = true;
                Ok(Chunk::Final(bytes))
            }
            Some(bytes) => Ok(Chunk::More(bytes)),
            None => {
                self.done = true;
                Ok(Chunk::Finished)
            }
        }
    }
}

/// Create a connected sender/source pair.
///
/// The sender is handed to whatever receives body data from the network; the
/// source is owned by the stream worker. Dropping the sender without
/// finishing the body surfaces as [`TransportError::Disconnected`].
pub fn channel_source() -> (ChunkSender, ChannelSource) {
    let (tx, rx) = mpsc::channel();
    (ChunkSender { tx }, ChannelSource { rx, done: false })
}

/// Feeding half of [`channel_source`].
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Chunk>,
}

impl ChunkSender {
    /// Send a chunk of body data.
    pub fn send(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_chunk(Chunk::More(data.into()))
    }

    /// Send the last chunk of body data.
    pub fn send_final(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_chunk(Chunk::Final(data.into()))
    }

    /// Signal end of body with no further data.
    pub fn finish(&self) -> Result<()> {
        self.send_chunk(Chunk::Finished)
    }

    fn send_chunk(&self, chunk: Chunk) -> Result<()> {
        self.tx.send(chunk).map_err(|_| TransportError::Closed)
    }
}

/// Worker half of [`channel_source`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Chunk>,
    done: bool,
}

impl ChunkSource for ChannelSource {
    fn pull_chunk(&mut self) -> Result<Chunk> {
        if self.done {
            return Ok(Chunk::Finished);
        }
        match self.rx.recv() {
            Ok(chunk) => {
                self.done = chunk.is_last();
                Ok(chunk)
            }
            Err(_) => {
                self.done = true;
                tracing::debug!("chunk sender dropped before end of body");
                Err(TransportError::Disconnected(
                    "sender dropped before end of body".to_string(),
                ))
            }
        }
    }
}
