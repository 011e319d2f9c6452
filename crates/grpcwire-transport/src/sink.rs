use std::io::{ErrorKind, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::metadata::Metadata;
use crate::traits::ResponseSink;

/// One observed call on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Open { status: u16, headers: Metadata },
    Data(Bytes),
    Close { trailers: Metadata },
}

/// Sink that records every call in order.
///
/// Clones share the same event log, so a clone kept by a test can observe a
/// sink that was moved into a worker thread.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    /// Concatenation of all body bytes written so far.
    pub fn body(&self) -> Vec<u8> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Data(bytes) => Some(bytes.as_ref()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Trailers, once the response was closed.
    pub fn trailers(&self) -> Option<Metadata> {
        self.lock().iter().find_map(|event| match event {
            SinkEvent::Close { trailers } => Some(trailers.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        // A poisoned log is still a valid log.
        self.events.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl ResponseSink for RecordingSink {
    fn open_response(&mut self, status: u16, headers: &Metadata) -> Result<()> {
        self.lock().push(SinkEvent::Open {
            status,
            headers: headers.clone(),
        });
        Ok(())
    }

    fn write_bytes(&mut self, bytes: Bytes) -> Result<()> {
        self.lock().push(SinkEvent::Data(bytes));
        Ok(())
    }

    fn close_response(&mut self, trailers: &Metadata) -> Result<()> {
        self.lock().push(SinkEvent::Close {
            trailers: trailers.clone(),
        });
        Ok(())
    }
}

/// Sink that writes body bytes to any `Write` stream.
///
/// Headers and trailers have no byte representation on a plain stream; they
/// are kept on the sink and exposed through accessors.
pub struct WriteSink<W> {
    inner: W,
    status: Option<u16>,
    headers: Metadata,
    trailers: Option<Metadata>,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            status: None,
            headers: Metadata::new(),
            trailers: None,
        }
    }

    /// HTTP status passed to `open_response`, if the response was opened.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn headers(&self) -> &Metadata {
        &self.headers
    }

    pub fn trailers(&self) -> Option<&Metadata> {
        self.trailers.as_ref()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the sink and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn ensure_open(&self) -> Result<()> {
        if self.trailers.is_some() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<W: Write> ResponseSink for WriteSink<W> {
    fn open_response(&mut self, status: u16, headers: &Metadata) -> Result<()> {
        self.ensure_open()?;
        self.status = Some(status);
        self.headers = headers.clone();
        Ok(())
    }

    fn write_bytes(&mut self, bytes: Bytes) -> Result<()> {
        self.ensure_open()?;
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.flush()
    }

    fn close_response(&mut self, trailers: &Metadata) -> Result<()> {
        self.ensure_open()?;
        self.flush()?;
        self.trailers = Some(trailers.clone());
        Ok(())
    }
}
