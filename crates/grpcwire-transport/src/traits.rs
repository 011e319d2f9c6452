use bytes::Bytes;

use crate::error::Result;
use crate::metadata::Metadata;

/// One pull from the inbound body.
///
/// Chunk boundaries are arbitrary and carry no framing meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// More data; the body continues.
    More(Bytes),
    /// The last data of the body.
    Final(Bytes),
    /// The body ended with no further data.
    Finished,
}

impl Chunk {
    /// Returns true if no chunk will follow this one.
    pub fn is_last(&self) -> bool {
        !matches!(self, Chunk::More(_))
    }

    /// Number of data bytes carried by this chunk.
    pub fn len(&self) -> usize {
        match self {
            Chunk::More(bytes) | Chunk::Final(bytes) => bytes.len(),
            Chunk::Finished => 0,
        }
    }

    /// Returns true if the chunk carries no data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split the chunk into its data and the end-of-body marker.
    pub fn into_parts(self) -> (Bytes, bool) {
        match self {
            Chunk::More(bytes) => (bytes, false),
            Chunk::Final(bytes) => (bytes, true),
            Chunk::Finished => (Bytes::new(), true),
        }
    }
}

/// Pull side of an inbound request body.
///
/// `pull_chunk` may block (or park the owning worker) until the peer sends
/// more data. Once a `Final` or `Finished` chunk has been returned the framing
/// layer never pulls again.
pub trait ChunkSource {
    /// Pull the next raw chunk of the body.
    fn pull_chunk(&mut self) -> Result<Chunk>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &mut S {
    fn pull_chunk(&mut self) -> Result<Chunk> {
        (**self).pull_chunk()
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn pull_chunk(&mut self) -> Result<Chunk> {
        (**self).pull_chunk()
    }
}

/// Push side of an outbound response.
///
/// Ordering of calls is preserved by the implementation. Phase ordering
/// (headers, body, trailers) is enforced one layer up by the response writer.
pub trait ResponseSink {
    /// Begin the response with an HTTP status and initial metadata.
    fn open_response(&mut self, status: u16, headers: &Metadata) -> Result<()>;

    /// Append raw bytes to the response body.
    fn write_bytes(&mut self, bytes: Bytes) -> Result<()>;

    /// End the response with trailing metadata.
    fn close_response(&mut self, trailers: &Metadata) -> Result<()>;
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn open_response(&mut self, status: u16, headers: &Metadata) -> Result<()> {
        (**self).open_response(status, headers)
    }

    fn write_bytes(&mut self, bytes: Bytes) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn close_response(&mut self, trailers: &Metadata) -> Result<()> {
        (**self).close_response(trailers)
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn open_response(&mut self, status: u16, headers: &Metadata) -> Result<()> {
        (**self).open_response(status, headers)
    }

    fn write_bytes(&mut self, bytes: Bytes) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn close_response(&mut self, trailers: &Metadata) -> Result<()> {
        (**self).close_response(trailers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_parts() {
        assert_eq!(
            Chunk::More(Bytes::from_static(b"ab")).into_parts(),
            (Bytes::from_static(b"ab"), false)
        );
        assert_eq!(
            Chunk::Final(Bytes::from_static(b"c")).into_parts(),
            (Bytes::from_static(b"c"), true)
        );
        assert_eq!(Chunk::Finished.into_parts(), (Bytes::new(), true));
    }

    #[test]
    fn chunk_last_and_len() {
        assert!(!Chunk::More(Bytes::from_static(b"x")).is_last());
        assert!(Chunk::Final(Bytes::new()).is_last());
        assert!(Chunk::Finished.is_last());
        assert_eq!(Chunk::More(Bytes::from_static(b"xyz")).len(), 3);
        assert!(Chunk::Finished.is_empty());
    }
}
