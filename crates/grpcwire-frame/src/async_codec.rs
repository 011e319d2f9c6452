//! `tokio_util` codec for gRPC framing.
//!
//! Lets one tokio task per stream drive reassembly through `FramedRead` /
//! `FramedWrite` with the same rules as [`crate::MessageReader`].

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, split_frame, truncated, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// gRPC frame codec for async framed streams.
#[derive(Debug, Clone, Default)]
pub struct GrpcCodec {
    config: FrameConfig,
}

impl GrpcCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for GrpcCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        split_frame(src, self.config.max_message_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let err = truncated(src);
        tracing::warn!(error = %err, "body ended mid-frame");
        src.clear();
        Err(err)
    }
}

impl Encoder<Frame> for GrpcCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        self.config.check_len(item.payload.len())?;
        encode_frame(item.flag, &item.payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes};
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::FLAG_COMPRESSED;

    #[test]
    fn decode_matches_sync_codec() {
        let mut codec = GrpcCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Frame::new("first"), &mut buf).unwrap();
        codec
            .encode(Frame::with_flag(FLAG_COMPRESSED, "second"), &mut buf)
            .unwrap();

        let f1 = codec.decode(&mut buf).unwrap().unwrap();
        let f2 = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");
        assert!(f2.is_compressed());
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_eof_reports_truncation() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u32(10);
        buf.put_slice(b"abc");

        let err = GrpcCodec::new().decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedFrame {
                buffered: 8,
                expected: 15
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_respects_limit() {
        let mut codec = GrpcCodec::with_config(FrameConfig::default().with_max_message_size(2));
        let mut buf = BytesMut::new();
        let err = codec.encode(Frame::new("abc"), &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::OversizeFrame { size: 3, max: 2 }));
        assert!(buf.is_empty());
        assert_eq!(codec.config().max_message_size, Some(2));
    }

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(7);

        let writer = tokio::spawn(async move {
            let mut framed = FramedWrite::new(client, GrpcCodec::new());
            for i in 0..32u8 {
                framed.send(Frame::new(vec![i; i as usize])).await.unwrap();
            }
        });

        let mut framed = FramedRead::new(server, GrpcCodec::new());
        let mut received = Vec::new();
        while let Some(frame) = framed.next().await {
            received.push(frame.unwrap().payload);
        }
        writer.await.unwrap();

        let expected: Vec<Bytes> = (0..32u8).map(|i| Bytes::from(vec![i; i as usize])).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn framed_read_reports_truncation() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 0, 4, b'a']).await.unwrap();
        drop(client);

        let mut framed = FramedRead::new(server, GrpcCodec::new());
        let err = framed.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::TruncatedFrame { .. }));
    }

    #[tokio::test]
    async fn streams_are_independent_tasks() {
        let (good_client, good_server) = tokio::io::duplex(16);
        let (mut bad_client, bad_server) = tokio::io::duplex(16);

        let good = tokio::spawn(async move {
            let mut framed = FramedRead::new(good_server, GrpcCodec::new());
            let mut count = 0usize;
            while let Some(frame) = framed.next().await {
                frame.unwrap();
                count += 1;
            }
            count
        });
        let bad = tokio::spawn(async move {
            let mut framed = FramedRead::new(bad_server, GrpcCodec::new());
            framed.next().await.map(|frame| frame.is_err())
        });

        bad_client.write_all(&[0, 0, 0]).await.unwrap();
        drop(bad_client);
        assert_eq!(bad.await.unwrap(), Some(true));

        let mut framed = FramedWrite::new(good_client, GrpcCodec::new());
        framed.send(Frame::new("still")).await.unwrap();
        framed.send(Frame::new("fine")).await.unwrap();
        drop(framed);
        assert_eq!(good.await.unwrap(), 2);
    }
}
