//! Tokio integration: a codec over [`FrameParser`] and an async read loop.

use std::collections::VecDeque;

use bytes::BytesMut;
use futures_util::StreamExt;
use sevents_registry::Events;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, Encoder, FramedRead};
use tracing::debug;

use crate::codec::{encode_frame, Frame, FrameConfig, DEFAULT_MAX_FRAME_LEN};
use crate::dispatch::Dispatcher;
use crate::error::{FrameError, Result};
use crate::parser::FrameParser;

/// `tokio_util` codec for event frames.
///
/// Decoding hands every buffered byte to the incremental parser, so the
/// codec never needs to look ahead. Frames completed before a framing
/// error are yielded before the error.
#[derive(Debug)]
pub struct EventCodec {
    parser: FrameParser,
    ready: VecDeque<Frame>,
    pending_error: Option<FrameError>,
    max_frame_len: usize,
}

impl EventCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            parser: FrameParser::with_max_frame_len(max_frame_len),
            ready: VecDeque::new(),
            pending_error: None,
            max_frame_len,
        }
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if !src.is_empty() && self.pending_error.is_none() {
            let chunk = src.split();
            let ready = &mut self.ready;
            if let Err(err) = self.parser.push(&chunk, |frame| ready.push_back(frame)) {
                self.pending_error = Some(err);
            }
        }

        if let Some(frame) = self.ready.pop_front() {
            return Ok(Some(frame));
        }
        match self.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if self.parser.is_idle() {
            Ok(None)
        } else {
            Err(FrameError::ConnectionClosed)
        }
    }
}

impl Encoder<Frame> for EventCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let len = frame.declared_len();
        if len > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.max_frame_len,
            });
        }
        encode_frame(&frame.name, frame.body.as_deref(), dst)
    }
}

/// Read frames from `reader` until EOF and dispatch them to `events`.
pub async fn listen_async<R>(reader: R, events: Events) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    listen_async_with_config(reader, events, &FrameConfig::default()).await
}

/// [`listen_async`] with explicit frame limits and read size.
pub async fn listen_async_with_config<R>(
    reader: R,
    events: Events,
    config: &FrameConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let codec = EventCodec::with_max_frame_len(config.max_frame_len);
    let mut frames = FramedRead::with_capacity(reader, codec, config.read_chunk_size.max(1));
    let mut dispatcher = Dispatcher::new(events);

    while let Some(next) = frames.next().await {
        let frame = match next {
            Ok(frame) => frame,
            Err(err) => {
                dispatcher.run_pending();
                return Err(err);
            }
        };
        dispatcher.dispatch(frame);
        for rejected in dispatcher.run_pending() {
            debug!(error = %rejected, "skipped malformed event body");
        }
    }

    debug!(skipped = dispatcher.skipped(), "async reader finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use futures_util::SinkExt;
    use serde_json::json;
    use sevents_registry::Payload;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::FramedWrite;

    use super::*;

    fn collect(events: &Events) -> Arc<Mutex<Vec<(String, Payload)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.on_any(move |name, payload| {
            sink.lock().unwrap().push((name.to_string(), payload.clone()));
        });
        seen
    }

    #[test]
    fn codec_yields_frames_before_error() {
        let mut codec = EventCodec::new();
        let mut src = BytesMut::from(&b"4;foo;6;bar;1;x;"[..]);

        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Frame::new("foo", None))
        );
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Frame::new("bar", Some(Bytes::from_static(b"1"))))
        );
        assert!(matches!(
            codec.decode(&mut src),
            Err(FrameError::Framing { .. })
        ));
    }

    #[test]
    fn codec_eof_mid_frame() {
        let mut codec = EventCodec::new();
        let mut src = BytesMut::from(&b"10;foo;12"[..]);

        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert!(matches!(
            codec.decode_eof(&mut src),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn codec_encoder_enforces_limit() {
        let mut codec = EventCodec::with_max_frame_len(4);
        let mut dst = BytesMut::new();

        codec.encode(Frame::new("foo", None), &mut dst).unwrap();
        assert_eq!(dst.as_ref(), b"4;foo;");

        let err = codec
            .encode(Frame::new("foo", Some(Bytes::from_static(b"1"))), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 6, max: 4 }));
    }

    #[tokio::test]
    async fn listen_over_split_writes() {
        let (mut client, server) = tokio::io::duplex(4);
        let events = Events::new();
        let seen = collect(&events);

        let wire = "6;foo;0;19;föö;\"žžžžž\";4;bar;".as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            for chunk in wire.chunks(3) {
                client.write_all(chunk).await.unwrap();
            }
        });

        listen_async(server, events).await.unwrap();
        writer.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("foo".to_string(), Payload::from(json!(0))),
                ("föö".to_string(), Payload::from(json!("žžžžž"))),
                ("bar".to_string(), Payload::None),
            ]
        );
    }

    #[tokio::test]
    async fn framed_write_round_trip() {
        let (client, server) = tokio::io::duplex(64);
        let events = Events::new();
        let seen = collect(&events);

        let writer = tokio::spawn(async move {
            let mut sink = FramedWrite::new(client, EventCodec::new());
            for i in 0..10 {
                let frame = Frame::from_event("tick", Some(&i)).unwrap();
                sink.send(frame).await.unwrap();
            }
        });

        listen_async(server, events).await.unwrap();
        writer.await.unwrap();

        let ticks: Vec<Payload> = seen.lock().unwrap().iter().map(|(_, p)| p.clone()).collect();
        let expected: Vec<Payload> = (0..10).map(|i| Payload::from(json!(i))).collect();
        assert_eq!(ticks, expected);
    }

    #[tokio::test]
    async fn listen_reports_truncated_stream() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"10;foo;12").await.unwrap();
        drop(client);

        let err = listen_async(server, Events::new()).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
