use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use serde::Serialize;
use sevents_transport::EventStream;
use tracing::trace;

use crate::codec::{declared_len, encode_frame, validate_name, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Bind a writer to a transport.
///
/// Fails with [`FrameError::NotWritable`] for read-only streams.
pub fn writer(stream: EventStream) -> Result<EventWriter<EventStream>> {
    EventWriter::with_config_stream(stream, FrameConfig::default())
}

/// Writes encoded events to any `Write` stream.
///
/// Every send writes exactly one complete frame and flushes. Nothing is
/// buffered across calls.
pub struct EventWriter<W> {
    inner: W,
    buf: BytesMut,
    config: FrameConfig,
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Serialize `body` as JSON and send it as event `name`.
    ///
    /// `None` sends a bodyless frame, which is distinct from a JSON `null`.
    pub fn send<T: Serialize + ?Sized>(&mut self, name: &str, body: Option<&T>) -> Result<()> {
        validate_name(name)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(FrameError::Serialize)?;
        self.send_raw(name, body.as_deref())
    }

    /// Send an event without a body.
    pub fn send_bare(&mut self, name: &str) -> Result<()> {
        self.send_raw(name, None)
    }

    /// Send an already-serialized body.
    ///
    /// The body is written as is; the receiving side deserializes it as JSON.
    pub fn send_raw(&mut self, name: &str, body: Option<&[u8]>) -> Result<()> {
        let len = declared_len(name.len(), body.map(<[u8]>::len));
        if len > self.config.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.config.max_frame_len,
            });
        }

        self.buf.clear();
        encode_frame(name, body, &mut self.buf)?;
        self.write_buffered()?;
        trace!(event = name, size = self.buf.len(), "sent frame");
        Ok(())
    }

    /// Write a decoded or hand-built frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send_raw(&frame.name, frame.body.as_deref())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl EventWriter<EventStream> {
    /// Check that `stream` is writable and apply the configured write timeout.
    pub fn with_config_stream(stream: EventStream, config: FrameConfig) -> Result<Self> {
        stream.ensure_writable()?;
        stream.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(stream, config))
    }
}

impl<W> std::fmt::Debug for EventWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWriter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn written(writer: EventWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn send_writes_one_frame_per_call() {
        let mut writer = EventWriter::new(Cursor::new(Vec::new()));
        writer.send("foo", Some(&0)).unwrap();
        writer.send("foo", Some(&1)).unwrap();
        writer.send_bare("bar").unwrap();

        assert_eq!(written(writer), b"6;foo;0;6;foo;1;4;bar;");
    }

    #[test]
    fn send_serializes_structured_bodies() {
        let mut writer = EventWriter::new(Cursor::new(Vec::new()));
        writer
            .send("a:foo", Some(&json!({"hello": "world"})))
            .unwrap();
        writer.send::<serde_json::Value>("a:bar", None).unwrap();

        assert_eq!(
            written(writer),
            br#"24;a:foo;{"hello":"world"};6;a:bar;"#.to_vec()
        );
    }

    #[test]
    fn send_raw_and_write_frame() {
        let mut writer = EventWriter::new(Cursor::new(Vec::new()));
        writer.send_raw("foo", Some(&b"[1,2]"[..])).unwrap();
        writer
            .write_frame(&Frame::new("foo", Some(bytes::Bytes::from_static(b"3"))))
            .unwrap();

        assert_eq!(written(writer), b"10;foo;[1,2];6;foo;3;");
    }

    #[test]
    fn invalid_name_writes_nothing() {
        let mut writer = EventWriter::new(Cursor::new(Vec::new()));
        assert!(matches!(
            writer.send("a;b", Some(&1)),
            Err(FrameError::InvalidName { .. })
        ));
        assert!(matches!(
            writer.send_bare(""),
            Err(FrameError::InvalidName { .. })
        ));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn frame_too_large_rejected() {
        let cfg = FrameConfig {
            max_frame_len: 8,
            ..FrameConfig::default()
        };
        let mut writer = EventWriter::with_config(Cursor::new(Vec::new()), cfg);

        writer.send("foo", Some(&1)).unwrap();
        let err = writer.send("foo", Some("oversized")).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { max: 8, .. }));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = EventWriter::new(sink);

        writer.send_bare("x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut writer = EventWriter::new(InterruptedOnce::default());
        writer.send("retry", Some(&true)).unwrap();

        assert_eq!(writer.into_inner().data, b"11;retry;true;");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = EventWriter::new(ZeroWriter);
        let err = writer.send_bare("x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn stdin_is_not_writable() {
        let err = writer(EventStream::stdin()).unwrap_err();
        assert!(matches!(err, FrameError::NotWritable { kind: "stdin" }));
    }

    #[test]
    #[cfg(unix)]
    fn applies_write_timeout_for_socket_stream() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let writer = EventWriter::with_config_stream(EventStream::from(left), cfg).unwrap();
        let EventStream::Unix(stream) = writer.get_ref() else {
            panic!("expected unix stream");
        };
        assert_eq!(
            stream.write_timeout().unwrap(),
            Some(std::time::Duration::from_millis(10))
        );
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InterruptedOnce {
        wrote_once: bool,
        flushed_once: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            // Short writes exercise the resume offset.
            let n = buf.len().min(4);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flushed_once {
                self.flushed_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
