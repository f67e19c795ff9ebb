use std::io::{ErrorKind, Read};
use std::thread::JoinHandle;

use sevents_registry::Events;
use sevents_transport::EventStream;
use tracing::{debug, trace};

use crate::codec::FrameConfig;
use crate::decoder::EventDecoder;
use crate::error::{FrameError, Result};

/// Bind a reader to a transport.
///
/// Events are delivered to `events`, or to a fresh registry when `None`.
/// Fails with [`FrameError::NotReadable`] for write-only streams.
pub fn reader(stream: EventStream, events: Option<Events>) -> Result<EventReader<EventStream>> {
    EventReader::with_config_stream(stream, events.unwrap_or_default(), FrameConfig::default())
}

/// Outcome of one [`EventReader::pump`] call.
#[derive(Debug)]
pub enum Progress {
    /// A chunk was read and its completed frames dispatched.
    Data {
        frames: usize,
        /// Frames whose body failed to deserialize, in decode order.
        rejected: Vec<FrameError>,
    },
    /// The stream ended cleanly on a frame boundary.
    Eof,
}

/// Reads chunks from any `Read` stream and dispatches the events they carry.
///
/// Chunks are fed in arrival order; after each chunk the pending listener
/// batches run on the reading thread.
pub struct EventReader<R> {
    inner: R,
    decoder: EventDecoder,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl<R: Read> EventReader<R> {
    pub fn new(inner: R, events: Events) -> Self {
        Self::with_config(inner, events, FrameConfig::default())
    }

    pub fn with_config(inner: R, events: Events, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: EventDecoder::with_config(events, &config),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
        }
    }

    /// Read one chunk, feed it and run the listeners it scheduled.
    ///
    /// Listeners for frames completed before a framing error still run
    /// before the error is returned. EOF in the middle of a frame is
    /// [`FrameError::ConnectionClosed`].
    pub fn pump(&mut self) -> Result<Progress> {
        let read = loop {
            match self.inner.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if read == 0 {
            if self.decoder.is_idle() {
                trace!("stream ended on a frame boundary");
                return Ok(Progress::Eof);
            }
            return Err(FrameError::ConnectionClosed);
        }

        let fed = self.decoder.feed(&self.chunk[..read]);
        let rejected = self.decoder.run_pending();
        let frames = fed?;
        Ok(Progress::Data { frames, rejected })
    }

    /// Pump until the stream ends.
    ///
    /// Malformed bodies are logged and skipped. Framing and I/O errors end
    /// the loop.
    pub fn run(&mut self) -> Result<()> {
        let mut total = 0usize;
        loop {
            match self.pump()? {
                Progress::Data { frames, rejected } => {
                    total += frames;
                    if !rejected.is_empty() {
                        debug!(count = rejected.len(), "skipped malformed event bodies");
                    }
                }
                Progress::Eof => {
                    debug!(
                        frames = total,
                        skipped = self.decoder.skipped(),
                        "reader finished"
                    );
                    return Ok(());
                }
            }
        }
    }

    /// The listener registry this reader dispatches to.
    pub fn events(&self) -> &Events {
        self.decoder.events()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<R: Read + Send + 'static> EventReader<R> {
    /// Run the read loop on a dedicated thread.
    pub fn spawn(mut self) -> Result<ReaderHandle> {
        let events = self.events().clone();
        let join = std::thread::Builder::new()
            .name("sevents-reader".to_string())
            .spawn(move || self.run())?;
        Ok(ReaderHandle { events, join })
    }
}

impl EventReader<EventStream> {
    /// Check that `stream` is readable and apply the configured read timeout.
    pub fn with_config_stream(
        stream: EventStream,
        events: Events,
        config: FrameConfig,
    ) -> Result<Self> {
        stream.ensure_readable()?;
        stream.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(stream, events, config))
    }
}

impl<R> std::fmt::Debug for EventReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader")
            .field("decoder", &self.decoder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A reader running on its own thread.
#[derive(Debug)]
pub struct ReaderHandle {
    events: Events,
    join: JoinHandle<Result<()>>,
}

impl ReaderHandle {
    /// Listener registry of the running reader. Registrations take effect
    /// for frames decoded after the call.
    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the reader to hit EOF or fail.
    pub fn join(self) -> Result<()> {
        self.join
            .join()
            .map_err(|_| FrameError::Io(std::io::Error::other("reader thread panicked")))?
    }
}
