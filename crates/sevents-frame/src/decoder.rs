use sevents_registry::Events;

use crate::codec::FrameConfig;
use crate::dispatch::Dispatcher;
use crate::error::{FrameError, Result};
use crate::parser::FrameParser;

/// Create a decoder that delivers events to `events`.
pub fn decoder(events: Events) -> EventDecoder {
    EventDecoder::new(events)
}

/// Incremental event decoder bound to one transport.
///
/// Each call to [`feed`](EventDecoder::feed) parses one chunk and schedules
/// listener work for every frame it completes. Listeners run only when the
/// owner calls [`run_pending`](EventDecoder::run_pending), in decode order,
/// exact-name batch before wildcard batch.
#[derive(Debug)]
pub struct EventDecoder {
    parser: FrameParser,
    dispatcher: Dispatcher,
}

impl EventDecoder {
    pub fn new(events: Events) -> Self {
        Self::with_config(events, &FrameConfig::default())
    }

    pub fn with_config(events: Events, config: &FrameConfig) -> Self {
        Self {
            parser: FrameParser::with_max_frame_len(config.max_frame_len),
            dispatcher: Dispatcher::new(events),
        }
    }

    /// Parse one chunk and return the number of frames it completed.
    ///
    /// On a framing error, frames completed earlier in the same chunk are
    /// still scheduled, and the decoder refuses all further input.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<usize> {
        let mut frames = 0usize;
        let dispatcher = &mut self.dispatcher;
        self.parser.push(chunk, |frame| {
            frames += 1;
            dispatcher.dispatch(frame);
        })?;
        Ok(frames)
    }

    /// Invoke every scheduled listener batch and return rejected bodies.
    pub fn run_pending(&mut self) -> Vec<FrameError> {
        self.dispatcher.run_pending()
    }

    /// Number of scheduled tasks not yet run.
    pub fn pending(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Frames dropped because no listener was registered for them.
    pub fn skipped(&self) -> u64 {
        self.dispatcher.skipped()
    }

    /// The registry this decoder dispatches to.
    pub fn events(&self) -> &Events {
        self.dispatcher.events()
    }

    /// Whether no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.parser.is_idle()
    }

    pub fn is_failed(&self) -> bool {
        self.parser.is_failed()
    }
}
