use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use sevents_registry::{Batch, Event, Events, Payload};
use tracing::{debug, trace, warn};

use crate::codec::Frame;
use crate::error::FrameError;

/// Work scheduled by the decoder, run later in FIFO order.
#[derive(Debug)]
pub enum Task {
    /// Invoke a snapshot of one listener list with a decoded event.
    Deliver { batch: Batch, event: Arc<Event> },
    /// A frame whose body could not be deserialized.
    Reject(FrameError),
}

/// FIFO queue decoupling frame parsing from listener invocation.
///
/// Nothing runs while a chunk is being parsed; the owner drains the queue
/// with [`DispatchQueue::run_pending`] once it is done feeding.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    tasks: VecDeque<Task>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every queued task in order.
    ///
    /// Returns rejected frames in the order they were decoded. A listener
    /// that panics is logged and skipped; the listeners after it in the same
    /// batch and every later batch still run.
    pub fn run_pending(&mut self) -> Vec<FrameError> {
        let mut rejected = Vec::new();
        while let Some(task) = self.tasks.pop_front() {
            match task {
                Task::Deliver { batch, event } => {
                    batch.invoke_each(&event, |index, panic| {
                        warn!(
                            event = %event.name,
                            listeners = %batch.key(),
                            index,
                            panic = panic_message(panic.as_ref()),
                            "event listener panicked"
                        );
                    });
                }
                Task::Reject(err) => rejected.push(err),
            }
        }
        rejected
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Turns decoded frames into scheduled listener work.
///
/// For each frame the exact-name and wildcard lists are looked up together.
/// With no listener on either, the frame is dropped and its body is never
/// deserialized. Otherwise the exact-name batch is queued before the
/// wildcard batch.
#[derive(Debug)]
pub struct Dispatcher {
    events: Events,
    queue: DispatchQueue,
    skipped: u64,
}

impl Dispatcher {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            queue: DispatchQueue::new(),
            skipped: 0,
        }
    }

    /// Schedule delivery of one frame.
    pub fn dispatch(&mut self, frame: Frame) {
        let (exact, wildcard) = self.events.snapshot_for(&frame.name);
        if exact.is_none() && wildcard.is_none() {
            self.skipped = self.skipped.saturating_add(1);
            debug!(event = %frame.name, "no listeners; frame skipped");
            return;
        }

        let payload = match frame.body {
            None => Payload::None,
            Some(body) => match serde_json::from_slice(&body) {
                Ok(value) => Payload::Value(value),
                Err(source) => {
                    warn!(event = %frame.name, error = %source, "rejecting malformed event body");
                    self.queue.push(Task::Reject(FrameError::MalformedBody {
                        name: frame.name,
                        source,
                    }));
                    return;
                }
            },
        };

        let event = Arc::new(Event::new(frame.name, payload));
        trace!(
            event = %event.name,
            exact = exact.as_ref().map_or(0, Batch::len),
            wildcard = wildcard.as_ref().map_or(0, Batch::len),
            "scheduling delivery"
        );
        if let Some(batch) = exact {
            self.queue.push(Task::Deliver {
                batch,
                event: Arc::clone(&event),
            });
        }
        if let Some(batch) = wildcard {
            self.queue.push(Task::Deliver { batch, event });
        }
    }

    /// Run scheduled deliveries. See [`DispatchQueue::run_pending`].
    pub fn run_pending(&mut self) -> Vec<FrameError> {
        self.queue.run_pending()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Frames dropped because nobody was listening.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn events(&self) -> &Events {
        &self.events
    }
}
