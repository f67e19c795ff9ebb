//! Self-delimiting event framing for byte streams.
//!
//! Every event is written as one frame:
//! ```text
//! <decimal length>;<name>;[<body>;]
//! ```
//! - The length counts the bytes after its own separator, up to and
//!   including the final separator
//! - The name must be non-empty and must not contain `;`
//! - The body is optional JSON; a bodyless frame is distinct from `null`
//!
//! The decoder accepts chunks split at any byte offset and dispatches each
//! completed frame to a listener registry. Listener calls are queued and run
//! after the chunk is parsed, exact-name listeners before wildcard ones.

#[cfg(feature = "async")]
pub mod async_io;
pub mod codec;
pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_io::{listen_async, listen_async_with_config, EventCodec};
pub use codec::{
    encode, encode_event, encode_frame, validate_name, Frame, FrameConfig, DEFAULT_MAX_FRAME_LEN,
    DEFAULT_READ_CHUNK_SIZE, MAX_LENGTH_DIGITS, SEPARATOR,
};
pub use decoder::{decoder, EventDecoder};
pub use dispatch::{DispatchQueue, Dispatcher, Task};
pub use error::{FrameError, Result};
pub use parser::FrameParser;
pub use reader::{reader, EventReader, Progress, ReaderHandle};
pub use sevents_registry::{Event, EventKey, Events, ListenerId, Payload};
pub use writer::{writer, EventWriter};
