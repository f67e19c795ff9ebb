//! Named events with JSON bodies over any byte stream.
//!
//! sevents turns a duplex byte stream (a socket, a pipe, stdio) into an
//! event channel: one side calls `send(name, body)`, the other registers
//! listeners by name or for every event.
//!
//! ```no_run
//! use std::os::unix::net::UnixStream;
//!
//! use sevents::transport::EventStream;
//!
//! let (a, b) = UnixStream::pair()?;
//! let mut send = sevents::writer(EventStream::from(a))?;
//! let receive = sevents::reader(EventStream::from(b), None)?;
//!
//! receive
//!     .events()
//!     .on("b:ok", |body| println!("ok: {:?}", body.as_value()))?;
//! let handle = receive.spawn()?;
//!
//! send.send("b:ok", Some(&200))?;
//! drop(send);
//! handle.join()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`transport`]: the byte streams events travel over
//! - [`registry`]: listener registration and synchronous emit
//! - [`frame`]: the wire format, incremental decoder and stream adapters

/// Re-export transport types.
pub mod transport {
    pub use sevents_transport::*;
}

/// Re-export registry types.
pub mod registry {
    pub use sevents_registry::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sevents_frame::*;
}

pub use sevents_frame::{decoder, encode, reader, writer, FrameError};
pub use sevents_registry::{Event, EventKey, Events, ListenerId, Payload};
