//! Byte stream transports for sevents.
//!
//! The framing layer only needs two things from a transport: chunks of bytes
//! delivered in arrival order, and an ordered sink for outgoing bytes.
//! [`EventStream`] wraps the concrete kinds of stream a process usually has
//! at hand and records which directions each one supports:
//! - Unix domain sockets and TCP sockets (read + write)
//! - Child process pipes (stdin is write-only, stdout is read-only)
//! - The current process's own stdin/stdout

pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::EventStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
