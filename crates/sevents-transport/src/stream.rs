use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::process::{ChildStdin, ChildStdout};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A byte stream an event reader or writer can be bound to.
///
/// Socket variants are duplex. Pipe and stdio variants carry a single
/// direction; reading from a write-only stream (or the reverse) fails with
/// `ErrorKind::Unsupported`, and [`EventStream::ensure_readable`] /
/// [`EventStream::ensure_writable`] report the mismatch up front.
pub enum EventStream {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
    ChildStdin(ChildStdin),
    ChildStdout(ChildStdout),
    Stdin(std::io::Stdin),
    Stdout(std::io::Stdout),
}

impl EventStream {
    /// The current process's standard input (read-only).
    pub fn stdin() -> Self {
        Self::Stdin(std::io::stdin())
    }

    /// The current process's standard output (write-only).
    pub fn stdout() -> Self {
        Self::Stdout(std::io::stdout())
    }

    /// Short name of the stream kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            Self::Unix(_) => "unix",
            Self::Tcp(_) => "tcp",
            Self::ChildStdin(_) => "child-stdin",
            Self::ChildStdout(_) => "child-stdout",
            Self::Stdin(_) => "stdin",
            Self::Stdout(_) => "stdout",
        }
    }

    /// Whether this stream delivers incoming bytes.
    pub fn is_readable(&self) -> bool {
        match self {
            #[cfg(unix)]
            Self::Unix(_) => true,
            Self::Tcp(_) | Self::ChildStdout(_) | Self::Stdin(_) => true,
            Self::ChildStdin(_) | Self::Stdout(_) => false,
        }
    }

    /// Whether this stream accepts outgoing bytes.
    pub fn is_writable(&self) -> bool {
        match self {
            #[cfg(unix)]
            Self::Unix(_) => true,
            Self::Tcp(_) | Self::ChildStdin(_) | Self::Stdout(_) => true,
            Self::ChildStdout(_) | Self::Stdin(_) => false,
        }
    }

    /// Fail with [`TransportError::NotReadable`] unless the stream can be read.
    pub fn ensure_readable(&self) -> Result<()> {
        if self.is_readable() {
            Ok(())
        } else {
            Err(TransportError::NotReadable { kind: self.kind() })
        }
    }

    /// Fail with [`TransportError::NotWritable`] unless the stream can be written.
    pub fn ensure_writable(&self) -> Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(TransportError::NotWritable { kind: self.kind() })
        }
    }

    /// Set read timeout on socket streams. Pipes and stdio ignore it.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            Self::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            _ => Ok(()),
        }
    }

    /// Set write timeout on socket streams. Pipes and stdio ignore it.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            Self::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            _ => Ok(()),
        }
    }

    /// Clone a socket stream so one half can read while the other writes.
    ///
    /// Single-direction streams cannot be cloned and return `Unsupported`.
    pub fn try_clone(&self) -> Result<Self> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => Ok(Self::Unix(stream.try_clone()?)),
            Self::Tcp(stream) => Ok(Self::Tcp(stream.try_clone()?)),
            other => Err(TransportError::Io(std::io::Error::new(
                ErrorKind::Unsupported,
                format!("{} stream cannot be cloned", other.kind()),
            ))),
        }
    }
}

fn unsupported(kind: &str, direction: &str) -> std::io::Error {
    std::io::Error::new(
        ErrorKind::Unsupported,
        format!("{kind} stream does not support {direction}"),
    )
}

impl Read for EventStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
            Self::Tcp(stream) => stream.read(buf),
            Self::ChildStdout(pipe) => pipe.read(buf),
            Self::Stdin(stdin) => stdin.read(buf),
            Self::ChildStdin(_) | Self::Stdout(_) => Err(unsupported(self.kind(), "reading")),
        }
    }
}

impl Write for EventStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
            Self::Tcp(stream) => stream.write(buf),
            Self::ChildStdin(pipe) => pipe.write(buf),
            Self::Stdout(stdout) => stdout.write(buf),
            Self::ChildStdout(_) | Self::Stdin(_) => Err(unsupported(self.kind(), "writing")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
            Self::Tcp(stream) => stream.flush(),
            Self::ChildStdin(pipe) => pipe.flush(),
            Self::Stdout(stdout) => stdout.flush(),
            Self::ChildStdout(_) | Self::Stdin(_) => Ok(()),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for EventStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self::Unix(stream)
    }
}

impl From<TcpStream> for EventStream {
    fn from(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }
}

impl From<ChildStdin> for EventStream {
    fn from(pipe: ChildStdin) -> Self {
        Self::ChildStdin(pipe)
    }
}

impl From<ChildStdout> for EventStream {
    fn from(pipe: ChildStdout) -> Self {
        Self::ChildStdout(pipe)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("type", &self.kind())
            .finish()
    }
}
