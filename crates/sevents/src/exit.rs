use std::fmt;
use std::io;

use sevents_frame::FrameError;
use sevents_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidName { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::Framing { .. }
        | FrameError::MalformedBody { .. }
        | FrameError::FrameTooLarge { .. }
        | FrameError::Serialize(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::NotReadable { .. } | FrameError::NotWritable { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_to_exit_codes() {
        let framing = FrameError::Framing {
            reason: "bad length".into(),
        };
        assert_eq!(frame_error("read", framing).code, DATA_INVALID);
        assert_eq!(
            frame_error("send", FrameError::InvalidName { name: "a;b".into() }).code,
            USAGE
        );
        assert_eq!(
            frame_error("read", FrameError::ConnectionClosed).code,
            FAILURE
        );
        assert_eq!(
            frame_error("read", FrameError::NotReadable { kind: "stdout" }).code,
            TRANSPORT_ERROR
        );
    }

    #[test]
    fn io_errors_map_by_kind() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(io_error("bind", denied).code, PERMISSION_DENIED);

        let timed_out = FrameError::Io(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(frame_error("read", timed_out).code, TIMEOUT);
    }

    #[test]
    fn message_includes_context() {
        let err = transport_error(
            "connect failed",
            TransportError::NotWritable { kind: "stdin" },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.to_string().starts_with("connect failed: "));
    }
}
