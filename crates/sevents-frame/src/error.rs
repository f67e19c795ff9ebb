use sevents_transport::TransportError;

/// Errors that can occur while encoding, decoding or transporting events.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Event names must be non-empty and must not contain the separator.
    #[error("invalid event name: {name:?}")]
    InvalidName { name: String },

    /// The byte stream does not follow the framing rules. Decoding cannot
    /// continue on this stream.
    #[error("framing error: {reason}")]
    Framing { reason: String },

    /// A frame was delimited correctly but its body is not valid JSON.
    #[error("malformed body for event {name:?}: {source}")]
    MalformedBody {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The declared frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The event body could not be serialized.
    #[error("failed to serialize event body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The transport cannot deliver incoming bytes.
    #[error("{kind} transport is not readable")]
    NotReadable { kind: &'static str },

    /// The transport cannot accept outgoing bytes.
    #[error("{kind} transport is not writable")]
    NotWritable { kind: &'static str },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    pub(crate) fn framing(reason: impl Into<String>) -> Self {
        Self::Framing {
            reason: reason.into(),
        }
    }
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotReadable { kind } => Self::NotReadable { kind },
            TransportError::NotWritable { kind } => Self::NotWritable { kind },
            TransportError::Io(io) | TransportError::Accept(io) => Self::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                Self::Io(source)
            }
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
