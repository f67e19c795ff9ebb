use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use crate::error::{FrameError, Result};

/// Delimiter after the length, after the name, and after the body.
pub const SEPARATOR: u8 = b';';

/// Default maximum declared frame length: 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Longest accepted length field, in digits.
pub const MAX_LENGTH_DIGITS: usize = 20;

/// Default bytes requested per transport read: 8 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// One event as it travels on the wire: a name and an optional
/// already-serialized body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The event name.
    pub name: String,
    /// The serialized body, without its trailing separator.
    pub body: Option<Bytes>,
}

impl Frame {
    /// Create a frame from a name and raw body bytes.
    pub fn new(name: impl Into<String>, body: Option<Bytes>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Create a frame by serializing `body` as JSON.
    pub fn from_event<T: Serialize + ?Sized>(name: &str, body: Option<&T>) -> Result<Self> {
        validate_name(name)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(FrameError::Serialize)?;
        Ok(Self::new(name, body.map(Bytes::from)))
    }

    /// The value written in the length field.
    pub fn declared_len(&self) -> usize {
        declared_len(self.name.len(), self.body.as_ref().map(Bytes::len))
    }

    /// The total wire size of this frame (length field + separators + contents).
    pub fn wire_size(&self) -> usize {
        let len = self.declared_len();
        len.to_string().len() + 1 + len
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// <decimal length>;<name>;[<body>;]
/// ```
///
/// The length counts bytes, not characters: everything after the length's
/// separator up to and including the final separator.
pub fn encode_frame(name: &str, body: Option<&[u8]>, dst: &mut BytesMut) -> Result<()> {
    validate_name(name)?;
    let len = declared_len(name.len(), body.map(<[u8]>::len));
    let digits = len.to_string();

    dst.reserve(digits.len() + 1 + len);
    dst.put_slice(digits.as_bytes());
    dst.put_u8(SEPARATOR);
    dst.put_slice(name.as_bytes());
    dst.put_u8(SEPARATOR);
    if let Some(body) = body {
        dst.put_slice(body);
        dst.put_u8(SEPARATOR);
    }
    Ok(())
}

/// Serialize `body` as JSON and encode the resulting frame.
pub fn encode_event<T: Serialize + ?Sized>(
    name: &str,
    body: Option<&T>,
    dst: &mut BytesMut,
) -> Result<()> {
    validate_name(name)?;
    let json = body
        .map(serde_json::to_vec)
        .transpose()
        .map_err(FrameError::Serialize)?;
    encode_frame(name, json.as_deref(), dst)
}

/// Encode one event into a fresh buffer.
///
/// `encode("foo", None)` is `4;foo;` and `encode("foo", Some(&json!({})))`
/// is `7;foo;{};`.
pub fn encode(name: &str, body: Option<&Value>) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_event(name, body, &mut dst)?;
    Ok(dst.freeze())
}

/// Reject names that are empty or contain the separator.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.as_bytes().contains(&SEPARATOR) {
        return Err(FrameError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn declared_len(name_len: usize, body_len: Option<usize>) -> usize {
    name_len + 1 + body_len.map_or(0, |len| len + 1)
}

/// Configuration for framing and stream adapters.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted declared frame length. Default: 16 MiB.
    pub max_frame_len: usize,
    /// Bytes requested from the transport per read. Default: 8 KiB.
    pub read_chunk_size: usize,
    /// Read timeout for socket transports.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for socket transports.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
