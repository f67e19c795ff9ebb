use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{Frame, DEFAULT_MAX_FRAME_LEN, MAX_LENGTH_DIGITS, SEPARATOR};
use crate::error::{FrameError, Result};

/// Parsing state between chunks.
///
/// `remaining` always counts the bytes of the current frame that have not
/// been consumed yet, including the trailing separator.
#[derive(Debug)]
enum State {
    /// Scanning for the separator that ends the length field.
    Length,
    /// Length known, scanning for the separator that ends the name.
    Name { remaining: usize },
    /// Name known, waiting for `remaining` more bytes of body.
    Body { name: String, remaining: usize },
    /// A framing error occurred; the stream cannot be resynchronized.
    Failed,
}

/// Incremental frame parser.
///
/// Accepts chunks of any size and alignment and emits each complete
/// [`Frame`] in stream order. A length field, a name, or a body may be
/// split anywhere across chunks, including inside a multi-byte character:
/// partial units are kept as raw bytes until they are complete.
#[derive(Debug)]
pub struct FrameParser {
    state: State,
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            state: State::Length,
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Consume one chunk, calling `on_frame` for every frame it completes.
    ///
    /// Frames completed before a framing error are still emitted. After an
    /// error the parser stays failed and rejects every later chunk.
    pub fn push<F>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<()>
    where
        F: FnMut(Frame),
    {
        if matches!(self.state, State::Failed) {
            return Err(FrameError::framing("stream already failed to parse"));
        }

        let mut pos = 0usize;
        while pos < chunk.len() {
            let rest = &chunk[pos..];
            // Left as `Failed` if any step below returns an error.
            let state = std::mem::replace(&mut self.state, State::Failed);

            match state {
                State::Length => {
                    let Some(sep) = find_separator(rest) else {
                        self.accumulate(rest, MAX_LENGTH_DIGITS, "length field too long")?;
                        self.state = State::Length;
                        return Ok(());
                    };
                    self.buf.extend_from_slice(&rest[..sep]);
                    let len = parse_length(&self.buf, self.max_frame_len);
                    self.buf.clear();
                    pos += sep + 1;
                    let len = len?;
                    self.state = State::Name { remaining: len };
                }

                State::Name { remaining } => {
                    let Some(sep) = find_separator(rest) else {
                        // The name and its separator must fit inside the declared length.
                        self.accumulate(rest, remaining - 1, "name longer than frame")?;
                        self.state = State::Name { remaining };
                        return Ok(());
                    };
                    self.buf.extend_from_slice(&rest[..sep]);
                    let name_len = self.buf.len();
                    let remaining = remaining.checked_sub(name_len + 1).ok_or_else(|| {
                        FrameError::framing(format!(
                            "declared length {remaining} shorter than name ({name_len} bytes)"
                        ))
                    })?;
                    let name = String::from_utf8_lossy(&self.buf).into_owned();
                    self.buf.clear();
                    pos += sep + 1;

                    if remaining == 0 {
                        trace!(event = %name, "decoded bodyless frame");
                        self.state = State::Length;
                        on_frame(Frame::new(name, None));
                    } else {
                        self.state = State::Body { name, remaining };
                    }
                }

                State::Body { name, remaining } => {
                    let left = rest.len();
                    if remaining > left {
                        self.buf.extend_from_slice(rest);
                        self.state = State::Body {
                            name,
                            remaining: remaining - left,
                        };
                        return Ok(());
                    }

                    // The last byte of the window is the trailing separator.
                    let tail = &rest[..remaining - 1];
                    let body = if self.buf.is_empty() {
                        Bytes::copy_from_slice(tail)
                    } else {
                        self.buf.extend_from_slice(tail);
                        self.buf.split().freeze()
                    };
                    pos += remaining;

                    trace!(event = %name, size = body.len(), "decoded frame");
                    self.state = State::Length;
                    on_frame(Frame::new(name, Some(body)));
                }

                State::Failed => {
                    return Err(FrameError::framing("stream already failed to parse"));
                }
            }
        }

        Ok(())
    }

    /// Whether the parser sits exactly between two frames.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Length) && self.buf.is_empty()
    }

    /// Whether a framing error has stopped this parser.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// Drop any partial frame and start over at a frame boundary.
    pub fn reset(&mut self) {
        self.state = State::Length;
        self.buf.clear();
    }

    fn accumulate(&mut self, bytes: &[u8], limit: usize, reason: &str) -> Result<()> {
        if self.buf.len() + bytes.len() > limit {
            self.buf.clear();
            return Err(FrameError::framing(reason));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_separator(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == SEPARATOR)
}

fn parse_length(field: &[u8], max_frame_len: usize) -> Result<usize> {
    let parsed = if !field.is_empty() && field.iter().all(u8::is_ascii_digit) {
        std::str::from_utf8(field)
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok())
    } else {
        None
    };
    let len = parsed.ok_or_else(|| {
        FrameError::framing(format!(
            "invalid length field {:?}",
            String::from_utf8_lossy(field)
        ))
    })?;

    if len == 0 {
        return Err(FrameError::framing("declared length is zero"));
    }
    if len > max_frame_len {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: max_frame_len,
        });
    }
    Ok(len)
}
