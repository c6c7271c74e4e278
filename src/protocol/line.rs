//! Line framing for the transceiver's ASCII protocol.
//!
//! The transceiver reports one message per line:
//! ```text
//! ┌─────────────────────────┬──────────┐
//! │  ASCII message          │  CR? LF  │
//! └─────────────────────────┴──────────┘
//! ```

use bytes::{Buf, Bytes, BytesMut};

use crate::error::FrameError;

/// Maximum line length before the buffer is discarded.
pub const MAX_LINE_LENGTH: usize = 512;

/// Line terminator appended to outgoing messages.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Appends the line terminator to an outgoing message.
#[must_use]
pub fn encode(message: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(message.len() + LINE_TERMINATOR.len());
    buf.extend_from_slice(message);
    buf.extend_from_slice(LINE_TERMINATOR);
    buf.freeze()
}

/// Line decoder that handles partial data.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    /// Creates a new line decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete, non-empty line.
    ///
    /// Returns `Ok(Some(line))` without its terminator, `Ok(None)` if more
    /// data is needed, or an error if the buffer overflowed. On overflow the
    /// buffered bytes are dropped.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        loop {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    return Err(FrameError::TooLong {
                        size,
                        max: MAX_LINE_LENGTH,
                    });
                }
                return Ok(None);
            };

            let mut line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if !line.is_empty() {
                return Ok(Some(line.freeze()));
            }
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
