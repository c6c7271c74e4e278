//! Protocol definitions for the transceiver's line protocol.
//!
//! This module contains:
//! - Line framing of the byte stream
//! - Weather sensor frame decoding and the psychrometric formulas it uses
//! - FS20 frame parsing and outbound command encoding

pub mod command;
pub mod fs20;
pub mod line;
pub mod psychro;
pub mod weather;

pub use command::{DeviceCommand, Mode, RawCommand};
pub use line::{LineDecoder, MAX_LINE_LENGTH, encode as encode_line};
pub use weather::decode as decode_frame;

use crate::types::Envelope;

/// Parses the transport's own envelope for a received line.
///
/// Lines of unknown classes yield an empty envelope.
#[must_use]
pub fn parse_envelope(raw: &[u8]) -> Envelope {
    fs20::parse(raw).unwrap_or_default()
}
