//! FS20 switch frames.
//!
//! Received frames (SlowRF mode with RSSI reporting):
//! ```text
//! ┌───┬────────────┬─────────┬─────────┬────────────────┬──────────┐
//! │ F │ housecode  │ address │ command │ ext (cmd&0x20) │ rssi     │
//! │   │ 4 hex      │ 2 hex   │ 2 hex   │ 2 hex, opt.    │ 2 hex    │
//! └───┴────────────┴─────────┴─────────┴────────────────┴──────────┘
//! ```

use serde_json::Value;

use crate::types::Envelope;

/// Protocol id of FS20 devices.
pub const PROTOCOL_ID: &str = "FS20";

/// Leading marker of FS20 frames, also used to send.
pub const FRAME_MARKER: u8 = b'F';

const EXTENSION_FLAG: u8 = 0x20;

const DIM_LEVELS: [&str; 16] = [
    "dim06%", "dim12%", "dim18%", "dim25%", "dim31%", "dim37%", "dim43%", "dim50%", "dim56%",
    "dim62%", "dim68%", "dim75%", "dim81%", "dim87%", "dim93%", "dim100%",
];

const COMMANDS: [&str; 15] = [
    "on",
    "toggle",
    "dimup",
    "dimdown",
    "dimupdown",
    "timer",
    "sendstate",
    "off-for-timer",
    "on-for-timer",
    "on-old-for-timer",
    "reset",
    "ramp-on-time",
    "ramp-off-time",
    "on-old-for-timer-prev",
    "on-100-for-timer-prev",
];

/// Returns the command name for a code, ignoring the extension flag.
#[must_use]
pub fn command_name(code: u8) -> Option<&'static str> {
    match code & !EXTENSION_FLAG {
        0x00 => Some("off"),
        c @ 0x01..=0x10 => Some(DIM_LEVELS[usize::from(c - 1)]),
        c @ 0x11..=0x1f => Some(COMMANDS[usize::from(c - 0x11)]),
        _ => None,
    }
}

/// Returns the code for a command name or a two-digit hex code.
#[must_use]
pub fn command_code(command: &str) -> Option<u8> {
    if command == "off" {
        return Some(0x00);
    }
    if let Some(i) = DIM_LEVELS.iter().position(|&name| name == command) {
        return Some(i as u8 + 1);
    }
    if let Some(i) = COMMANDS.iter().position(|&name| name == command) {
        return Some(i as u8 + 0x11);
    }
    if command.len() == 2 {
        let mut code = [0u8; 1];
        hex::decode_to_slice(command, &mut code).ok()?;
        return Some(code[0]);
    }
    None
}

/// Converts the transceiver's raw RSSI byte to dBm.
#[must_use]
pub fn rssi_dbm(raw: u8) -> f64 {
    let raw = f64::from(raw);
    if raw >= 128.0 {
        (raw - 256.0) / 2.0 - 74.0
    } else {
        raw / 2.0 - 74.0
    }
}

/// Parses an FS20 frame into the transport's envelope.
#[must_use]
pub fn parse(raw: &[u8]) -> Option<Envelope> {
    if raw.first() != Some(&FRAME_MARKER) || raw.len() < 9 {
        return None;
    }
    let text = std::str::from_utf8(&raw[1..]).ok()?;
    let digits = hex::decode(text.get(..text.len() & !1)?).ok()?;

    let code = digits[3];
    let mut rest = &digits[4..];
    let extension = if code & EXTENSION_FLAG == 0 {
        None
    } else {
        let (&ext, tail) = rest.split_first()?;
        rest = tail;
        Some(ext)
    };

    let mut envelope = Envelope {
        protocol: Some(PROTOCOL_ID.to_string()),
        address: Some(hex::encode_upper(&digits[..3])),
        device: Some(PROTOCOL_ID.to_string()),
        rssi: rest.first().copied().map(rssi_dbm),
        ..Envelope::default()
    };
    envelope.data.insert(
        "cmd".into(),
        command_name(code).map_or(Value::Null, Value::from),
    );
    envelope
        .data
        .insert("cmdRaw".into(), Value::from(format!("{code:02X}")));
    if let Some(ext) = extension {
        envelope
            .data
            .insert("ext".into(), Value::from(format!("{ext:02X}")));
    }
    Some(envelope)
}
