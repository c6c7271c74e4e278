//! Outbound commands to the transceiver.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{fs20, line};

/// A structured command addressed to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Protocol id (e.g. `FS20`).
    pub protocol: String,
    /// Four hex digit housecode.
    pub housecode: String,
    /// Two hex digit device address.
    pub address: String,
    /// Command name (`on`, `dim50%`) or two hex digit code.
    pub command: String,
}

impl DeviceCommand {
    /// Creates a command.
    #[must_use]
    pub fn new(
        protocol: impl Into<String>,
        housecode: impl Into<String>,
        address: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            housecode: housecode.into(),
            address: address.into(),
            command: command.into(),
        }
    }

    /// Encodes the command as a transceiver line, terminator included.
    pub fn encode(&self) -> Result<Bytes> {
        match self.protocol.as_str() {
            fs20::PROTOCOL_ID => {
                let code = fs20::command_code(&self.command).ok_or_else(|| Error::Unsupported {
                    what: format!("FS20 command {}", self.command),
                })?;
                let message = format!(
                    "{}{}{}{code:02X}",
                    char::from(fs20::FRAME_MARKER),
                    self.housecode.to_ascii_uppercase(),
                    self.address.to_ascii_uppercase()
                );
                Ok(line::encode(message.as_bytes()))
            }
            other => Err(Error::Unsupported {
                what: format!("commands for protocol {other}"),
            }),
        }
    }
}

/// Receive mode of the transceiver, selected once after opening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// 868 MHz SlowRF (FS20, weather sensors).
    #[default]
    #[serde(rename = "SlowRF")]
    SlowRf,
    #[serde(rename = "MORITZ")]
    Moritz,
    AskSin,
}

impl Mode {
    /// Command switching the transceiver into this mode.
    #[must_use]
    pub const fn init_command(self) -> &'static str {
        match self {
            Self::SlowRf => "X21",
            Self::Moritz => "Zr",
            Self::AskSin => "Ar",
        }
    }
}

/// An opaque command forwarded to the transceiver unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommand {
    pub command: String,
}

impl RawCommand {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Encodes the command as a transceiver line, terminator included.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        line::encode(self.command.as_bytes())
    }
}
