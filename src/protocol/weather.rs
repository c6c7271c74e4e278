//! Weather sensor frame decoding (TCM79001 and compatible).
//!
//! Frame layout, as ASCII hex digits after the `s5` marker:
//! ```text
//! offset  0 1 | 2 3     | 4                      | 5 6 7       | 8 9
//!         s 5 | address | bat:1 mode:1 chan:2    | temperature | humidity
//! ```
//! Temperature is in tenths of a degree; when bit 3 of the first digit is
//! set, 2048 is subtracted before scaling. Humidity keeps its low 7 bits.

use serde_json::Value;

use crate::protocol::psychro::{absolute_humidity, dew_point, round1};
use crate::types::Reading;

/// Protocol id of decoded weather readings.
pub const PROTOCOL_ID: &str = "NS_WC";

/// Model tag of decoded weather readings.
pub const DEVICE_KIND: &str = "TCM79001";

/// Leading marker of weather frames.
pub const FRAME_MARKER: &[u8] = b"s5";

/// Minimum frame length covering all used offsets.
pub const MIN_FRAME_LEN: usize = 10;

const SIGN_OFFSET: i32 = 2048;

/// Decodes a raw frame into a reading.
///
/// Returns `None` for frames of other device classes and for frames too short
/// or not hex where fields are read.
#[must_use]
pub fn decode(raw: &[u8]) -> Option<Reading> {
    if !raw.starts_with(FRAME_MARKER) || raw.len() < MIN_FRAME_LEN {
        return None;
    }

    let address = std::str::from_utf8(&raw[2..4]).ok()?;
    if !address.chars().all(|c| c.is_ascii_graphic()) {
        return None;
    }

    let flags = nibble(raw[4])?;
    let battery = (flags & 0x8) >> 3;
    let mode = (flags & 0x4) >> 2;
    let channel = (flags & 0x3) + 1;

    let mut temperature = i32::from(hex_u16(&raw[5..8])? & 0x7fff);
    if nibble(raw[5])? & 0x8 == 0x8 {
        temperature -= SIGN_OFFSET;
    }
    let temperature = f64::from(temperature) / 10.0;

    let humidity = hex_u16(&raw[8..10])? & 0x7f;
    let relative = f64::from(humidity);

    tracing::trace!(
        address,
        battery,
        channel,
        temperature,
        humidity,
        "decoded weather frame"
    );

    Some(
        Reading::new(PROTOCOL_ID, address)
            .kind(DEVICE_KIND)
            .field("battery", battery)
            .field("mode", mode)
            .field("channel", channel)
            .field("temperature", temperature)
            .field("humidity", humidity)
            .field(
                "abs_humidity",
                round1(absolute_humidity(temperature, relative)),
            )
            .field("dewpoint", round1(dew_point(temperature, relative)))
            .field("trivia", Value::from("n.a.")),
    )
}

/// Value of one hex digit.
fn nibble(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).map(|d| d as u8)
}

/// Value of up to four hex digits.
fn hex_u16(digits: &[u8]) -> Option<u16> {
    let mut padded = [b'0'; 4];
    padded[4 - digits.len()..].copy_from_slice(digits);
    let mut bytes = [0u8; 2];
    hex::decode_to_slice(padded, &mut bytes).ok()?;
    Some(u16::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    use super::*;

    fn number(reading: &Reading, field: &str) -> f64 {
        reading.fields[field].as_f64().unwrap()
    }

    #[test]
    fn test_decode_reference_frame() {
        let reading = decode(b"s5E580DB3E01C").unwrap();

        assert_eq!(reading.protocol_id, "NS_WC");
        assert_eq!(reading.device_address, "E5");
        assert_eq!(reading.device_kind.as_deref(), Some("TCM79001"));
        assert_eq!(reading.fields["battery"], json!(1));
        assert_eq!(reading.fields["mode"], json!(0));
        assert_eq!(reading.fields["channel"], json!(1));
        assert_abs_diff_eq!(number(&reading, "temperature"), 21.9, epsilon = 1e-9);
        assert_eq!(reading.fields["humidity"], json!(62));
        assert_abs_diff_eq!(number(&reading, "abs_humidity"), 12.0, epsilon = 1e-9);
        assert_abs_diff_eq!(number(&reading, "dewpoint"), 14.3, epsilon = 1e-9);
        assert_eq!(reading.fields["trivia"], json!("n.a."));
        assert_eq!(reading.fields.len(), 8);
    }

    #[test]
    fn test_decode_is_deterministic() {
        assert_eq!(decode(b"s5A1B0FA5000"), decode(b"s5A1B0FA5000"));
    }

    #[test]
    fn test_flag_nibble() {
        // 0x7: battery 0, mode 1, channel 4
        let reading = decode(b"s51270DB3E").unwrap();
        assert_eq!(reading.fields["battery"], json!(0));
        assert_eq!(reading.fields["mode"], json!(1));
        assert_eq!(reading.fields["channel"], json!(4));
    }

    #[test]
    fn test_temperature_sign_bit() {
        // 0x0FA = 250, sign clear
        let reading = decode(b"s51200FA32").unwrap();
        assert_abs_diff_eq!(number(&reading, "temperature"), 25.0, epsilon = 1e-9);

        // 0x920 = 2336, sign set: (2336 - 2048) / 10
        let reading = decode(b"s512092032").unwrap();
        assert_abs_diff_eq!(number(&reading, "temperature"), 28.8, epsilon = 1e-9);
    }

    #[test]
    fn test_sign_bit_read_from_hex_letter() {
        // 'A' = 0b1010 sets the sign bit: (0xA00 - 2048) / 10
        let reading = decode(b"s512A00032").unwrap();
        assert_abs_diff_eq!(number(&reading, "temperature"), 51.2, epsilon = 1e-9);

        // 'C' = 0b1100: battery 1, mode 1, channel 1
        let reading = decode(b"s51C00FA32").unwrap();
        assert_eq!(reading.fields["battery"], json!(1));
        assert_eq!(reading.fields["mode"], json!(1));
        assert_eq!(reading.fields["channel"], json!(1));
    }

    #[test]
    fn test_humidity_masked_to_seven_bits() {
        // 0xBE & 0x7f = 62
        let reading = decode(b"s512000ABE").unwrap();
        assert_eq!(reading.fields["humidity"], json!(62));
    }

    #[test]
    fn test_unrecognized_marker() {
        assert_eq!(decode(b"x5E580DB3E01C"), None);
        assert_eq!(decode(b"s4E580DB3E01C"), None);
        assert_eq!(decode(b"F12340111"), None);
        assert_eq!(decode(b""), None);
    }

    #[test]
    fn test_truncated_and_malformed() {
        assert_eq!(decode(&b"s5E580DB3E"[..9]), None);
        assert_eq!(decode(b"s5E5G0DB3E01C"), None);
        assert_eq!(decode(b"s5E580DZ3E01C"), None);
    }
}
