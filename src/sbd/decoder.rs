//! # SBD Message Decoder
//!
//! Parses a framed binary message back into named field values.
//!
//! Decoding is all-or-nothing: any framing, registry, length or checksum
//! failure rejects the whole buffer.

use bytes::Buf;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use super::checksum::Checksum;
use super::protocol::*;
use super::registry::{self, FieldSpec};
use super::value::{DecodedMessage, DecodedValue};
use crate::error::{AgtError, Result};

/// Decode a complete message
///
/// # Arguments
///
/// * `data` - Message bytes, optionally prefixed by the 5-byte gateway header
///
/// # Returns
///
/// * `Result<DecodedMessage>` - Fields in transmission order
///
/// # Errors
///
/// Returns error if:
/// - The buffer is empty or shorter than the framing (`TruncatedMessage`)
/// - STX is missing, or appears inside the body (`MalformedMessage`)
/// - A field ID is not registered (`UnknownField`)
/// - A payload or the checksum runs past the end (`TruncatedMessage`)
/// - The checksum does not match (`ChecksumMismatch`)
///
/// # Examples
///
/// ```
/// use agt_codec::sbd::decoder::decode_message;
/// use agt_codec::sbd::value::DecodedValue;
///
/// let message = decode_message(&[0x02, 0x31, 0x20, 0x03, 0x56, 0xDE]).unwrap();
/// assert_eq!(message.get_by_name("FLAGS1"), Some(&DecodedValue::Unsigned(0x20)));
/// ```
pub fn decode_message(data: &[u8]) -> Result<DecodedMessage> {
    let start = frame_start(data)?;

    // Skip STX
    let mut cursor = &data[start + 1..];
    let mut message = DecodedMessage::new();

    loop {
        let offset = data.len() - cursor.remaining();
        if !cursor.has_remaining() {
            return Err(AgtError::TruncatedMessage {
                context: "ETX".to_string(),
                offset,
                needed: 1,
                available: 0,
            });
        }

        let id = cursor.get_u8();
        if id == ETX {
            break;
        }
        if id == STX {
            return Err(AgtError::MalformedMessage(format!(
                "STX inside message body at offset {}",
                offset
            )));
        }

        let spec = registry::lookup(id).ok_or(AgtError::UnknownField(id))?;
        let width = spec.field_type.width();
        if cursor.remaining() < width {
            return Err(AgtError::TruncatedMessage {
                context: spec.name.to_string(),
                offset: offset + 1,
                needed: width,
                available: cursor.remaining(),
            });
        }

        let value = read_value(spec, &mut cursor)?;
        debug!("Decoded {} = {:?}", spec.name, value);

        if let Some(previous) = message.insert(spec.id, value) {
            debug!("Duplicate {} replaces earlier value {:?}", spec.name, previous);
        }
    }

    let etx_end = data.len() - cursor.remaining();
    if cursor.remaining() < CHECKSUM_LEN {
        return Err(AgtError::TruncatedMessage {
            context: "checksum".to_string(),
            offset: etx_end,
            needed: CHECKSUM_LEN,
            available: cursor.remaining(),
        });
    }

    let received = [cursor.get_u8(), cursor.get_u8()];
    Checksum::compute(&data[start..etx_end]).verify(received)?;

    if cursor.has_remaining() {
        debug!("Ignoring {} bytes after the checksum", cursor.remaining());
    }

    Ok(message)
}

/// Decode a message given as a hex string
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns `Hex` if the text is not valid hex, otherwise as
/// [`decode_message`]
pub fn decode_hex(text: &str) -> Result<DecodedMessage> {
    let data = hex::decode(text.trim())?;
    decode_message(&data)
}

/// Locate STX, skipping the gateway header when the buffer does not start
/// with it
fn frame_start(data: &[u8]) -> Result<usize> {
    let Some(&first) = data.first() else {
        return Err(AgtError::TruncatedMessage {
            context: "message header".to_string(),
            offset: 0,
            needed: MIN_MESSAGE_LEN,
            available: 0,
        });
    };

    let start = if first == STX { 0 } else { GATEWAY_HEADER_LEN };

    if data.len() < start + MIN_MESSAGE_LEN {
        return Err(AgtError::TruncatedMessage {
            context: "message header".to_string(),
            offset: 0,
            needed: start + MIN_MESSAGE_LEN,
            available: data.len(),
        });
    }

    if data[start] != STX {
        return Err(AgtError::MalformedMessage(format!(
            "expected STX at offset {}, found 0x{:02X}",
            start, data[start]
        )));
    }

    if start > 0 {
        debug!("Skipping {} byte gateway header", start);
    }

    Ok(start)
}

/// Read one payload; the caller has checked that enough bytes remain
fn read_value(spec: &FieldSpec, cursor: &mut &[u8]) -> Result<DecodedValue> {
    let value = match spec.field_type {
        FieldType::Marker => DecodedValue::Present(true),
        FieldType::Scalar { float: true, .. } => {
            let raw = cursor.get_f32_le() as f64;
            match spec.per_unit() {
                Some(per_unit) => DecodedValue::Float(raw / per_unit),
                None => DecodedValue::Float(raw),
            }
        }
        FieldType::Scalar { width, signed, .. } => {
            let raw = read_integer(cursor, width, signed);
            match spec.per_unit() {
                Some(per_unit) => DecodedValue::Float(raw as f64 / per_unit),
                None if signed => DecodedValue::Signed(raw),
                None => DecodedValue::Unsigned(raw as u64),
            }
        }
        FieldType::FixedArray { element_width: 1, count } => {
            let mut bytes = vec![0u8; count as usize];
            cursor.copy_to_slice(&mut bytes);
            DecodedValue::Bytes(bytes)
        }
        FieldType::FixedArray { element_width, count } => {
            let words = (0..count)
                .map(|_| read_integer(cursor, element_width, false) as u64)
                .collect();
            DecodedValue::Array(words)
        }
        FieldType::DateTimeRecord => DecodedValue::DateTime(read_date_time(cursor)?),
    };

    Ok(value)
}

fn read_integer(cursor: &mut &[u8], width: u8, signed: bool) -> i64 {
    match (width, signed) {
        (1, false) => cursor.get_u8() as i64,
        (1, true) => cursor.get_i8() as i64,
        (2, false) => cursor.get_u16_le() as i64,
        (2, true) => cursor.get_i16_le() as i64,
        (4, true) => cursor.get_i32_le() as i64,
        _ => cursor.get_u32_le() as i64,
    }
}

fn read_date_time(cursor: &mut &[u8]) -> Result<NaiveDateTime> {
    let year = cursor.get_u16_le();
    let month = cursor.get_u8();
    let day = cursor.get_u8();
    let hour = cursor.get_u8();
    let minute = cursor.get_u8();
    let second = cursor.get_u8();

    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| {
            AgtError::MalformedMessage(format!(
                "invalid DATETIME {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ))
        })
}
