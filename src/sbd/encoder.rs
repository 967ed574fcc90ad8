//! # SBD Message Encoder
//!
//! Encodes caller-supplied field values into a framed binary message.

use std::fmt;

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, Timelike};
use tracing::{debug, warn};

use super::checksum::Checksum;
use super::protocol::*;
use super::registry::{self, FieldSpec};
use super::value::FieldValue;
use crate::error::{AgtError, Result};

/// Non-fatal finding produced while building a message
#[derive(Debug)]
pub enum Diagnostic {
    /// The field was dropped from the output
    Rejected(AgtError),

    /// The message was emitted but may not behave as intended
    Advisory(String),
}

impl Diagnostic {
    /// The rejected field error, if this diagnostic dropped a field
    pub fn as_error(&self) -> Option<&AgtError> {
        match self {
            Diagnostic::Rejected(err) => Some(err),
            Diagnostic::Advisory(_) => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Rejected(err) => write!(f, "Error: {}", err),
            Diagnostic::Advisory(text) => write!(f, "Warning: {}", text),
        }
    }
}

/// A finished message plus everything reported while building it
#[derive(Debug)]
pub struct EncodedMessage {
    /// STX, fields, ETX and the two checksum bytes
    pub bytes: Vec<u8>,

    pub diagnostics: Vec<Diagnostic>,
}

impl EncodedMessage {
    /// Lower-case hex rendering of the message bytes
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Errors for fields that were dropped
    pub fn rejected(&self) -> impl Iterator<Item = &AgtError> {
        self.diagnostics.iter().filter_map(Diagnostic::as_error)
    }

    /// True when nothing was dropped or flagged
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Message encoder
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    /// Size above which an advisory is raised
    message_limit: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            message_limit: MT_MESSAGE_LIMIT,
        }
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the message size that triggers an advisory
    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit;
        self
    }

    /// Encode fields in the given order into a complete message
    ///
    /// Invalid fields are dropped and reported in
    /// [`EncodedMessage::diagnostics`]; the remaining fields are still
    /// emitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use agt_codec::sbd::encoder::Encoder;
    /// use agt_codec::sbd::protocol::FieldId;
    /// use agt_codec::sbd::value::FieldValue;
    ///
    /// let message = Encoder::new().encode(&[(FieldId::Flags1, FieldValue::Int(0x20))]);
    /// assert_eq!(message.to_hex(), "0231200356de");
    /// ```
    pub fn encode(&self, fields: &[(FieldId, FieldValue)]) -> EncodedMessage {
        let mut out = BytesMut::with_capacity(MIN_MESSAGE_LEN + fields.len() * 5);
        let mut diagnostics = Vec::new();

        out.put_u8(STX);

        for (id, value) in fields {
            match encode_field(*id, value) {
                Ok(field_bytes) => {
                    debug!("Encoded {} ({} bytes)", id, field_bytes.len());
                    out.put_slice(&field_bytes);
                }
                Err(e) => {
                    warn!("Skipping field {}: {}", id, e);
                    diagnostics.push(Diagnostic::Rejected(e));
                }
            }
        }

        out.put_u8(ETX);

        let checksum = Checksum::compute(&out);
        out.put_slice(&checksum.to_bytes());

        if out.len() > self.message_limit {
            let text = format!(
                "message is {} bytes, exceeding the {} byte limit",
                out.len(),
                self.message_limit
            );
            warn!("{}", text);
            diagnostics.push(Diagnostic::Advisory(text));
        }

        EncodedMessage {
            bytes: out.to_vec(),
            diagnostics,
        }
    }
}

/// Encode fields with the default MT size limit
pub fn encode_message(fields: &[(FieldId, FieldValue)]) -> EncodedMessage {
    Encoder::default().encode(fields)
}

/// Encode a single field: ID byte followed by its payload
///
/// # Errors
///
/// Returns `InvalidFieldValue` if the value does not suit the field's
/// type, fails its range rule, or if `id` is STX/ETX
pub fn encode_field(id: FieldId, value: &FieldValue) -> Result<Vec<u8>> {
    if id.is_framing() {
        return Err(AgtError::invalid(id.name(), "framing markers are added by the encoder"));
    }

    let spec = registry::spec_of(id);
    let mut out = BytesMut::with_capacity(1 + spec.field_type.width());
    out.put_u8(id.id());
    encode_payload(spec, value, &mut out)?;

    Ok(out.to_vec())
}

fn encode_payload(spec: &FieldSpec, value: &FieldValue, out: &mut BytesMut) -> Result<()> {
    match spec.field_type {
        FieldType::Marker => match value {
            FieldValue::Marker => Ok(()),
            other => Err(AgtError::invalid(
                spec.name,
                format!("takes no value, got {}", other.kind()),
            )),
        },
        FieldType::Scalar { width, signed, float } => {
            let number = scalar_input(spec, value)?;
            if float {
                put_float(spec, number, out)
            } else {
                let raw = to_raw_integer(spec, value, number)?;
                put_integer(spec, raw, width, signed, out)
            }
        }
        FieldType::FixedArray { element_width, count } => {
            put_array(spec, value, element_width, count as usize, out)
        }
        FieldType::DateTimeRecord => put_date_time(spec, value, out),
    }
}

/// Validate a scalar input in human units
fn scalar_input(spec: &FieldSpec, value: &FieldValue) -> Result<f64> {
    let number = value.as_f64().ok_or_else(|| {
        AgtError::invalid(spec.name, format!("expects a number, got {}", value.kind()))
    })?;

    if !number.is_finite() {
        return Err(AgtError::invalid(spec.name, "value is not finite"));
    }

    spec.rule
        .check(number)
        .map_err(|reason| AgtError::invalid(spec.name, reason))?;

    Ok(number)
}

/// Round half-up to the nearest integer
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Convert a human-unit value to the raw wire integer
fn to_raw_integer(spec: &FieldSpec, value: &FieldValue, number: f64) -> Result<i64> {
    let raw = match (spec.per_unit(), value) {
        (Some(per_unit), _) => round_half_up(number * per_unit),
        (None, FieldValue::Int(v)) => return check_bounds(spec, *v),
        (None, _) => {
            if number.fract() != 0.0 {
                return Err(AgtError::invalid(
                    spec.name,
                    format!("{} is not a whole number", number),
                ));
            }
            number
        }
    };

    if raw < i64::MIN as f64 || raw > i64::MAX as f64 {
        return Err(AgtError::invalid(spec.name, format!("{} does not fit the field", number)));
    }

    check_bounds(spec, raw as i64)
}

fn check_bounds(spec: &FieldSpec, raw: i64) -> Result<i64> {
    if let Some((min, max)) = spec.field_type.integer_bounds() {
        if raw < min || raw > max {
            return Err(AgtError::invalid(
                spec.name,
                format!("raw value {} is outside {}..={}", raw, min, max),
            ));
        }
    }

    Ok(raw)
}

fn put_integer(spec: &FieldSpec, raw: i64, width: u8, signed: bool, out: &mut BytesMut) -> Result<()> {
    match (width, signed) {
        (1, false) => out.put_u8(raw as u8),
        (1, true) => out.put_i8(raw as i8),
        (2, false) => out.put_u16_le(raw as u16),
        (2, true) => out.put_i16_le(raw as i16),
        (4, false) => out.put_u32_le(raw as u32),
        (4, true) => out.put_i32_le(raw as i32),
        _ => {
            return Err(AgtError::invalid(
                spec.name,
                format!("unsupported scalar width {}", width),
            ))
        }
    }

    Ok(())
}

fn put_float(spec: &FieldSpec, number: f64, out: &mut BytesMut) -> Result<()> {
    let number = match spec.per_unit() {
        Some(per_unit) => number * per_unit,
        None => number,
    };

    if number.abs() > f32::MAX as f64 {
        return Err(AgtError::invalid(spec.name, format!("{} does not fit a float32", number)));
    }

    out.put_f32_le(number as f32);
    Ok(())
}

fn put_array(
    spec: &FieldSpec,
    value: &FieldValue,
    element_width: u8,
    count: usize,
    out: &mut BytesMut,
) -> Result<()> {
    let elements: Vec<u64> = match value {
        FieldValue::Array(words) => words.clone(),
        FieldValue::Bytes(bytes) if element_width == 1 => bytes.iter().map(|&b| b as u64).collect(),
        other => {
            return Err(AgtError::invalid(
                spec.name,
                format!("expects an array, got {}", other.kind()),
            ))
        }
    };

    if elements.len() != count {
        return Err(AgtError::invalid(
            spec.name,
            format!("expects {} elements, got {}", count, elements.len()),
        ));
    }

    let max = match element_width {
        1 => u8::MAX as u64,
        2 => u16::MAX as u64,
        4 => u32::MAX as u64,
        _ => {
            return Err(AgtError::invalid(
                spec.name,
                format!("unsupported element width {}", element_width),
            ))
        }
    };

    if let Some(bad) = elements.iter().find(|&&e| e > max) {
        return Err(AgtError::invalid(
            spec.name,
            format!("element {} exceeds {}", bad, max),
        ));
    }

    for element in elements {
        match element_width {
            1 => out.put_u8(element as u8),
            2 => out.put_u16_le(element as u16),
            _ => out.put_u32_le(element as u32),
        }
    }

    Ok(())
}

fn put_date_time(spec: &FieldSpec, value: &FieldValue, out: &mut BytesMut) -> Result<()> {
    let FieldValue::DateTime(stamp) = value else {
        return Err(AgtError::invalid(
            spec.name,
            format!("expects a date-time, got {}", value.kind()),
        ));
    };

    let year = u16::try_from(stamp.year())
        .map_err(|_| AgtError::invalid(spec.name, format!("year {} does not fit", stamp.year())))?;

    out.put_u16_le(year);
    out.put_u8(stamp.month() as u8);
    out.put_u8(stamp.day() as u8);
    out.put_u8(stamp.hour() as u8);
    out.put_u8(stamp.minute() as u8);
    out.put_u8(stamp.second() as u8);

    Ok(())
}
