//! # SBD Protocol Constants and Types
//!
//! Core protocol definitions for the Artemis Global Tracker binary message
//! format: field identifiers, wire types and the flag bits carried in
//! FLAGS1, FLAGS2 and MOFIELDS.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::registry;
use crate::error::{AgtError, Result};

/// Start-of-message marker
pub const STX: u8 = 0x02;

/// End-of-message marker
pub const ETX: u8 = 0x03;

/// Length of the opaque gateway header that may precede STX
pub const GATEWAY_HEADER_LEN: usize = 5;

/// Number of checksum bytes following ETX
pub const CHECKSUM_LEN: usize = 2;

/// Smallest well-formed message: STX + ETX + checksum
pub const MIN_MESSAGE_LEN: usize = 2 + CHECKSUM_LEN;

/// Length limit for a Mobile Originated text message
pub const MO_TEXT_LIMIT: usize = 340;

/// Length limit for a Mobile Terminated message
pub const MT_MESSAGE_LIMIT: usize = 270;

/// Estimated text length added by the gateway header when DEST forwarding is on
pub const DEST_HEADER_TEXT_LEN: usize = 10;

// FLAGS1 bits
pub const FLAGS1_BINARY: u8 = 0x80;
pub const FLAGS1_DEST: u8 = 0x40;
pub const FLAGS1_HIPRESS: u8 = 0x20;
pub const FLAGS1_LOPRESS: u8 = 0x10;
pub const FLAGS1_HITEMP: u8 = 0x08;
pub const FLAGS1_LOTEMP: u8 = 0x04;
pub const FLAGS1_HIHUMID: u8 = 0x02;
pub const FLAGS1_LOHUMID: u8 = 0x01;

// FLAGS2 bits
pub const FLAGS2_GEOFENCE: u8 = 0x80;
pub const FLAGS2_INSIDE: u8 = 0x40;
pub const FLAGS2_LOWBATT: u8 = 0x20;
pub const FLAGS2_RING: u8 = 0x10;

/// Number of 32-bit words in the MOFIELDS bitmask
pub const MOFIELDS_WORDS: usize = 3;

/// Field identifiers used on the wire
///
/// The discriminants are the wire contract with the tracker firmware and
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FieldId {
    Stx = 0x02,
    Etx = 0x03,
    SwVer = 0x04,
    Source = 0x08,
    BattV = 0x09,
    Press = 0x0a,
    Temp = 0x0b,
    Humid = 0x0c,
    Year = 0x0d,
    Month = 0x0e,
    Day = 0x0f,
    Hour = 0x10,
    Min = 0x11,
    Sec = 0x12,
    Millis = 0x13,
    DateTime = 0x14,
    Lat = 0x15,
    Lon = 0x16,
    Alt = 0x17,
    Speed = 0x18,
    Head = 0x19,
    Sats = 0x1a,
    Pdop = 0x1b,
    Fix = 0x1c,
    GeofStat = 0x1d,
    UserVal1 = 0x20,
    UserVal2 = 0x21,
    UserVal3 = 0x22,
    UserVal4 = 0x23,
    UserVal5 = 0x24,
    UserVal6 = 0x25,
    UserVal7 = 0x26,
    UserVal8 = 0x27,
    MoFields = 0x30,
    Flags1 = 0x31,
    Flags2 = 0x32,
    Dest = 0x33,
    HiPress = 0x34,
    LoPress = 0x35,
    HiTemp = 0x36,
    LoTemp = 0x37,
    HiHumid = 0x38,
    LoHumid = 0x39,
    GeofNum = 0x3a,
    Geof1Lat = 0x3b,
    Geof1Lon = 0x3c,
    Geof1Rad = 0x3d,
    Geof2Lat = 0x3e,
    Geof2Lon = 0x3f,
    Geof2Rad = 0x40,
    Geof3Lat = 0x41,
    Geof3Lon = 0x42,
    Geof3Rad = 0x43,
    Geof4Lat = 0x44,
    Geof4Lon = 0x45,
    Geof4Rad = 0x46,
    WakeInt = 0x47,
    AlarmInt = 0x48,
    TxInt = 0x49,
    LowBatt = 0x4a,
    DynModel = 0x4b,
    RbHead = 0x52,
    UserFunc1 = 0x58,
    UserFunc2 = 0x59,
    UserFunc3 = 0x5a,
    UserFunc4 = 0x5b,
    UserFunc5 = 0x5c,
    UserFunc6 = 0x5d,
    UserFunc7 = 0x5e,
    UserFunc8 = 0x5f,
}

impl FieldId {
    /// Wire byte of this field
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Upper-case field name as used by the tracker documentation
    pub fn name(self) -> &'static str {
        registry::spec_of(self).name
    }

    /// True for the STX/ETX framing markers
    pub const fn is_framing(self) -> bool {
        matches!(self, FieldId::Stx | FieldId::Etx)
    }

    /// True for fields the tracker accepts in an MT configuration message
    pub const fn is_configuration(self) -> bool {
        let id = self as u8;
        (id >= 0x30 && id <= 0x4b) || (id >= 0x58 && id <= 0x5f) || id == 0x08
    }
}

impl TryFrom<u8> for FieldId {
    type Error = AgtError;

    fn try_from(value: u8) -> Result<Self> {
        registry::lookup(value)
            .map(|spec| spec.id)
            .ok_or(AgtError::UnknownField(value))
    }
}

impl FromStr for FieldId {
    type Err = AgtError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        registry::fields()
            .find(|spec| spec.name.eq_ignore_ascii_case(wanted))
            .map(|spec| spec.id)
            .ok_or_else(|| AgtError::invalid(wanted, "no such field name"))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for FieldId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// How a field's payload is laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Zero-length; presence is the signal
    Marker,

    /// Little-endian integer or IEEE-754 float of 1, 2 or 4 bytes
    Scalar { width: u8, signed: bool, float: bool },

    /// `count` homogeneous little-endian elements
    FixedArray { element_width: u8, count: u8 },

    /// uint16 year followed by month, day, hour, minute, second as uint8
    DateTimeRecord,
}

impl FieldType {
    pub const U8: FieldType = FieldType::Scalar { width: 1, signed: false, float: false };
    pub const U16: FieldType = FieldType::Scalar { width: 2, signed: false, float: false };
    pub const I16: FieldType = FieldType::Scalar { width: 2, signed: true, float: false };
    pub const U32: FieldType = FieldType::Scalar { width: 4, signed: false, float: false };
    pub const I32: FieldType = FieldType::Scalar { width: 4, signed: true, float: false };
    pub const F32: FieldType = FieldType::Scalar { width: 4, signed: false, float: true };

    /// Length of the date-time record in bytes
    pub const DATE_TIME_LEN: usize = 7;

    /// Payload length in bytes
    pub const fn width(&self) -> usize {
        match *self {
            FieldType::Marker => 0,
            FieldType::Scalar { width, .. } => width as usize,
            FieldType::FixedArray { element_width, count } => element_width as usize * count as usize,
            FieldType::DateTimeRecord => Self::DATE_TIME_LEN,
        }
    }

    /// Smallest and largest raw integer a scalar of this type can carry
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        match *self {
            FieldType::Scalar { float: true, .. } => None,
            FieldType::Scalar { width, signed: true, .. } => {
                let bits = u32::from(width) * 8;
                Some((-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1))
            }
            FieldType::Scalar { width, signed: false, .. } => {
                let bits = u32::from(width) * 8;
                Some((0, (1i64 << bits) - 1))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(STX, 0x02);
        assert_eq!(ETX, 0x03);
        assert_eq!(GATEWAY_HEADER_LEN, 5);
        assert_eq!(MIN_MESSAGE_LEN, 4);
        assert_eq!(MO_TEXT_LIMIT, 340);
        assert_eq!(MT_MESSAGE_LIMIT, 270);
    }

    #[test]
    fn test_field_id_bytes() {
        assert_eq!(FieldId::Stx.id(), STX);
        assert_eq!(FieldId::Etx.id(), ETX);
        assert_eq!(FieldId::Flags1.id(), 0x31);
        assert_eq!(FieldId::DynModel.id(), 0x4b);
        assert_eq!(FieldId::RbHead.id(), 0x52);
        assert_eq!(FieldId::UserFunc8.id(), 0x5f);
    }

    #[test]
    fn test_field_id_try_from() {
        assert_eq!(FieldId::try_from(0x15).unwrap(), FieldId::Lat);
        assert_eq!(FieldId::try_from(0x3a).unwrap(), FieldId::GeofNum);
        assert!(matches!(FieldId::try_from(0x00), Err(AgtError::UnknownField(0x00))));
        assert!(matches!(FieldId::try_from(0x05), Err(AgtError::UnknownField(0x05))));
        assert!(matches!(FieldId::try_from(0x60), Err(AgtError::UnknownField(0x60))));
    }

    #[test]
    fn test_field_id_names() {
        assert_eq!(FieldId::HiTemp.name(), "HITEMP");
        assert_eq!(FieldId::DateTime.to_string(), "DATETIME");
        assert_eq!("geof2rad".parse::<FieldId>().unwrap(), FieldId::Geof2Rad);
        assert_eq!(" LOWBATT ".parse::<FieldId>().unwrap(), FieldId::LowBatt);
        assert!("NOPE".parse::<FieldId>().is_err());
    }

    #[test]
    fn test_configuration_ranges() {
        assert!(FieldId::MoFields.is_configuration());
        assert!(FieldId::DynModel.is_configuration());
        assert!(FieldId::UserFunc1.is_configuration());
        assert!(FieldId::Source.is_configuration());
        assert!(!FieldId::Lat.is_configuration());
        assert!(!FieldId::RbHead.is_configuration());
        assert!(FieldId::Stx.is_framing());
        assert!(!FieldId::Flags1.is_framing());
    }

    #[test]
    fn test_field_type_widths() {
        assert_eq!(FieldType::Marker.width(), 0);
        assert_eq!(FieldType::U8.width(), 1);
        assert_eq!(FieldType::I16.width(), 2);
        assert_eq!(FieldType::F32.width(), 4);
        assert_eq!(FieldType::FixedArray { element_width: 4, count: 3 }.width(), 12);
        assert_eq!(FieldType::DateTimeRecord.width(), 7);
    }

    #[test]
    fn test_integer_bounds() {
        assert_eq!(FieldType::U8.integer_bounds(), Some((0, 255)));
        assert_eq!(FieldType::I16.integer_bounds(), Some((-32768, 32767)));
        assert_eq!(FieldType::U32.integer_bounds(), Some((0, u32::MAX as i64)));
        assert_eq!(FieldType::I32.integer_bounds(), Some((i32::MIN as i64, i32::MAX as i64)));
        assert_eq!(FieldType::F32.integer_bounds(), None);
        assert_eq!(FieldType::Marker.integer_bounds(), None);
    }
}
