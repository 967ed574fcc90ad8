//! # Field Registry
//!
//! Single source of truth mapping each field ID to its wire type, optional
//! scale factor, encode-time validation rule and MOFIELDS selection bit.
//!
//! The registry is a static table of records; an index from wire byte to
//! table row is generated at compile time.

use super::protocol::{FieldId, FieldType};
use crate::error::{AgtError, Result};

/// Encode-time validation rule, in human units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRule {
    /// Any value whose raw form fits the wire type
    Wire,

    /// `min..=max`
    Inclusive { min: f64, max: f64 },

    /// `min..max`
    HalfOpen { min: f64, max: f64 },

    /// `min..=max` with one forbidden value
    InclusiveExcept { min: f64, max: f64, except: f64 },

    /// Packed byte: high nibble `0..=high_max`, low nibble `0..=low_max`
    Nibbles { high_max: u8, low_max: u8 },
}

impl ValueRule {
    /// Check a human-unit value against the rule
    ///
    /// # Returns
    ///
    /// * `Err(String)` - Reason the value is rejected
    pub fn check(&self, value: f64) -> std::result::Result<(), String> {
        match *self {
            ValueRule::Wire => Ok(()),
            ValueRule::Inclusive { min, max } => {
                if value < min || value > max {
                    Err(format!("{} is outside {}..={}", value, min, max))
                } else {
                    Ok(())
                }
            }
            ValueRule::HalfOpen { min, max } => {
                if value < min || value >= max {
                    Err(format!("{} is outside {}..{}", value, min, max))
                } else {
                    Ok(())
                }
            }
            ValueRule::InclusiveExcept { min, max, except } => {
                if value < min || value > max {
                    Err(format!("{} is outside {}..={}", value, min, max))
                } else if value == except {
                    Err(format!("{} is not an allowed value", value))
                } else {
                    Ok(())
                }
            }
            ValueRule::Nibbles { high_max, low_max } => {
                if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
                    return Err(format!("{} is not a packed byte", value));
                }
                let packed = value as u8;
                let (high, low) = (packed >> 4, packed & 0x0f);
                if high > high_max || low > low_max {
                    Err(format!(
                        "count {} / confidence {} must be within 0..={} / 0..={}",
                        high, low, high_max, low_max
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Position of a field in the MOFIELDS bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoBit {
    /// Index of the 32-bit word (0-2)
    pub word: usize,

    /// Bit within that word
    pub mask: u32,

    /// Worst-case length of the field in a text-mode MO message
    pub text_len: u16,
}

/// One row of the field registry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub id: FieldId,
    pub name: &'static str,
    pub field_type: FieldType,

    /// Multiplier from raw wire integer to human units
    pub scale: Option<f64>,

    pub rule: ValueRule,

    /// MOFIELDS selection bit, for fields the tracker can report
    pub mo: Option<MoBit>,
}

impl FieldSpec {
    const fn new(id: FieldId, name: &'static str, field_type: FieldType) -> Self {
        Self {
            id,
            name,
            field_type,
            scale: None,
            rule: ValueRule::Wire,
            mo: None,
        }
    }

    const fn scaled(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    const fn rule(mut self, rule: ValueRule) -> Self {
        self.rule = rule;
        self
    }

    const fn mo(mut self, word: usize, mask: u32, text_len: u16) -> Self {
        self.mo = Some(MoBit { word, mask, text_len });
        self
    }

    /// Raw counts per human unit, the reciprocal of `scale`
    ///
    /// Scale factors are negative powers of ten, so this is a whole number.
    pub fn per_unit(&self) -> Option<f64> {
        self.scale.map(|scale| (1.0 / scale).round())
    }
}

use super::protocol::{FieldId as F, FieldType as T};

const LAT_RULE: ValueRule = ValueRule::HalfOpen { min: -90.0, max: 90.0 };
const LON_RULE: ValueRule = ValueRule::HalfOpen { min: -180.0, max: 180.0 };
const RAD_RULE: ValueRule = ValueRule::Inclusive { min: 0.0, max: 100_000.0 };
const SERIAL_RULE: ValueRule = ValueRule::Inclusive { min: 0.0, max: 9_999_999.0 };
const PRESS_RULE: ValueRule = ValueRule::Inclusive { min: 0.0, max: 1084.0 };
const TEMP_RULE: ValueRule = ValueRule::Inclusive { min: -40.0, max: 85.0 };
const HUMID_RULE: ValueRule = ValueRule::Inclusive { min: 0.0, max: 100.0 };
const INTERVAL_RULE: ValueRule = ValueRule::Inclusive { min: 0.0, max: 1440.0 };

const GEOFSTAT: FieldType = FieldType::FixedArray { element_width: 1, count: 3 };
const MOFIELDS: FieldType = FieldType::FixedArray { element_width: 4, count: 3 };
const RBHEAD: FieldType = FieldType::FixedArray { element_width: 1, count: 4 };

/// The full field table
pub const REGISTRY: &[FieldSpec] = &[
    FieldSpec::new(F::Stx, "STX", T::Marker),
    FieldSpec::new(F::Etx, "ETX", T::Marker),
    FieldSpec::new(F::SwVer, "SWVER", T::U8).mo(0, 0x0800_0000, 6),
    FieldSpec::new(F::Source, "SOURCE", T::U32).rule(SERIAL_RULE).mo(0, 0x0080_0000, 8),
    FieldSpec::new(F::BattV, "BATTV", T::U16).scaled(1e-2).mo(0, 0x0040_0000, 5),
    FieldSpec::new(F::Press, "PRESS", T::U16).mo(0, 0x0020_0000, 5),
    FieldSpec::new(F::Temp, "TEMP", T::I16).scaled(1e-2).mo(0, 0x0010_0000, 7),
    FieldSpec::new(F::Humid, "HUMID", T::U16).scaled(1e-2).mo(0, 0x0008_0000, 7),
    FieldSpec::new(F::Year, "YEAR", T::U16).mo(0, 0x0004_0000, 5),
    FieldSpec::new(F::Month, "MONTH", T::U8).mo(0, 0x0002_0000, 3),
    FieldSpec::new(F::Day, "DAY", T::U8).mo(0, 0x0001_0000, 3),
    FieldSpec::new(F::Hour, "HOUR", T::U8).mo(0, 0x0000_8000, 3),
    FieldSpec::new(F::Min, "MIN", T::U8).mo(0, 0x0000_4000, 3),
    FieldSpec::new(F::Sec, "SEC", T::U8).mo(0, 0x0000_2000, 3),
    FieldSpec::new(F::Millis, "MILLIS", T::U16).mo(0, 0x0000_1000, 4),
    FieldSpec::new(F::DateTime, "DATETIME", T::DateTimeRecord).mo(0, 0x0000_0800, 15),
    FieldSpec::new(F::Lat, "LAT", T::I32).scaled(1e-7).mo(0, 0x0000_0400, 12),
    FieldSpec::new(F::Lon, "LON", T::I32).scaled(1e-7).mo(0, 0x0000_0200, 13),
    FieldSpec::new(F::Alt, "ALT", T::I32).scaled(1e-3).mo(0, 0x0000_0100, 10),
    FieldSpec::new(F::Speed, "SPEED", T::I32).mo(0, 0x0000_0080, 8),
    FieldSpec::new(F::Head, "HEAD", T::I32).scaled(1e-7).mo(0, 0x0000_0040, 7),
    FieldSpec::new(F::Sats, "SATS", T::U8).mo(0, 0x0000_0020, 3),
    FieldSpec::new(F::Pdop, "PDOP", T::U16).scaled(1e-2).mo(0, 0x0000_0010, 7),
    FieldSpec::new(F::Fix, "FIX", T::U8).mo(0, 0x0000_0008, 2),
    FieldSpec::new(F::GeofStat, "GEOFSTAT", GEOFSTAT).mo(0, 0x0000_0004, 7),
    FieldSpec::new(F::UserVal1, "USERVAL1", T::U8).mo(1, 0x8000_0000, 4),
    FieldSpec::new(F::UserVal2, "USERVAL2", T::U8).mo(1, 0x4000_0000, 4),
    FieldSpec::new(F::UserVal3, "USERVAL3", T::U16).mo(1, 0x2000_0000, 6),
    FieldSpec::new(F::UserVal4, "USERVAL4", T::U16).mo(1, 0x1000_0000, 6),
    FieldSpec::new(F::UserVal5, "USERVAL5", T::U32).mo(1, 0x0800_0000, 11),
    FieldSpec::new(F::UserVal6, "USERVAL6", T::U32).mo(1, 0x0400_0000, 11),
    FieldSpec::new(F::UserVal7, "USERVAL7", T::F32).mo(1, 0x0200_0000, 15),
    FieldSpec::new(F::UserVal8, "USERVAL8", T::F32).mo(1, 0x0100_0000, 15),
    FieldSpec::new(F::MoFields, "MOFIELDS", MOFIELDS).mo(1, 0x0000_8000, 25),
    FieldSpec::new(F::Flags1, "FLAGS1", T::U8).mo(1, 0x0000_4000, 3),
    FieldSpec::new(F::Flags2, "FLAGS2", T::U8).mo(1, 0x0000_2000, 3),
    FieldSpec::new(F::Dest, "DEST", T::U32).rule(SERIAL_RULE).mo(1, 0x0000_1000, 8),
    FieldSpec::new(F::HiPress, "HIPRESS", T::U16).rule(PRESS_RULE).mo(1, 0x0000_0800, 5),
    FieldSpec::new(F::LoPress, "LOPRESS", T::U16).rule(PRESS_RULE).mo(1, 0x0000_0400, 5),
    FieldSpec::new(F::HiTemp, "HITEMP", T::I16).scaled(1e-2).rule(TEMP_RULE).mo(1, 0x0000_0200, 7),
    FieldSpec::new(F::LoTemp, "LOTEMP", T::I16).scaled(1e-2).rule(TEMP_RULE).mo(1, 0x0000_0100, 7),
    FieldSpec::new(F::HiHumid, "HIHUMID", T::U16).scaled(1e-2).rule(HUMID_RULE).mo(1, 0x0000_0080, 7),
    FieldSpec::new(F::LoHumid, "LOHUMID", T::U16).scaled(1e-2).rule(HUMID_RULE).mo(1, 0x0000_0040, 7),
    FieldSpec::new(F::GeofNum, "GEOFNUM", T::U8)
        .rule(ValueRule::Nibbles { high_max: 4, low_max: 4 })
        .mo(1, 0x0000_0020, 3),
    FieldSpec::new(F::Geof1Lat, "GEOF1LAT", T::I32).scaled(1e-7).rule(LAT_RULE).mo(1, 0x0000_0010, 12),
    FieldSpec::new(F::Geof1Lon, "GEOF1LON", T::I32).scaled(1e-7).rule(LON_RULE).mo(1, 0x0000_0008, 13),
    FieldSpec::new(F::Geof1Rad, "GEOF1RAD", T::U32).scaled(1e-2).rule(RAD_RULE).mo(1, 0x0000_0004, 10),
    FieldSpec::new(F::Geof2Lat, "GEOF2LAT", T::I32).scaled(1e-7).rule(LAT_RULE).mo(1, 0x0000_0002, 12),
    FieldSpec::new(F::Geof2Lon, "GEOF2LON", T::I32).scaled(1e-7).rule(LON_RULE).mo(1, 0x0000_0001, 13),
    FieldSpec::new(F::Geof2Rad, "GEOF2RAD", T::U32).scaled(1e-2).rule(RAD_RULE).mo(2, 0x8000_0000, 10),
    FieldSpec::new(F::Geof3Lat, "GEOF3LAT", T::I32).scaled(1e-7).rule(LAT_RULE).mo(2, 0x4000_0000, 12),
    FieldSpec::new(F::Geof3Lon, "GEOF3LON", T::I32).scaled(1e-7).rule(LON_RULE).mo(2, 0x2000_0000, 13),
    FieldSpec::new(F::Geof3Rad, "GEOF3RAD", T::U32).scaled(1e-2).rule(RAD_RULE).mo(2, 0x1000_0000, 10),
    FieldSpec::new(F::Geof4Lat, "GEOF4LAT", T::I32).scaled(1e-7).rule(LAT_RULE).mo(2, 0x0800_0000, 12),
    FieldSpec::new(F::Geof4Lon, "GEOF4LON", T::I32).scaled(1e-7).rule(LON_RULE).mo(2, 0x0400_0000, 13),
    FieldSpec::new(F::Geof4Rad, "GEOF4RAD", T::U32).scaled(1e-2).rule(RAD_RULE).mo(2, 0x0200_0000, 10),
    FieldSpec::new(F::WakeInt, "WAKEINT", T::U32)
        .rule(ValueRule::Inclusive { min: 0.0, max: 86_400.0 })
        .mo(2, 0x0100_0000, 5),
    FieldSpec::new(F::AlarmInt, "ALARMINT", T::U16).rule(INTERVAL_RULE).mo(2, 0x0080_0000, 5),
    FieldSpec::new(F::TxInt, "TXINT", T::U16).rule(INTERVAL_RULE).mo(2, 0x0040_0000, 5),
    FieldSpec::new(F::LowBatt, "LOWBATT", T::U16)
        .scaled(1e-2)
        .rule(ValueRule::Inclusive { min: 0.0, max: 9.99 })
        .mo(2, 0x0020_0000, 5),
    FieldSpec::new(F::DynModel, "DYNMODEL", T::U8)
        .rule(ValueRule::InclusiveExcept { min: 0.0, max: 10.0, except: 1.0 })
        .mo(2, 0x0010_0000, 3),
    FieldSpec::new(F::RbHead, "RBHEAD", RBHEAD),
    FieldSpec::new(F::UserFunc1, "USERFUNC1", T::Marker),
    FieldSpec::new(F::UserFunc2, "USERFUNC2", T::Marker),
    FieldSpec::new(F::UserFunc3, "USERFUNC3", T::Marker),
    FieldSpec::new(F::UserFunc4, "USERFUNC4", T::Marker),
    FieldSpec::new(F::UserFunc5, "USERFUNC5", T::U16),
    FieldSpec::new(F::UserFunc6, "USERFUNC6", T::U16),
    FieldSpec::new(F::UserFunc7, "USERFUNC7", T::U32),
    FieldSpec::new(F::UserFunc8, "USERFUNC8", T::U32),
];

/// Index value for bytes with no registry row
const NOT_REGISTERED: u8 = u8::MAX;

/// Wire byte -> registry row, built at compile time
const INDEX: [u8; 256] = generate_index();

const fn generate_index() -> [u8; 256] {
    let mut index = [NOT_REGISTERED; 256];
    let mut i = 0;

    while i < REGISTRY.len() {
        index[REGISTRY[i].id as u8 as usize] = i as u8;
        i += 1;
    }

    index
}

/// Look up the registry row for a wire byte
pub fn lookup(id: u8) -> Option<&'static FieldSpec> {
    match INDEX[id as usize] {
        NOT_REGISTERED => None,
        row => REGISTRY.get(row as usize),
    }
}

/// Registry row for a known field
pub fn spec_of(id: FieldId) -> &'static FieldSpec {
    lookup(id.id()).unwrap_or_else(|| unreachable!("{:?} has no registry row", id))
}

/// Wire type of a field
///
/// # Errors
///
/// Returns `UnknownField` if `id` is not registered
pub fn type_of(id: u8) -> Result<FieldType> {
    lookup(id)
        .map(|spec| spec.field_type)
        .ok_or(AgtError::UnknownField(id))
}

/// Scale factor converting raw values of a field to human units
pub fn scale_of(id: u8) -> Option<f64> {
    lookup(id).and_then(|spec| spec.scale)
}

/// All registered fields, in ascending ID order
pub fn fields() -> impl Iterator<Item = &'static FieldSpec> {
    REGISTRY.iter()
}
