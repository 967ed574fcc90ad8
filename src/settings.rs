//! # Tracker Settings
//!
//! Builds an MT configuration message from a TOML settings document.
//!
//! Field order on the wire is FLAGS1, FLAGS2, MOFIELDS, then every other
//! field in ascending ID order (USERFUNC triggers last by virtue of their
//! IDs). Problems are collected as diagnostics alongside the message; only
//! an unreadable document is an error.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::LimitsConfig;
use crate::error::{AgtError, Result};
use crate::sbd::encoder::{Diagnostic, EncodedMessage, Encoder};
use crate::sbd::protocol::*;
use crate::sbd::registry::{self, ValueRule};
use crate::sbd::value::FieldValue;

/// Interval defaults the tracker firmware uses when a value is not sent
const DEFAULT_WAKEINT: f64 = 60.0;
const DEFAULT_ALARMINT: f64 = 5.0;
const DEFAULT_TXINT: f64 = 5.0;

/// Complete settings document
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrackerSettings {
    /// USERFUNC1-4 to trigger
    #[serde(default)]
    pub userfunc: Vec<u8>,

    #[serde(default)]
    pub flags1: Flags1Settings,

    #[serde(default)]
    pub flags2: Flags2Settings,

    #[serde(default)]
    pub mofields: MoFieldsSettings,

    #[serde(default)]
    pub geofnum: Option<GeofNumSettings>,

    /// Field name to value in human units
    #[serde(default)]
    pub values: BTreeMap<String, toml::Value>,
}

/// FLAGS1 bits
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Flags1Settings {
    /// Emit FLAGS1 in the message
    #[serde(default)]
    pub include: bool,

    #[serde(default)]
    pub binary: bool,

    #[serde(default)]
    pub dest: bool,

    #[serde(default)]
    pub hipress: bool,

    #[serde(default)]
    pub lopress: bool,

    #[serde(default)]
    pub hitemp: bool,

    #[serde(default)]
    pub lotemp: bool,

    #[serde(default)]
    pub hihumid: bool,

    #[serde(default)]
    pub lohumid: bool,
}

impl Flags1Settings {
    pub fn bits(&self) -> u8 {
        [
            (self.binary, FLAGS1_BINARY),
            (self.dest, FLAGS1_DEST),
            (self.hipress, FLAGS1_HIPRESS),
            (self.lopress, FLAGS1_LOPRESS),
            (self.hitemp, FLAGS1_HITEMP),
            (self.lotemp, FLAGS1_LOTEMP),
            (self.hihumid, FLAGS1_HIHUMID),
            (self.lohumid, FLAGS1_LOHUMID),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// FLAGS2 bits
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Flags2Settings {
    #[serde(default)]
    pub include: bool,

    /// Geofence alerts
    #[serde(default)]
    pub geofence: bool,

    /// Alert when inside rather than outside the geofence
    #[serde(default)]
    pub inside: bool,

    #[serde(default)]
    pub lowbatt: bool,

    /// Monitor the ring channel for MT messages
    #[serde(default)]
    pub ring: bool,
}

impl Flags2Settings {
    pub fn bits(&self) -> u8 {
        [
            (self.geofence, FLAGS2_GEOFENCE),
            (self.inside, FLAGS2_INSIDE),
            (self.lowbatt, FLAGS2_LOWBATT),
            (self.ring, FLAGS2_RING),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// Fields the tracker should report in its MO messages
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MoFieldsSettings {
    #[serde(default)]
    pub include: bool,

    #[serde(default)]
    pub fields: Vec<String>,
}

/// Number of active geofences and the confidence level
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct GeofNumSettings {
    pub count: u8,
    pub confidence: u8,
}

/// Fields ready for encoding plus the findings made while assembling them
#[derive(Debug, Default)]
pub struct Assembly {
    pub fields: Vec<(FieldId, FieldValue)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Assembly {
    fn reject(&mut self, err: AgtError) {
        warn!("{}", err);
        self.diagnostics.push(Diagnostic::Rejected(err));
    }

    fn advise(&mut self, text: String) {
        warn!("{}", text);
        self.diagnostics.push(Diagnostic::Advisory(text));
    }
}

impl TrackerSettings {
    /// Load a settings document from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid TOML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Collect the fields to send, in wire order
    ///
    /// # Arguments
    ///
    /// * `mo_text_limit` - Text-mode MO length above which an advisory is raised
    pub fn assemble(&self, mo_text_limit: usize) -> Assembly {
        let mut assembly = Assembly::default();

        let flags1 = self.flags1.bits();
        if self.flags1.include {
            assembly.fields.push((FieldId::Flags1, FieldValue::Int(flags1 as i64)));
        } else if flags1 > 0 {
            assembly.advise("FLAGS1 has bits set but FLAGS1 is not included".to_string());
        }

        self.check_intervals(&mut assembly);

        let flags2 = self.flags2.bits();
        if self.flags2.include {
            assembly.fields.push((FieldId::Flags2, FieldValue::Int(flags2 as i64)));
        } else if flags2 > 0 {
            assembly.advise("FLAGS2 has bits set but FLAGS2 is not included".to_string());
        }

        let (words, text_len) = self.mofields_words(&mut assembly);
        if !self.flags1.binary && text_len > mo_text_limit {
            assembly.advise(format!(
                "text messages sent by the tracker may reach {} bytes, exceeding the {} byte limit; select fewer MOFIELDS",
                text_len, mo_text_limit
            ));
        }
        if self.mofields.include {
            let words = words.iter().map(|&w| w as u64).collect();
            assembly.fields.push((FieldId::MoFields, FieldValue::Array(words)));
        } else if words.iter().any(|&w| w != 0) {
            assembly.advise("MOFIELDS has bits set but MOFIELDS is not included".to_string());
        }

        let mut rest = self.value_fields(&mut assembly);
        rest.extend(self.geofnum_field(&mut assembly));
        rest.extend(self.userfunc_fields(&mut assembly));
        rest.sort_by_key(|(id, _)| *id);
        assembly.fields.extend(rest);

        if assembly.fields.is_empty() {
            assembly.advise("configuration message is empty".to_string());
        }

        debug!("Assembled {} configuration fields", assembly.fields.len());
        assembly
    }

    /// Assemble and encode the configuration message
    ///
    /// Diagnostics from assembly come first, followed by the encoder's.
    pub fn encode(&self, limits: &LimitsConfig) -> EncodedMessage {
        let assembly = self.assemble(limits.mo_text_limit);
        let mut message = Encoder::new()
            .with_message_limit(limits.mt_message_limit)
            .encode(&assembly.fields);

        let mut diagnostics = assembly.diagnostics;
        diagnostics.append(&mut message.diagnostics);
        message.diagnostics = diagnostics;
        message
    }

    /// Numeric value from `[values]`, if present
    fn number(&self, id: FieldId) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name.parse::<FieldId>().ok() == Some(id))
            .and_then(|(_, value)| match value {
                toml::Value::Integer(v) => Some(*v as f64),
                toml::Value::Float(v) => Some(*v),
                _ => None,
            })
    }

    /// Interval consistency checks for geofence alerts and ring monitoring
    fn check_intervals(&self, assembly: &mut Assembly) {
        let wake = self.number(FieldId::WakeInt).unwrap_or(DEFAULT_WAKEINT) / 60.0;
        let alarm = self.number(FieldId::AlarmInt).unwrap_or(DEFAULT_ALARMINT);
        let tx = self.number(FieldId::TxInt).unwrap_or(DEFAULT_TXINT);

        if self.flags2.geofence && wake < alarm {
            assembly.advise(
                "WAKEINT should match ALARMINT when geofence alerts are enabled".to_string(),
            );
        }

        if self.flags2.ring && wake < alarm && wake < tx {
            assembly.advise(
                "WAKEINT should match ALARMINT and TXINT when monitoring the ring channel".to_string(),
            );
        }
    }

    /// MOFIELDS words and the worst-case text-mode MO length
    fn mofields_words(&self, assembly: &mut Assembly) -> ([u32; MOFIELDS_WORDS], usize) {
        let mut words = [0u32; MOFIELDS_WORDS];
        let mut text_len = if self.flags1.dest { DEST_HEADER_TEXT_LEN } else { 0 };

        for name in &self.mofields.fields {
            let id = match name.parse::<FieldId>() {
                Ok(id) => id,
                Err(e) => {
                    assembly.reject(e);
                    continue;
                }
            };

            match registry::spec_of(id).mo {
                Some(bit) => {
                    if words[bit.word] & bit.mask == 0 {
                        text_len += bit.text_len as usize;
                    }
                    words[bit.word] |= bit.mask;
                }
                None => assembly.reject(AgtError::invalid(
                    id.name(),
                    "cannot be selected in MOFIELDS",
                )),
            }
        }

        (words, text_len)
    }

    /// Fields from the `[values]` table
    fn value_fields(&self, assembly: &mut Assembly) -> Vec<(FieldId, FieldValue)> {
        let mut fields = Vec::new();

        for (name, value) in &self.values {
            let id = match name.parse::<FieldId>() {
                Ok(id) => id,
                Err(e) => {
                    assembly.reject(e);
                    continue;
                }
            };

            if !id.is_configuration() {
                assembly.reject(AgtError::invalid(id.name(), "is not a configuration field"));
                continue;
            }

            let section = match id {
                FieldId::Flags1 => Some("[flags1]"),
                FieldId::Flags2 => Some("[flags2]"),
                FieldId::MoFields => Some("[mofields]"),
                FieldId::GeofNum => Some("[geofnum]"),
                _ => None,
            };
            if let Some(section) = section {
                assembly.reject(AgtError::invalid(id.name(), format!("is set through {}", section)));
                continue;
            }

            let converted = match value {
                toml::Value::Integer(v) => Some(FieldValue::Int(*v)),
                toml::Value::Float(v) => Some(FieldValue::Float(*v)),
                toml::Value::Boolean(true) => Some(FieldValue::Marker),
                toml::Value::Boolean(false) => None,
                other => {
                    assembly.reject(AgtError::invalid(
                        id.name(),
                        format!("unsupported value type {}", other.type_str()),
                    ));
                    None
                }
            };

            if let Some(converted) = converted {
                fields.push((id, converted));
            }
        }

        fields
    }

    fn geofnum_field(&self, assembly: &mut Assembly) -> Option<(FieldId, FieldValue)> {
        let geofnum = self.geofnum?;

        let (count_max, confidence_max) = match registry::spec_of(FieldId::GeofNum).rule {
            ValueRule::Nibbles { high_max, low_max } => (high_max, low_max),
            _ => (0x0f, 0x0f),
        };

        if geofnum.count > count_max || geofnum.confidence > confidence_max {
            assembly.reject(AgtError::invalid(
                "GEOFNUM",
                format!(
                    "count {} / confidence {} must be within 0..={} / 0..={}",
                    geofnum.count, geofnum.confidence, count_max, confidence_max
                ),
            ));
            return None;
        }

        let packed = geofnum.count as i64 * 16 + geofnum.confidence as i64;
        Some((FieldId::GeofNum, FieldValue::Int(packed)))
    }

    fn userfunc_fields(&self, assembly: &mut Assembly) -> Vec<(FieldId, FieldValue)> {
        let mut fields = Vec::new();

        for &number in &self.userfunc {
            let id = match number {
                1 => FieldId::UserFunc1,
                2 => FieldId::UserFunc2,
                3 => FieldId::UserFunc3,
                4 => FieldId::UserFunc4,
                5..=8 => {
                    assembly.reject(AgtError::invalid(
                        format!("USERFUNC{}", number),
                        "takes a value; set it under [values]",
                    ));
                    continue;
                }
                _ => {
                    assembly.reject(AgtError::invalid(
                        format!("USERFUNC{}", number),
                        "no such user function",
                    ));
                    continue;
                }
            };

            if !fields.iter().any(|(existing, _)| *existing == id) {
                fields.push((id, FieldValue::Marker));
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisories(assembly: &Assembly) -> Vec<String> {
        assembly
            .diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Advisory(text) => Some(text.clone()),
                Diagnostic::Rejected(_) => None,
            })
            .collect()
    }

    fn rejected_fields(assembly: &Assembly) -> Vec<String> {
        assembly
            .diagnostics
            .iter()
            .filter_map(|d| match d.as_error() {
                Some(AgtError::InvalidFieldValue { field, .. }) => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_flags1_hipress_only() {
        let settings = TrackerSettings::from_toml(
            r#"
[flags1]
include = true
hipress = true
"#,
        )
        .unwrap();

        let message = settings.encode(&LimitsConfig::default());
        assert_eq!(message.to_hex(), "0231200356de");
        assert!(message.is_clean());
    }

    #[test]
    fn test_flag_bits() {
        let flags1 = Flags1Settings {
            binary: true,
            dest: true,
            lohumid: true,
            ..Default::default()
        };
        assert_eq!(flags1.bits(), 0xC1);

        let flags2 = Flags2Settings {
            geofence: true,
            ring: true,
            ..Default::default()
        };
        assert_eq!(flags2.bits(), 0x90);
    }

    #[test]
    fn test_bits_without_include_advisory() {
        let settings = TrackerSettings::from_toml(
            r#"
[flags1]
hitemp = true

[flags2]
lowbatt = true

[mofields]
fields = ["LAT"]

[values]
TXINT = 10
"#,
        )
        .unwrap();

        let assembly = settings.assemble(MO_TEXT_LIMIT);
        let texts = advisories(&assembly);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("FLAGS1"));
        assert!(texts[1].starts_with("FLAGS2"));
        assert!(texts[2].starts_with("MOFIELDS"));
        assert_eq!(assembly.fields, vec![(FieldId::TxInt, FieldValue::Int(10))]);
    }

    #[test]
    fn test_assembly_order() {
        let settings = TrackerSettings::from_toml(
            r#"
userfunc = [2, 1]

[flags1]
include = true

[flags2]
include = true

[mofields]
include = true
fields = ["DATETIME", "LAT", "LON", "ALT"]

[geofnum]
count = 1
confidence = 4

[values]
WAKEINT = 600
HITEMP = 23.45
SOURCE = 1234
USERFUNC5 = 7
"#,
        )
        .unwrap();

        let assembly = settings.assemble(MO_TEXT_LIMIT);
        let order: Vec<FieldId> = assembly.fields.iter().map(|(id, _)| *id).collect();
        assert_eq!(
            order,
            vec![
                FieldId::Flags1,
                FieldId::Flags2,
                FieldId::MoFields,
                FieldId::Source,
                FieldId::HiTemp,
                FieldId::GeofNum,
                FieldId::WakeInt,
                FieldId::UserFunc1,
                FieldId::UserFunc2,
                FieldId::UserFunc5,
            ]
        );

        let mofields = &assembly.fields[2].1;
        assert_eq!(mofields, &FieldValue::Array(vec![0x0000_0f00, 0, 0]));
        assert_eq!(assembly.fields[5].1, FieldValue::Int(0x14));
        assert!(assembly.diagnostics.is_empty());
    }

    #[test]
    fn test_geofence_interval_advisory() {
        let settings = TrackerSettings::from_toml(
            r#"
[flags2]
include = true
geofence = true

[values]
WAKEINT = 60
ALARMINT = 5
"#,
        )
        .unwrap();
        let texts = advisories(&settings.assemble(MO_TEXT_LIMIT));
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("geofence"));

        let settings = TrackerSettings::from_toml(
            r#"
[flags2]
include = true
geofence = true

[values]
WAKEINT = 300
ALARMINT = 5
"#,
        )
        .unwrap();
        assert!(advisories(&settings.assemble(MO_TEXT_LIMIT)).is_empty());
    }

    #[test]
    fn test_ring_interval_advisory() {
        let settings = TrackerSettings::from_toml(
            r#"
[flags2]
include = true
ring = true

[values]
WAKEINT = 120
ALARMINT = 5
TXINT = 1
"#,
        )
        .unwrap();
        // WAKEINT/60 = 2 is not below TXINT
        assert!(advisories(&settings.assemble(MO_TEXT_LIMIT)).is_empty());

        let settings = TrackerSettings::from_toml(
            r#"
[flags2]
include = true
ring = true
"#,
        )
        .unwrap();
        // Firmware defaults: 60 / 60 = 1 is below both 5 and 5
        let texts = advisories(&settings.assemble(MO_TEXT_LIMIT));
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("ring"));
    }

    #[test]
    fn test_text_length_advisory() {
        let every_field: Vec<String> = registry::fields()
            .filter(|spec| spec.mo.is_some())
            .map(|spec| format!("\"{}\"", spec.name))
            .collect();
        let document = format!(
            "[mofields]\ninclude = true\nfields = [{}]\n",
            every_field.join(", ")
        );

        let settings = TrackerSettings::from_toml(&document).unwrap();
        let texts = advisories(&settings.assemble(MO_TEXT_LIMIT));
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("select fewer MOFIELDS"));

        // Binary mode is not bound by the text limit
        let document = format!("[flags1]\ninclude = true\nbinary = true\n\n{}", document);
        let settings = TrackerSettings::from_toml(&document).unwrap();
        assert!(advisories(&settings.assemble(MO_TEXT_LIMIT)).is_empty());
    }

    #[test]
    fn test_dest_adds_header_length() {
        let settings = TrackerSettings::from_toml(
            r#"
[flags1]
include = true
dest = true

[mofields]
include = true
fields = ["DATETIME", "LAT"]
"#,
        )
        .unwrap();

        // 10 + 15 + 12 = 37
        assert!(advisories(&settings.assemble(37)).is_empty());
        assert_eq!(advisories(&settings.assemble(36)).len(), 1);
    }

    #[test]
    fn test_invalid_names_are_diagnostics() {
        let settings = TrackerSettings::from_toml(
            r#"
userfunc = [6, 9]

[mofields]
include = true
fields = ["LAT", "BOGUS", "USERFUNC1"]

[values]
LAT = 51.5
NOPE = 1
FLAGS1 = 32
HIPRESS = 1000
"#,
        )
        .unwrap();

        let assembly = settings.assemble(MO_TEXT_LIMIT);
        let rejected = rejected_fields(&assembly);
        assert_eq!(
            rejected,
            vec!["BOGUS", "USERFUNC1", "FLAGS1", "LAT", "NOPE", "USERFUNC6", "USERFUNC9"]
        );

        let order: Vec<FieldId> = assembly.fields.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![FieldId::MoFields, FieldId::HiPress]);
    }

    #[test]
    fn test_geofnum_out_of_range() {
        for (count, confidence) in [(5, 0), (0, 5), (16, 0), (4, 255)] {
            let settings = TrackerSettings::from_toml(&format!(
                "[geofnum]\ncount = {}\nconfidence = {}\n",
                count, confidence
            ))
            .unwrap();

            let assembly = settings.assemble(MO_TEXT_LIMIT);
            assert!(assembly.fields.is_empty());
            let rejected: Vec<&Diagnostic> = assembly
                .diagnostics
                .iter()
                .filter(|d| d.as_error().is_some())
                .collect();
            assert_eq!(rejected.len(), 1);
            assert_eq!(
                rejected[0].to_string(),
                format!(
                    "Error: invalid value for GEOFNUM: count {} / confidence {} must be within 0..=4 / 0..=4",
                    count, confidence
                )
            );

            let message = settings.encode(&LimitsConfig::default());
            assert_eq!(message.rejected().count(), 1);
            assert_eq!(message.bytes, vec![STX, ETX, 0x05, 0x07]);
        }
    }

    #[test]
    fn test_geofnum_upper_limits_accepted() {
        let settings = TrackerSettings::from_toml("[geofnum]\ncount = 4\nconfidence = 4\n").unwrap();
        let message = settings.encode(&LimitsConfig::default());

        assert!(message.rejected().next().is_none());
        assert_eq!(message.bytes[..3], [STX, 0x3a, 0x44]);
    }

    #[test]
    fn test_invalid_value_is_skipped() {
        let settings = TrackerSettings::from_toml(
            r#"
[values]
HIPRESS = 2000
LOPRESS = 900
"#,
        )
        .unwrap();

        let message = settings.encode(&LimitsConfig::default());
        assert_eq!(message.rejected().count(), 1);
        assert_eq!(message.bytes[..4], [STX, 0x35, 0x84, 0x03]);
    }

    #[test]
    fn test_empty_settings_advisory() {
        let settings = TrackerSettings::default();
        let assembly = settings.assemble(MO_TEXT_LIMIT);
        assert!(assembly.fields.is_empty());
        assert_eq!(advisories(&assembly), vec!["configuration message is empty".to_string()]);
    }

    #[test]
    fn test_userfunc_marker_via_values() {
        let settings = TrackerSettings::from_toml(
            r#"
[values]
USERFUNC3 = true
USERFUNC4 = false
USERFUNC8 = 4000000000
"#,
        )
        .unwrap();

        let message = settings.encode(&LimitsConfig::default());
        assert!(message.is_clean());
        let raw = 4_000_000_000u32.to_le_bytes();
        assert_eq!(
            message.bytes[..7],
            [STX, 0x5a, 0x5f, raw[0], raw[1], raw[2], raw[3]]
        );
    }

    #[test]
    fn test_mt_limit_from_config() {
        let settings = TrackerSettings::from_toml("[values]\nDEST = 1234\n").unwrap();
        let limits = LimitsConfig {
            mo_text_limit: MO_TEXT_LIMIT,
            mt_message_limit: 8,
        };

        let message = settings.encode(&limits);
        assert_eq!(message.bytes.len(), 9);
        assert!(matches!(message.diagnostics.as_slice(), [Diagnostic::Advisory(_)]));
    }

    #[test]
    fn test_load_settings_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[flags1]\ninclude = true\nhipress = true\n")
            .unwrap();
        temp_file.flush().unwrap();

        let settings = TrackerSettings::load(temp_file.path()).unwrap();
        assert!(settings.flags1.include);
        assert!(matches!(TrackerSettings::from_toml("[flags1"), Err(AgtError::Config(_))));
    }
}
