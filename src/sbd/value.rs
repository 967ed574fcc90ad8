//! # Field Values
//!
//! Caller-supplied values for encoding and the decoded field mapping.

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::protocol::FieldId;

/// A value supplied to the encoder, in human units
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No payload (markers such as USERFUNC1)
    Marker,

    /// Integer value
    Int(i64),

    /// Decimal value, scaled by the field's factor before packing
    Float(f64),

    /// Multi-word array (MOFIELDS)
    Array(Vec<u64>),

    /// Raw byte array (GEOFSTAT, RBHEAD)
    Bytes(Vec<u8>),

    /// Calendar timestamp (DATETIME)
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Short name of the value kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Marker => "marker",
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Array(_) => "array",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::DateTime(_) => "date-time",
        }
    }

    /// Numeric view of scalar values
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Int(v) => Some(v as f64),
            FieldValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

/// A value read from the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    /// Marker field was present
    Present(bool),

    Unsigned(u64),

    Signed(i64),

    /// Scaled value in human units, or an IEEE-754 field
    Float(f64),

    Array(Vec<u64>),

    Bytes(Vec<u8>),

    DateTime(NaiveDateTime),
}

impl DecodedValue {
    /// Numeric view of scalar values
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DecodedValue::Unsigned(v) => Some(v as f64),
            DecodedValue::Signed(v) => Some(v as f64),
            DecodedValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// Decoded fields in transmission order
///
/// A field that appears twice keeps its first position and takes the later
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMessage {
    fields: Vec<(FieldId, DecodedValue)>,
}

impl DecodedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a field value, returning the value it replaced
    pub fn insert(&mut self, id: FieldId, value: DecodedValue) -> Option<DecodedValue> {
        match self.fields.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((id, value));
                None
            }
        }
    }

    pub fn get(&self, id: FieldId) -> Option<&DecodedValue> {
        self.fields
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, value)| value)
    }

    /// Look up a field by its upper-case name
    pub fn get_by_name(&self, name: &str) -> Option<&DecodedValue> {
        name.parse::<FieldId>().ok().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &DecodedValue)> {
        self.fields.iter().map(|(id, value)| (*id, value))
    }
}

impl Serialize for DecodedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (id, value) in &self.fields {
            map.serialize_entry(id.name(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_last_wins_keeps_position() {
        let mut message = DecodedMessage::new();
        assert!(message.insert(FieldId::Press, DecodedValue::Unsigned(1000)).is_none());
        message.insert(FieldId::Sats, DecodedValue::Unsigned(7));

        let replaced = message.insert(FieldId::Press, DecodedValue::Unsigned(990));
        assert_eq!(replaced, Some(DecodedValue::Unsigned(1000)));
        assert_eq!(message.len(), 2);
        assert_eq!(message.get(FieldId::Press), Some(&DecodedValue::Unsigned(990)));

        let order: Vec<FieldId> = message.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![FieldId::Press, FieldId::Sats]);
    }

    #[test]
    fn test_get_by_name() {
        let mut message = DecodedMessage::new();
        message.insert(FieldId::BattV, DecodedValue::Float(4.95));
        assert_eq!(message.get_by_name("BATTV"), Some(&DecodedValue::Float(4.95)));
        assert_eq!(message.get_by_name("battv"), Some(&DecodedValue::Float(4.95)));
        assert_eq!(message.get_by_name("LAT"), None);
        assert_eq!(message.get_by_name("BOGUS"), None);
    }

    #[test]
    fn test_serialize_as_ordered_object() {
        let mut message = DecodedMessage::new();
        message.insert(FieldId::Temp, DecodedValue::Float(21.5));
        message.insert(FieldId::Press, DecodedValue::Unsigned(1013));
        message.insert(FieldId::GeofStat, DecodedValue::Bytes(vec![1, 2, 3]));
        message.insert(FieldId::UserFunc1, DecodedValue::Present(true));

        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"TEMP":21.5,"PRESS":1013,"GEOFSTAT":[1,2,3],"USERFUNC1":true}"#
        );
    }

    #[test]
    fn test_value_views() {
        assert_eq!(FieldValue::Int(5).as_f64(), Some(5.0));
        assert_eq!(FieldValue::Marker.as_f64(), None);
        assert_eq!(FieldValue::from(2.5).kind(), "float");
        assert_eq!(DecodedValue::Signed(-4).as_f64(), Some(-4.0));
        assert_eq!(DecodedValue::Bytes(vec![]).as_f64(), None);
    }
}
