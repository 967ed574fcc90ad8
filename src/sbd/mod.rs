//! # SBD Message Codec
//!
//! Binary TLV codec for Artemis Global Tracker Short Burst Data messages.
//!
//! Wire format: `STX [FieldId Payload]* ETX ChecksumA ChecksumB`, all
//! multi-byte scalars little-endian. Messages relayed by a gateway may
//! carry a 5-byte header ahead of STX.
//!
//! This module handles:
//! - The field registry (wire types, scale factors, validation rules)
//! - Encoding caller values into a framed message
//! - Decoding a framed message back into named values
//! - The 8-bit dual-sum checksum

pub mod protocol;
pub mod registry;
pub mod checksum;
pub mod value;
pub mod encoder;
pub mod decoder;

pub use decoder::{decode_hex, decode_message};
pub use encoder::{encode_message, Diagnostic, EncodedMessage, Encoder};
pub use protocol::{FieldId, FieldType};
pub use value::{DecodedMessage, DecodedValue, FieldValue};
