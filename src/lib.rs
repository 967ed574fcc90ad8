//! # AGT Codec Library
//!
//! Encode and decode Artemis Global Tracker Iridium SBD messages.
//!
//! This library provides the binary message codec shared by the tracker's
//! ground tools: building MT configuration messages from field values, and
//! decoding MO telemetry messages back into named, scaled values.

pub mod config;
pub mod error;
pub mod sbd;
pub mod settings;
pub mod telemetry;
pub mod translator;
