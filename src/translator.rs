//! # Message Translator
//!
//! Batch decoding of received messages. Each buffer is decoded on its own;
//! a rejected message is recorded and the batch continues.

use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::AgtError;
use crate::sbd::decoder::decode_message;
use crate::sbd::value::DecodedMessage;

/// A message that decoded cleanly
#[derive(Debug)]
pub struct Translated {
    pub source: String,
    pub message: DecodedMessage,
}

/// A message that was rejected, with the reason
#[derive(Debug)]
pub struct Rejected {
    pub source: String,
    pub error: AgtError,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct TranslationReport {
    pub decoded: Vec<Translated>,
    pub rejected: Vec<Rejected>,
}

impl TranslationReport {
    pub fn total(&self) -> usize {
        self.decoded.len() + self.rejected.len()
    }

    fn record(&mut self, source: String, result: crate::error::Result<DecodedMessage>) {
        match result {
            Ok(message) => self.decoded.push(Translated { source, message }),
            Err(error) => {
                warn!("Rejected {}: {} ({})", source, error, error.code());
                self.rejected.push(Rejected { source, error });
            }
        }
    }
}

/// Decode a batch of named buffers
///
/// # Examples
///
/// ```
/// use agt_codec::translator::translate_buffers;
///
/// let good: &[u8] = &[0x02, 0x31, 0x20, 0x03, 0x56, 0xDE];
/// let bad: &[u8] = &[0x02, 0x31, 0x20, 0x03, 0x56, 0xDF];
/// let report = translate_buffers([("good", good), ("bad", bad)]);
///
/// assert_eq!(report.decoded.len(), 1);
/// assert_eq!(report.rejected[0].source, "bad");
/// ```
pub fn translate_buffers<'a, S, I>(buffers: I) -> TranslationReport
where
    S: Into<String>,
    I: IntoIterator<Item = (S, &'a [u8])>,
{
    let mut report = TranslationReport::default();

    for (source, data) in buffers {
        report.record(source.into(), decode_message(data));
    }

    info!(
        "Translated {} messages: {} decoded, {} rejected",
        report.total(),
        report.decoded.len(),
        report.rejected.len()
    );
    report
}

/// Read and decode each file
///
/// Unreadable files are rejected with an `Io` error.
pub fn translate_files<P: AsRef<Path>>(paths: &[P]) -> TranslationReport {
    let mut report = TranslationReport::default();

    for path in paths {
        let path = path.as_ref();
        let source = path.display().to_string();
        let result = fs::read(path)
            .map_err(AgtError::from)
            .and_then(|data| decode_message(&data));
        report.record(source, result);
    }

    info!(
        "Translated {} files: {} decoded, {} rejected",
        report.total(),
        report.decoded.len(),
        report.rejected.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbd::protocol::FieldId;
    use crate::sbd::value::DecodedValue;
    use tempfile::tempdir;

    const FLAGS1_MESSAGE: [u8; 6] = [0x02, 0x31, 0x20, 0x03, 0x56, 0xDE];

    #[test]
    fn test_batch_continues_after_rejection() {
        let unknown: &[u8] = &[0x02, 0x00, 0x03, 0x05, 0x07];
        let truncated: &[u8] = &[0x02, 0x15, 0x01];
        let report = translate_buffers([
            ("one", &FLAGS1_MESSAGE[..]),
            ("two", unknown),
            ("three", truncated),
            ("four", &FLAGS1_MESSAGE[..]),
        ]);

        assert_eq!(report.total(), 4);
        assert_eq!(report.decoded.len(), 2);
        assert_eq!(report.decoded[1].source, "four");
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].error.code(), "UNKNOWN_FIELD");
        assert_eq!(report.rejected[1].error.code(), "TRUNCATED_MESSAGE");
    }

    #[test]
    fn test_translate_files() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.bin");
        let bad = dir.path().join("bad.bin");
        let missing = dir.path().join("missing.bin");

        let mut with_header = vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
        with_header.extend_from_slice(&FLAGS1_MESSAGE);
        fs::write(&good, &with_header).unwrap();
        fs::write(&bad, [0x02, 0x31, 0x20, 0x03, 0x00, 0x00]).unwrap();

        let report = translate_files(&[&good, &bad, &missing]);

        assert_eq!(report.decoded.len(), 1);
        assert_eq!(
            report.decoded[0].message.get(FieldId::Flags1),
            Some(&DecodedValue::Unsigned(0x20))
        );
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(report.rejected[0].error, AgtError::ChecksumMismatch { .. }));
        assert!(matches!(report.rejected[1].error, AgtError::Io(_)));
    }

    #[test]
    fn test_empty_batch() {
        let report = translate_buffers(Vec::<(String, &[u8])>::new());
        assert_eq!(report.total(), 0);
    }
}
