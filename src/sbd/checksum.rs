//! # Running Dual-Sum Checksum
//!
//! 8-bit Fletcher-style checksum as used by the TCP alternate checksum
//! option (RFC 1145).
//!
//! **Coverage**: STX through ETX inclusive
//! **Initial Value**: a = 0, b = 0

use crate::error::{AgtError, Result};

/// Checksum accumulator pair
///
/// For each byte `v`: `a = a + v`, then `b = b + a`, both modulo 256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    pub a: u8,
    pub b: u8,
}

impl Checksum {
    /// Fold more bytes into the running sums
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.a = self.a.wrapping_add(byte);
            self.b = self.b.wrapping_add(self.a);
        }
    }

    /// Calculate the checksum of a byte slice
    ///
    /// # Examples
    ///
    /// ```
    /// use agt_codec::sbd::checksum::Checksum;
    ///
    /// let sum = Checksum::compute(&[0x02, 0x31, 0x20, 0x03]);
    /// assert_eq!(sum.to_bytes(), [0x56, 0xDE]);
    /// ```
    pub fn compute(data: &[u8]) -> Self {
        let mut sum = Self::default();
        sum.update(data);
        sum
    }

    /// The two bytes appended after ETX, `a` first
    pub fn to_bytes(self) -> [u8; 2] {
        [self.a, self.b]
    }

    /// Compare against the checksum received after ETX
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` if either byte differs
    pub fn verify(self, received: [u8; 2]) -> Result<()> {
        if self.to_bytes() != received {
            return Err(AgtError::ChecksumMismatch {
                expected_a: self.a,
                expected_b: self.b,
                found_a: received[0],
                found_b: received[1],
            });
        }

        Ok(())
    }
}

/// Reference implementation with unbounded sums reduced at the end
///
/// Used to check the wrapping implementation.
#[cfg(test)]
fn checksum_unbounded(data: &[u8]) -> [u8; 2] {
    let mut a: u64 = 0;
    let mut b: u64 = 0;

    for &byte in data {
        a += byte as u64;
        b += a;
    }

    [(a % 256) as u8, (b % 256) as u8]
}
