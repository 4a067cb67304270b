//! ISBN-13 value type with checksum validation (spec §3).

use std::fmt;

use crate::error::DomainError;

/// A validated ISBN-13 identifier. Construction is the only way to obtain
/// one, so any `Isbn13` in scope is known-valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Isbn13(String);

impl Isbn13 {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        if digits.len() != 13 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidIsbn(raw.to_string()));
        }
        if !checksum_valid(&digits) {
            return Err(DomainError::InvalidIsbn(raw.to_string()));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn13 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISBN-13 check digit: weighted alternating 1/3 sum mod 10 must be zero.
fn checksum_valid(digits: &str) -> bool {
    let nums: Vec<u32> = digits.chars().map(|c| c.to_digit(10).unwrap()).collect();
    let sum: u32 = nums
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    sum % 10 == 0
}
