//! Tag identifier type for contactless tags.
//!
//! A UID is the raw byte sequence returned by the reader's GET-UID command.
//! It is compared by value and rendered as uppercase hex without separators,
//! which is also the form sent to the lookup service.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A tag identifier as read from the card (typically 4, 7 or 10 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagUid(Vec<u8>);

impl TagUid {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Advisory tag family derived from the UID length.
    pub fn family(&self) -> TagFamily {
        TagFamily::from_uid_len(self.0.len())
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl From<&[u8]> for TagUid {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Errors returned when parsing a UID from text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseUidError {
    #[error("invalid tag UID: empty")]
    Empty,
    #[error("invalid tag UID: odd number of hex digits ({0})")]
    OddLength(usize),
    #[error("invalid tag UID: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for TagUid {
    type Err = ParseUidError;

    /// Parse hex text such as `04A23B11000007`, `04 a2 3b` or `04:A2:3B`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();

        if digits.is_empty() {
            return Err(ParseUidError::Empty);
        }
        if digits.len() % 2 != 0 {
            return Err(ParseUidError::OddLength(digits.len()));
        }
        // from_str_radix alone would accept a sign such as "+1"
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseUidError::InvalidHex(s.trim().to_string()));
        }

        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| {
                let pair = &digits[i..i + 2];
                u8::from_str_radix(pair, 16)
                    .map_err(|_| ParseUidError::InvalidHex(pair.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        Ok(TagUid(bytes))
    }
}

/// Tag family guessed from the UID length.
///
/// Diagnostic only: lookups are performed for every family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFamily {
    /// 7-byte UID, NTAG213 (180 bytes user memory)
    Ntag213,
    /// 10-byte UID, NTAG215/216 (540/944 bytes)
    Ntag215Or216,
    Unknown(usize),
}

impl TagFamily {
    pub fn from_uid_len(len: usize) -> Self {
        match len {
            7 => TagFamily::Ntag213,
            10 => TagFamily::Ntag215Or216,
            other => TagFamily::Unknown(other),
        }
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFamily::Ntag213 => write!(f, "NTAG213"),
            TagFamily::Ntag215Or216 => write!(f, "NTAG215/216"),
            TagFamily::Unknown(len) => write!(f, "unknown ({len} byte UID)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uppercase_without_separators() {
        let uid = TagUid::new([0x04, 0xA2, 0x3B, 0x11, 0x00, 0x00, 0x07]);
        assert_eq!(format!("{}", uid), "04A23B11000007");
    }

    #[test]
    fn test_display_keeps_leading_zeros() {
        let uid = TagUid::new([0x00, 0x0F, 0xF0]);
        assert_eq!(uid.to_string(), "000FF0");
    }

    #[test]
    fn test_from_str() {
        let uid: TagUid = "04A23B11000007".parse().unwrap();
        assert_eq!(uid.as_bytes(), &[0x04, 0xA2, 0x3B, 0x11, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn test_from_str_lowercase_and_separators() {
        let plain: TagUid = "04a23b11".parse().unwrap();
        let spaced: TagUid = "04 A2 3B 11".parse().unwrap();
        let colons: TagUid = "04:a2:3b:11".parse().unwrap();
        assert_eq!(plain, spaced);
        assert_eq!(plain, colons);
        assert_eq!(plain.to_string(), "04A23B11");
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!("".parse::<TagUid>(), Err(ParseUidError::Empty));
        assert_eq!("  ".parse::<TagUid>(), Err(ParseUidError::Empty));
        assert_eq!("ABC".parse::<TagUid>(), Err(ParseUidError::OddLength(3)));
        assert!(matches!(
            "04GG".parse::<TagUid>(),
            Err(ParseUidError::InvalidHex(_))
        ));
        assert!(matches!(
            "ää".parse::<TagUid>(),
            Err(ParseUidError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_from_str_rejects_signs() {
        assert_eq!(
            "+1+2".parse::<TagUid>(),
            Err(ParseUidError::InvalidHex("+1+2".to_string()))
        );
        assert!("-1".parse::<TagUid>().is_err());
        assert!("04+A".parse::<TagUid>().is_err());
    }

    #[test]
    fn test_family_by_length() {
        assert_eq!(TagUid::new([0u8; 7]).family(), TagFamily::Ntag213);
        assert_eq!(TagUid::new([0u8; 10]).family(), TagFamily::Ntag215Or216);
        assert_eq!(TagUid::new([0u8; 4]).family(), TagFamily::Unknown(4));
    }

    #[test]
    fn test_family_display() {
        assert_eq!(TagFamily::Ntag213.to_string(), "NTAG213");
        assert_eq!(TagFamily::Ntag215Or216.to_string(), "NTAG215/216");
        assert_eq!(TagFamily::Unknown(4).to_string(), "unknown (4 byte UID)");
    }

    #[test]
    fn test_hash_equality() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(TagUid::new([0xDE, 0xAD]), "spool");

        assert_eq!(map.get(&"DEAD".parse::<TagUid>().unwrap()), Some(&"spool"));
    }
}
