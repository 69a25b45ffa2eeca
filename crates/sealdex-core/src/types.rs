use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SealdexError, SealdexResult};

/// An integer tag on a master-secret epoch.
///
/// Generations start at [`KeyGen::FIRST_VALID`] and only ever grow; the
/// special public generation carries its own marker value. The offset of a
/// generation inside an append-only key vector is `gen - FIRST_VALID`, with
/// the public generation mapped to slot 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyGen(pub i64);

impl KeyGen {
    /// The first generation a freshly created folder uses.
    pub const FIRST_VALID: KeyGen = KeyGen(1);

    /// Marker generation for unencrypted (public) folders.
    pub const PUBLIC: KeyGen = KeyGen(-1);

    /// Slot of this generation in a key vector ordered by generation.
    pub fn offset(self) -> SealdexResult<usize> {
        if self == Self::PUBLIC {
            return Ok(0);
        }
        if self.0 < Self::FIRST_VALID.0 {
            return Err(SealdexError::InvalidKeyGen(self.0));
        }
        Ok((self.0 - Self::FIRST_VALID.0) as usize)
    }

    pub fn next(self) -> KeyGen {
        KeyGen(self.0 + 1)
    }
}

impl fmt::Display for KeyGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque folder identifier assigned by the hosting filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(pub String);

impl FolderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        FolderId(s.to_string())
    }
}

/// A document identifier: the URL-safe base64 encoding of the encrypted
/// pathname record. Stable for a given (generation, pathname, key) triple.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_gen_offsets() {
        assert_eq!(KeyGen::FIRST_VALID.offset().unwrap(), 0);
        assert_eq!(KeyGen(3).offset().unwrap(), 2);
        assert_eq!(KeyGen::PUBLIC.offset().unwrap(), 0);
    }

    #[test]
    fn test_key_gen_invalid_offsets() {
        assert!(matches!(
            KeyGen(0).offset(),
            Err(SealdexError::InvalidKeyGen(0))
        ));
        assert!(matches!(
            KeyGen(-7).offset(),
            Err(SealdexError::InvalidKeyGen(-7))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(KeyGen(4).to_string(), "4");
        assert_eq!(FolderId::from("tlf1").to_string(), "tlf1");
    }
}
