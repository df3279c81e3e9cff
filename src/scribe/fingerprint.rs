//! Content fingerprints used for dirty tracking.
//!
//! A fingerprint stands for "content as of the last successful persist". It is
//! only ever compared for equality, never used for integrity.

use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(content: &str) -> Self {
        let digest = Sha256::digest(content.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn matches(&self, content: &str) -> bool {
        *self == Self::of(content)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_fingerprint() {
        assert_eq!(Fingerprint::of("hello"), Fingerprint::of("hello"));
        assert!(Fingerprint::of("hello").matches("hello"));
    }

    #[test]
    fn different_content_different_fingerprint() {
        assert_ne!(Fingerprint::of("hello"), Fingerprint::of("hello "));
        assert!(!Fingerprint::of("").matches("\n"));
    }

    #[test]
    fn hex_is_full_sha256() {
        let hex = Fingerprint::of("").to_hex();
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
