//! Content fingerprints for detecting checklist re-imports.
//!
//! The hash covers the raw uploaded bytes, so any edit to a checklist (a
//! status change, a new comment) yields a new fingerprint while a byte-for-byte
//! re-upload yields the same one.

use sha2::{Digest, Sha256};

/// SHA-256 of the file content, hex-encoded.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_hash() {
        assert_eq!(content_hash(b"<CHECKLIST/>"), content_hash(b"<CHECKLIST/>"));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(content_hash(b"<STATUS>Open</STATUS>"), content_hash(b"<STATUS>NotAFinding</STATUS>"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = content_hash(b"");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
