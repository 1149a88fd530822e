//! # SHA-256 Digests
//!
//! Single entry point for hashing in the workspace. Transaction ids, address
//! hashes and key-derivation seeds all go through [`sha256`] or
//! [`sha256_concat`] so the hash function is defined in exactly one place.

use sha2::{Digest, Sha256};

/// SHA-256 of a byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// SHA-256 over the concatenation of several slices, without allocating.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn concat_matches_single_buffer() {
        assert_eq!(sha256_concat(&[b"agree", b"ments"]), sha256(b"agreements"));
    }
}
