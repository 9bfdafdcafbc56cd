//! Verification code digests.

use sha2::{Digest, Sha256};

/// Digest a verification code for storage.
///
/// Returns the lowercase hex SHA-256 of `code` followed by `salt`. Callers
/// store the digest and compare digests on verification; neither the code nor
/// the digest should be logged.
pub fn hash_verification_code(code: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            hash_verification_code("ab", "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_salt_changes_digest() {
        assert_ne!(
            hash_verification_code("482913", "salt-a"),
            hash_verification_code("482913", "salt-b")
        );
    }

    #[test]
    fn test_digest_does_not_contain_code() {
        let digest = hash_verification_code("482913", "s");
        assert_eq!(digest.len(), 64);
        assert!(!digest.contains("482913"));
    }
}
