//! Request fingerprints for duplicate suppression.
//!
//! A fingerprint identifies a request by:
//! - Scene identifier
//! - Recipient address
//! - Parameter keys (sorted)
//!
//! Parameter *values* never contribute: two requests that differ only in a
//! verification code share a fingerprint, and no value is ever hashed or
//! stored.

use crate::domain::params::SafeParams;
use sha2::{Digest, Sha256};
use std::fmt;

/// One-way digest identifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute a fingerprint from request components.
    ///
    /// Keys are sorted and de-duplicated before hashing, so the input order is
    /// irrelevant. Each component is length-prefixed, so `("ab", "c")` and
    /// `("a", "bc")` do not collide.
    pub fn new<'a, I>(scene: &str, address: &str, param_keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keys: Vec<&str> = param_keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut hasher = Sha256::new();
        absorb(&mut hasher, scene);
        absorb(&mut hasher, address);
        hasher.update((keys.len() as u64).to_le_bytes());
        for key in keys {
            absorb(&mut hasher, key);
        }

        Fingerprint(hasher.finalize().into())
    }

    /// Fingerprint of a filtered request.
    pub fn of_request(scene: &str, address: &str, params: &SafeParams) -> Self {
        Self::new(scene, address, params.keys())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn absorb(hasher: &mut Sha256, part: &str) {
    hasher.update((part.len() as u64).to_le_bytes());
    hasher.update(part.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
