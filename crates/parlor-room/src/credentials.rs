//! Password gate and client pseudonyms.
//!
//! The coordinator never hashes or compares passwords itself; it goes
//! through the [`PasswordScheme`] trait, so deployments can plug in
//! whatever primitive they trust. [`SaltedDigest`] is the built-in
//! default.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::ConnectionId;

/// An opaque credential pair: turn a password into a storable credential
/// and check a password against one.
///
/// Implementations must be deterministic per credential: `verify` must
/// accept exactly the passwords `hash` was called with.
pub trait PasswordScheme: Send + Sync + 'static {
    /// Derives a credential from a plaintext password.
    fn hash(&self, password: &str) -> String;

    /// Checks a plaintext password against a stored credential.
    fn verify(&self, credential: &str, password: &str) -> bool;
}

/// Default scheme: a random 16-byte salt and a SHA-256 digest, stored as
/// `salt:digest` in hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedDigest;

impl SaltedDigest {
    fn digest(salt: &[u8], password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl PasswordScheme for SaltedDigest {
    fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; 16];
        rand::rng().fill(&mut salt);
        format!("{}:{}", hex::encode(salt), Self::digest(&salt, password))
    }

    fn verify(&self, credential: &str, password: &str) -> bool {
        let Some((salt_hex, digest)) = credential.split_once(':') else {
            return false;
        };
        let Ok(salt) = hex::decode(salt_hex) else {
            return false;
        };
        Self::digest(&salt, password) == digest
    }
}

/// A stable pseudonymous identifier for a connection: the hex SHA-256 of
/// its id. Sent to clients instead of the raw connection identifier.
pub fn client_pseudonym(conn: ConnectionId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(conn.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify_round_trip() {
        let scheme = SaltedDigest;
        let credential = scheme.hash("secret");
        assert!(scheme.verify(&credential, "secret"));
        assert!(!scheme.verify(&credential, "Secret"));
        assert!(!scheme.verify(&credential, ""));
    }

    #[test]
    fn test_hash_is_salted() {
        let scheme = SaltedDigest;
        assert_ne!(scheme.hash("secret"), scheme.hash("secret"));
    }

    #[test]
    fn test_verify_rejects_malformed_credentials() {
        let scheme = SaltedDigest;
        assert!(!scheme.verify("", "secret"));
        assert!(!scheme.verify("no-separator", "secret"));
        assert!(!scheme.verify("zz:zz", "secret"));
    }

    #[test]
    fn test_pseudonym_is_stable_and_opaque() {
        let conn = ConnectionId::new(7);
        let a = client_pseudonym(conn);
        let b = client_pseudonym(conn);
        assert_eq!(a, b);
        assert_ne!(a, client_pseudonym(ConnectionId::new(8)));
        assert_eq!(a.len(), 64);
        assert_ne!(a, conn.to_string());
    }
}
