//! SHA-256 digests for client fingerprints and token bindings.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Hash a client-supplied value (IP address, user-agent) with a server-side
/// salt so raw values never reach the database.
///
/// An empty value hashes to an empty string: there is nothing to protect and
/// an empty column is easier to spot than the digest of `""`.
pub fn hash_client_value(salt: &str, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"|");
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn client_hash_depends_on_salt() {
        let a = hash_client_value("salt-a", "203.0.113.7");
        let b = hash_client_value("salt-b", "203.0.113.7");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains("203.0.113.7"));
    }

    #[test]
    fn client_hash_of_empty_value_is_empty() {
        assert_eq!(hash_client_value("salt", ""), "");
    }
}
