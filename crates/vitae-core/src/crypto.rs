use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Number of random bytes in a disclosure salt.
pub const SALT_LEN: usize = 16;

/// Generate a disclosure salt: 16 bytes from the OS entropy source,
/// base64url-encoded without padding (22 characters).
///
/// Fails only when the entropy source itself fails.
pub fn generate_salt() -> CoreResult<String> {
    let mut bytes = [0u8; SALT_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| CoreError::EntropyUnavailable)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 over `data`, base64url-encoded without padding.
pub fn sha256_b64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_length_and_alphabet() {
        let salt = generate_salt().unwrap();
        assert_eq!(salt.len(), 22);
        assert!(!salt.contains('='));
        assert!(!salt.contains('+'));
        assert!(!salt.contains('/'));
        assert_eq!(URL_SAFE_NO_PAD.decode(&salt).unwrap().len(), SALT_LEN);
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }

    #[test]
    fn test_sha256_b64url_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_b64url(b"abc"),
            "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0"
        );
    }

    #[test]
    fn test_sha256_b64url_deterministic() {
        assert_eq!(sha256_b64url(b"vitae"), sha256_b64url(b"vitae"));
        assert_ne!(sha256_b64url(b"vitae"), sha256_b64url(b"vitae "));
    }
}
