//! Password hashing for the internal store and LDAP password encodings

use base64::{engine::general_purpose::STANDARD, Engine};
use digest::Digest;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Scheme tag written in front of stored hashes
pub const PASSWORD_SCHEME: &str = "hmac-sha256";

/// HMAC rounds applied when stretching a password
pub const PASSWORD_HASH_ROUNDS: u32 = 10_000;

const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
///
/// Format: `hmac-sha256$<rounds>$<salt hex>$<digest hex>`
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    let digest = stretch(&salt, password.as_bytes(), PASSWORD_HASH_ROUNDS).finalize();

    format!(
        "{}${}${}${}",
        PASSWORD_SCHEME,
        PASSWORD_HASH_ROUNDS,
        hex::encode(salt),
        hex::encode(digest.into_bytes())
    )
}

/// Check a password against a hash produced by [`hash_password`].
///
/// Malformed hashes never verify. The final comparison is constant time.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    if scheme != PASSWORD_SCHEME {
        return false;
    }

    let (Ok(rounds), Ok(salt), Ok(expected)) =
        (rounds.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };

    if rounds == 0 {
        return false;
    }

    stretch(&salt, password.as_bytes(), rounds)
        .verify_slice(&expected)
        .is_ok()
}

/// Iterated HMAC keyed by the salt; returns the last round unfinalized
fn stretch(salt: &[u8], password: &[u8], rounds: u32) -> HmacSha256 {
    let mut block = password.to_vec();
    for _ in 1..rounds {
        let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC can take key of any size");
        mac.update(&block);
        block = mac.finalize().into_bytes().to_vec();
    }

    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC can take key of any size");
    mac.update(&block);
    mac
}

/// LDAP `{SHA}` password encoding: base64 of the SHA-1 digest
pub fn ldap_sha_password(secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(secret.as_bytes());
    format!("{{SHA}}{}", STANDARD.encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("koala");
        assert!(hash.starts_with("hmac-sha256$10000$"));
        assert!(verify_password("koala", &hash));
        assert!(!verify_password("koaladsada", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("koala"), hash_password("koala"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("koala", ""));
        assert!(!verify_password("koala", "koala"));
        assert!(!verify_password("koala", "hmac-sha256$0$00$00"));
        assert!(!verify_password("koala", "md5$1$00$00"));
        assert!(!verify_password("koala", "hmac-sha256$1$zz$00"));
    }

    #[test]
    fn test_ldap_sha_encoding() {
        // echo -n password | openssl sha1 -binary | base64
        assert_eq!(
            ldap_sha_password("password"),
            "{SHA}W6ph5Mm5Pz8GgiULbPgzG37mj9g="
        );
    }
}
