//! Password-based key derivation (PBKDF2-HMAC-SHA256).

use {
    pbkdf2::pbkdf2_hmac,
    sha2::Sha256,
    std::fmt::{self, Debug},
    zeroize::Zeroize,
};

/// Length of the derived key: 256 bits, for AES-256.
pub const KEY_LEN: usize = 32;

/// Length of the salt accepted by [`derive_key`].
pub const SALT_LEN: usize = 16;

/// Fixed PBKDF2 iteration count. Part of the container format.
pub const KDF_ITERATIONS: u32 = 65_536;

/// Symmetric key derived from a password. Zeroized on drop.
pub struct DerivedKey([u8; KEY_LEN]);

impl Drop for DerivedKey {
    #[inline]
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl DerivedKey {
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Debug for DerivedKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey").finish_non_exhaustive()
    }
}

/// Derives the AES-256 key for `password` and `salt`.
///
/// Deterministic: the same password and salt always produce the same key.
/// Text passwords are used as their UTF-8 bytes.
#[must_use]
#[inline]
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> DerivedKey {
    derive_key_with_rounds(password, salt, KDF_ITERATIONS)
}

fn derive_key_with_rounds(password: &[u8], salt: &[u8], rounds: u32) -> DerivedKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut key);
    DerivedKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_published_test_vector() {
        // PBKDF2-HMAC-SHA256, P = "password", S = "salt", c = 1, dkLen = 32.
        let key = derive_key_with_rounds(b"password", b"salt", 1);
        assert_eq!(
            hex::encode(key.as_bytes()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b",
        );
        let key = derive_key_with_rounds(b"password", b"salt", 2);
        assert_eq!(
            hex::encode(key.as_bytes()),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43",
        );
    }

    #[test]
    fn deterministic() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_key(b"correct horse", &salt);
        let key2 = derive_key(b"correct horse", &salt);
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn depends_on_password_and_salt() {
        let key = derive_key(b"password-a", &[1u8; SALT_LEN]);
        let other_password = derive_key(b"password-b", &[1u8; SALT_LEN]);
        let other_salt = derive_key(b"password-a", &[2u8; SALT_LEN]);
        assert_ne!(key.as_bytes(), other_password.as_bytes());
        assert_ne!(key.as_bytes(), other_salt.as_bytes());
    }

    #[test]
    fn debug_is_redacted() {
        let key = derive_key(b"secret", &[0u8; SALT_LEN]);
        assert_eq!(format!("{key:?}"), "DerivedKey { .. }");
    }
}
