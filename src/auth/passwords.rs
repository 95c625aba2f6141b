use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

/// One-way credential hashing. Stored hashes are PHC strings; the plaintext
/// secret never leaves this module once verified.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        // 19 MiB / 2 passes / 1 lane
        let params = Params::new(19 * 1024, 2, 1, None).map_err(AuthError::from)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Constant-result verification: `Ok(false)` on mismatch, `Err` only for
    /// unreadable hashes.
    pub fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_password() {
        let service = PasswordService::new().expect("password service");
        let hash = service.hash_password("1111").expect("hash");

        assert!(service.verify_password("1111", &hash).expect("verify"));
        assert!(!service.verify_password("2222", &hash).expect("verify"));
    }

    #[test]
    fn salts_make_hashes_unique() {
        let service = PasswordService::new().expect("password service");
        let first = service.hash_password("1111").expect("hash");
        let second = service.hash_password("1111").expect("hash");
        assert_ne!(first, second);
    }
}
