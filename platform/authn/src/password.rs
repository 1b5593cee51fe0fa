use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand_core::OsRng;

use crate::{AuthnError, AuthnResult};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AuthnResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthnError::WeakPassword);
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthnError::Hash(err.to_string()))
}

/// `false` for a wrong password and for an unparsable stored hash alike.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
