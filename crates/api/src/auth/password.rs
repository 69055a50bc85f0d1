//! Argon2id password hashing and the signup password rules.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Upper bound so a single login cannot make Argon2 chew on megabytes.
pub const PASSWORD_MAX_LENGTH: usize = 256;

/// Hash with a random salt. The PHC string embeds algorithm, params and salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// `Ok(false)` on mismatch; `Err` only for an unparseable stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Signup rules: length bounds, and the password may not be the username.
pub fn check_password(password: &str, username: &str, min_length: usize) -> Result<(), String> {
    let len = password.chars().count();
    if len < min_length {
        return Err(format!("Password must be at least {min_length} characters long"));
    }
    if len > PASSWORD_MAX_LENGTH {
        return Err(format!("Password must be at most {PASSWORD_MAX_LENGTH} characters long"));
    }
    if password.eq_ignore_ascii_case(username) {
        return Err("Password must not match the username".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse-battery").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse-battery", &hash).unwrap());
        assert!(!verify_password("wrong-horse", &hash).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password("short", "cat", 8).unwrap_err().contains("at least 8"));
        assert!(check_password("whiskers", "Whiskers", 8).is_err());
        assert!(check_password(&"x".repeat(300), "cat", 8).is_err());
        assert!(check_password("tuna-for-dinner", "cat", 8).is_ok());
    }
}
