use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use chrono::Duration;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub mod jwt;

pub use jwt::{Claims, JwtKeys};

pub struct AuthService {
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(secret: &str, token_ttl_days: i64) -> Self {
        Self {
            keys: JwtKeys::new(secret, Duration::days(token_ttl_days)),
        }
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String> {
        self.keys.sign(user_id)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        self.keys.verify(token)
    }
}
