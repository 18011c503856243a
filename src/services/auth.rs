//! Authentication service
//!
//! Provides bcrypt password hashing, API key generation, and user
//! authentication.

use anyhow::{Context, Result};
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::user_repository::UserRepository;
use crate::models::User;

/// Valid bcrypt cost range; values outside are clamped
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Number of random bytes in a freshly generated API key
const API_KEY_BYTES: usize = 32;

/// Authentication service for credential management
pub struct AuthService {
    pool: SqlitePool,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(pool: SqlitePool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    /// Hash a secret with bcrypt at the given cost
    ///
    /// The cost is clamped into bcrypt's valid range rather than rejected,
    /// so a misconfigured cost degrades to the nearest safe value.
    pub fn hash_secret(secret: &str, cost: u32) -> Result<String> {
        let cost = cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST);
        bcrypt::hash(secret, cost).context("Failed to hash secret")
    }

    /// Verify a secret against a stored bcrypt hash
    ///
    /// Fails closed: a malformed stored hash verifies as false instead of
    /// surfacing an error to the caller.
    pub fn verify_secret(secret: &str, hash: &str) -> bool {
        bcrypt::verify(secret, hash).unwrap_or(false)
    }

    /// Hash a secret using this service's configured cost
    pub fn hash_password(&self, password: &str) -> Result<String> {
        Self::hash_secret(password, self.bcrypt_cost)
    }

    /// Authenticate a user by email and password
    ///
    /// Returns None for unknown email and wrong password alike. On
    /// success, the user's last-login timestamp is updated best-effort; a
    /// failure there is logged but never blocks the login.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let repo = UserRepository::new(&self.pool);

        let user = match repo.get_by_email(email).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        if !Self::verify_secret(password, &user.password_hash) {
            return Ok(None);
        }

        if let Err(e) = repo.update_last_login(user.id, Utc::now()).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }

        Ok(Some(user))
    }

    /// Rotate a user's password after verifying the current one
    ///
    /// Returns false for an unknown user and a wrong current password alike,
    /// so the caller reports both uniformly.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let repo = UserRepository::new(&self.pool);

        let user = match repo.get_by_id(user_id).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        if !Self::verify_secret(current_password, &user.password_hash) {
            return Ok(false);
        }

        let hash = self.hash_password(new_password)?;
        repo.update_password(user.id, &hash).await?;

        Ok(true)
    }
}

/// Generate a fresh API key
///
/// Returns the raw key (handed to the caller exactly once) and the
/// SHA-256 hex digest that gets persisted.
pub fn generate_api_key() -> (String, String) {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let digest = key_digest(&raw);
    (raw, digest)
}

/// SHA-256 hex digest of a raw API key
///
/// API keys are high-entropy random values, so a fast digest is
/// sufficient for lookup; bcrypt is reserved for low-entropy passwords.
pub fn key_digest(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_secret() {
        let hash = AuthService::hash_secret("correct horse", 4).unwrap();
        assert!(AuthService::verify_secret("correct horse", &hash));
        assert!(!AuthService::verify_secret("battery staple", &hash));
    }

    #[test]
    fn test_cost_is_clamped() {
        // cost 0 is below bcrypt's minimum; clamping makes it valid
        assert!(AuthService::hash_secret("pw", 0).is_ok());
    }

    #[test]
    fn test_verify_fails_closed_on_garbage_hash() {
        assert!(!AuthService::verify_secret("pw", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_generated_keys_are_unique_and_digestible() {
        let (raw_a, digest_a) = generate_api_key();
        let (raw_b, digest_b) = generate_api_key();
        assert_ne!(raw_a, raw_b);
        assert_ne!(digest_a, digest_b);
        assert_eq!(key_digest(&raw_a), digest_a);
        // sha256 hex
        assert_eq!(digest_a.len(), 64);
    }
}
