use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::error::AppError;

/// hash_password
///
/// Produces an Argon2id PHC string with a fresh random salt. This is the only
/// form a password is ever stored in. Runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Upstream(format!("password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| AppError::Upstream(format!("password hashing task failed: {}", e)))?
}

/// verify_password
///
/// Checks a login attempt against a stored hash on the blocking pool. A
/// malformed hash counts as a mismatch.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    task::spawn_blocking(move || match PasswordHash::new(&stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash could not be parsed: {}", e);
            false
        }
    })
    .await
    .map_err(|e| AppError::Upstream(format!("password verification task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_verifies_only_the_original_password() {
        let hash = hash_password("monkey".to_string()).await.unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("monkey".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("donkey".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_password_gets_distinct_salts() {
        let a = hash_password("monkey".to_string()).await.unwrap();
        let b = hash_password("monkey".to_string()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_garbage_hash_never_verifies() {
        let verified = verify_password("monkey".to_string(), "not-a-phc-string".to_string())
            .await
            .unwrap();
        assert!(!verified);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_the_runtime_free() {
        use std::sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        };

        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let hashing = tokio::spawn(async move {
            let hash = hash_password("monkey".to_string()).await;
            flag.store(true, Ordering::SeqCst);
            hash
        });

        // The hashing task is polled here; it must park rather than hold the
        // only runtime thread until the hash is done.
        tokio::task::yield_now().await;
        assert!(!done.load(Ordering::SeqCst));

        assert!(hashing.await.unwrap().unwrap().starts_with("$argon2"));
    }
}
