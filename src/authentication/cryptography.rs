use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

use crate::error::ApiError;

fn hash_blocking(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            log::error!("Failed to hash password: {e}");
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string())
}

fn verify_blocking(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let argon2 = Argon2::default();
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
        log::error!("Stored password hash is malformed: {e}");
        ApiError::Internal("Failed to verify password".to_string())
    })?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn join_failed(e: tokio::task::JoinError) -> ApiError {
    log::error!("Password task failed: {e}");
    ApiError::Internal("Failed to process password".to_string())
}

/// Argon2 is CPU bound, so hashing runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, ApiError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(join_failed)?
}

pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let (password, password_hash) = (password.to_string(), password_hash.to_string());
    tokio::task::spawn_blocking(move || verify_blocking(&password, &password_hash))
        .await
        .map_err(join_failed)?
}

/// Random alphanumeric token for short links.
pub fn generate_short_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_round_trip() {
        let hash = hash_password("hunter22").await.unwrap();

        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).await.unwrap());
        assert!(!verify_password("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-hash").await.is_err());
    }

    #[tokio::test]
    async fn hashing_leaves_the_runtime_free() {
        use std::sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        };

        // single-threaded runtime: the task only runs if hashing yields
        let ticked = Arc::new(AtomicBool::new(false));
        let flag = ticked.clone();
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        let hash = hash_password("hunter22").await.unwrap();
        assert!(ticked.load(Ordering::SeqCst));

        ticked.store(false, Ordering::SeqCst);
        let flag = ticked.clone();
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        assert!(verify_password("hunter22", &hash).await.unwrap());
        assert!(ticked.load(Ordering::SeqCst));
    }

    #[test]
    fn short_tokens_are_alphanumeric() {
        let token = generate_short_token(8);

        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_short_token(8));
    }
}
