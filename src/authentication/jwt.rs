use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::Config;
use crate::error::ApiError;
use crate::schema::{Id, User, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, lifetime_hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(lifetime_hours)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The authenticated requester, passed explicitly into every operation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::forbidden());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            role: value.role,
        }
    }
}

fn signing_key(config: &Config) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(config.secret_key.as_bytes()).map_err(|e| {
        log::error!("Invalid signing key: {e}");
        ApiError::Internal("Invalid signing key".to_string())
    })
}

pub fn generate_jwt_session(user: &User, config: &Config) -> Result<String, ApiError> {
    let key = signing_key(config)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        config.token_lifetime_hours,
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session: {e}");
        ApiError::Internal("Failed to create session".to_string())
    })
}

pub fn verify_jwt_session(token: &str, config: &Config) -> Result<JwtSessionData, ApiError> {
    let key = signing_key(config)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::Unauthorized("Invalid session; Invalid token".to_string()))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(ApiError::Unauthorized(
            "Invalid session; Token expired".to_string(),
        ));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 4,
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Cook".to_string(),
            password: String::new(),
            role,
            avatar: None,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let config = Config::development();
        let token = generate_jwt_session(&user(UserRole::Admin), &config).unwrap();

        let session: SessionData = verify_jwt_session(&token, &config).unwrap().into();
        assert_eq!(session.user_id, 4);
        assert_eq!(session.username, "cook");
        assert_eq!(session.role, UserRole::Admin);
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let config = Config::development();
        let token = generate_jwt_session(&user(UserRole::User), &config).unwrap();

        let other = Config {
            secret_key: "another-secret".to_string(),
            ..Config::development()
        };
        assert!(matches!(
            verify_jwt_session(&token, &other),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config {
            token_lifetime_hours: -1,
            ..Config::development()
        };
        let token = generate_jwt_session(&user(UserRole::User), &config).unwrap();

        assert!(verify_jwt_session(&token, &config).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_jwt_session("abc.def", &Config::development()).is_err());
    }
}
