use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{config::Config, error::ApiError};

/// Accepts `Token <jwt>` and `Bearer <jwt>`.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token)
    } else {
        None
    }
}

pub fn with_session(
    config: Arc<Config>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let config = config.clone();
        async move {
            let token = match header.as_deref().and_then(parse_authorization) {
                Some(token) => token,
                None => return Err(reject::custom(ApiError::unauthenticated())),
            };

            verify_jwt_session(token, &config)
                .map(SessionData::from)
                .map_err(reject::custom)
        }
    })
}

/// Like [`with_session`], but anonymous and invalid credentials yield `None`.
pub fn with_possible_session(
    config: Arc<Config>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header
            .as_deref()
            .and_then(parse_authorization)
            .and_then(|token| verify_jwt_session(token, &config).ok())
            .map(SessionData::from)
    })
}
