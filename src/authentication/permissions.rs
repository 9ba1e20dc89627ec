use warp::http::Method;

use crate::{error::ApiError, jwt::SessionData, schema::Id, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
        ],
    ),
];

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnFavorites,
    ManageOwnRecipes,
    ManageOwnSubscriptions,

    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| role == &session.role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Reads pass for everyone; writes need the resource's author or an admin.
pub fn is_admin_author_or_read_only(
    method: &Method,
    session: Option<&SessionData>,
    author_id: Id,
) -> Result<(), ApiError> {
    if is_safe_method(method) {
        return Ok(());
    }

    let session = session.ok_or_else(ApiError::unauthenticated)?;
    if ActionType::ManageAllRecipes.authenticate(session) {
        return Ok(());
    }

    session.authenticate(ActionType::ManageOwnRecipes)?;
    if session.user_id != author_id {
        return Err(ApiError::forbidden());
    }

    Ok(())
}
