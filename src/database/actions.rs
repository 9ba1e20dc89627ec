pub mod carts;
pub mod ingredients;
pub mod links;
pub mod marks;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;

#[cfg(test)]
pub(crate) mod fixtures;

use super::{error::ApiError, pagination::PageQuery};

/// Pages past the last one are a 404, the first page may be empty.
pub(crate) fn ensure_page<T>(rows: &[T], page: PageQuery) -> Result<(), ApiError> {
    if rows.is_empty() && page.page > 1 {
        return Err(ApiError::NotFound("Invalid page".to_string()));
    }
    Ok(())
}

pub(crate) fn begin_failed(e: sqlx::Error) -> ApiError {
    log::error!("Could not start transaction: {e}");
    ApiError::Internal("Could not start transaction".to_string())
}

pub(crate) fn commit_failed(e: sqlx::Error) -> ApiError {
    log::error!("Could not commit transaction: {e}");
    ApiError::Internal("Could not commit transaction".to_string())
}
