use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::Serialize;
use serde_json::{json, Value};
use warp::{
    http::StatusCode,
    reject::Reject,
};

/// Store failure, classified by what the caller can do about it.
#[derive(Debug)]
pub enum QueryError {
    UniqueViolation(String),
    ForeignKeyViolation(String),
    CheckViolation(String),
    NotFound,
    Other(String),
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self::Other(info)
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::UniqueViolation(e.message().to_string())
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                Self::ForeignKeyViolation(e.message().to_string())
            }
            sqlx::Error::Database(e) if e.is_check_violation() => {
                Self::CheckViolation(e.message().to_string())
            }
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::AnyDriverError(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new("Pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::new("Pool closed".to_string()),
            sqlx::Error::WorkerCrashed => Self::new("Worker crashed".to_string()),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new("Unknown error".to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::UniqueViolation(info) => {
                log::debug!("unique violation: {info}");
                ApiError::Conflict("Object already exists".to_string())
            }
            QueryError::ForeignKeyViolation(info) => {
                log::debug!("foreign key violation: {info}");
                ApiError::Conflict("Referenced object does not exist".to_string())
            }
            QueryError::CheckViolation(info) => {
                log::debug!("check violation: {info}");
                ApiError::Conflict("Value violates a constraint".to_string())
            }
            QueryError::NotFound => ApiError::NotFound("Not found".to_string()),
            QueryError::Other(info) => {
                log::error!("query failed: {info}");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

/// Field name to messages, rendered as `{"field": ["message"]}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request ({0})")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthorized("Authentication credentials were not provided".to_string())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You don't have permission to perform this action".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) | ApiError::EmptyCart => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!(errors),
            other => json!({ "detail": other.to_string() }),
        }
    }
}

impl Reject for ApiError {}
