use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use platform_authn::AuthnError;
use platform_db::DbError;
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "internal api error");
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound { .. } => Self::NotFound(value.to_string()),
            DbError::Conflict { .. } => Self::Conflict(value.to_string()),
            DbError::Invalid(message) => Self::InvalidInput(message),
            other => Self::internal(other.into()),
        }
    }
}

impl From<AuthnError> for ApiError {
    fn from(value: AuthnError) -> Self {
        match value {
            AuthnError::InvalidCredentials | AuthnError::InactiveAccount => Self::Unauthorized,
            AuthnError::EmailTaken => Self::Conflict(value.to_string()),
            AuthnError::InvalidEmail | AuthnError::WeakPassword => {
                Self::InvalidInput(value.to_string())
            }
            AuthnError::Store(err) => err.into(),
            AuthnError::Hash(_) => Self::internal(value.into()),
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::InvalidInput(_) = self {
            err = err.extend_with(|_err, e| {
                e.set("type", "BAD_REQUEST");
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

/// Map a domain result into a GraphQL result carrying an error `code`.
pub fn gql<T, E: Into<ApiError>>(result: Result<T, E>) -> async_graphql::Result<T> {
    result.map_err(|err| err.into().extend())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;

    fn code(err: &Error) -> Option<Value> {
        err.extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(code(&err), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn db_not_found_keeps_its_message() {
        let err = gql::<(), _>(Err(DbError::NotFound {
            entity: "menu",
            id: "reports".into(),
        }))
        .unwrap_err();
        assert_eq!(err.message, "menu reports not found");
        assert_eq!(code(&err), Some(Value::from("NOT_FOUND")));
    }

    #[test]
    fn bad_credentials_map_to_unauthorized() {
        let err = gql::<(), _>(Err(AuthnError::InvalidCredentials)).unwrap_err();
        assert_eq!(code(&err), Some(Value::from("UNAUTHORIZED")));
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = gql::<(), _>(Err(DbError::Invalid("role must not be blank".into()))).unwrap_err();
        let kind = err
            .extensions
            .as_ref()
            .and_then(|map| map.get("type"))
            .cloned();
        assert_eq!(kind, Some(Value::from("BAD_REQUEST")));
    }
}
