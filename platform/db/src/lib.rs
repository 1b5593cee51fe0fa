//! Database primitives: connection settings plus the repositories that sit on
//! top of the sea-orm entities.

pub mod menus;
pub mod permissions;
pub mod profiles;
pub mod sessions;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;

pub use menus::{MenuInput, MenuObjectInput, MenuObjectPatch, MenuPatch, MenuRepository};
pub use permissions::{MenuPermission, MenuPermissionUpdate, PermissionRepository};
pub use profiles::{NewProfile, ProfilePatch, ProfileRepository};

/// Shared connection handle. Cloning is cheap; the pool lives behind it.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing")]
    MissingUrl,
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} {id} already exists")]
    Conflict { entity: &'static str, id: String },
    #[error(transparent)]
    Orm(#[from] DbErr),
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    8
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(default_url_key())
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// Settings read from `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(max) = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
        {
            settings.max_connections = max;
        }
        settings
    }

    /// Settings pinned to an explicit url, bypassing the environment.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn database_url(&self) -> DbResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl)
    }
}

/// Open a pooled connection described by `settings`.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .sqlx_logging(false);
    let pool = Database::connect(options).await?;
    tracing::debug!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins_over_environment() {
        let settings = DatabaseSettings::with_url("sqlite::memory:");
        assert_eq!(settings.database_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn missing_env_key_reports_missing_url() {
        let settings = DatabaseSettings::new("MENU_GUARD_TEST_UNSET_DATABASE_URL");
        assert!(matches!(settings.database_url(), Err(DbError::MissingUrl)));
    }
}
