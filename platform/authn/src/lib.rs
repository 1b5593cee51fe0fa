//! Platform authentication.
//!
//! [`AuthProvider`] is the seam to whatever actually checks credentials; the
//! bundled [`DbAuthProvider`] verifies argon2 hashes stored next to profiles.
//! [`AuthContext`] owns the signed-in user on the client side and broadcasts
//! every change so dependants (the menu permission cache) can follow the
//! current role.

mod context;
mod password;
mod provider;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use platform_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use context::AuthContext;
pub use password::{MIN_PASSWORD_LEN, hash_password, verify_password};
pub use provider::{DbAuthProvider, authenticate, load_user, register};

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is disabled")]
    InactiveAccount,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] DbError),
}

pub type AuthnResult<T> = Result<T, AuthnError>;

/// Signed-in user as seen by the rest of the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<entity::profiles::Model> for User {
    fn from(profile: entity::profiles::Model) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            role: profile.role,
            created_at: profile.created_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SignUpCredentials {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Backend that owns the actual session.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, credentials: &LoginCredentials) -> AuthnResult<User>;
    async fn sign_up(&self, credentials: &SignUpCredentials) -> AuthnResult<User>;
    async fn sign_out(&self) -> AuthnResult<()>;
    /// The user behind the provider's current session, if any.
    async fn current_user(&self) -> AuthnResult<Option<User>>;
}
