use async_trait::async_trait;
use platform_db::profiles::{insert_profile, normalize_email};
use platform_db::{DbError, DbPool, NewProfile, ProfileRepository, sessions};
use sea_orm::TransactionTrait;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    AuthProvider, AuthnError, AuthnResult, LoginCredentials, SignUpCredentials, User,
    hash_password, verify_password,
};

/// Check an email/password pair against stored credentials.
#[instrument(name = "authn.authenticate", skip_all)]
pub async fn authenticate(pool: &DbPool, credentials: &LoginCredentials) -> AuthnResult<User> {
    let profiles = ProfileRepository::new(pool.clone());
    let profile = profiles
        .find_by_email(&credentials.email)
        .await?
        .ok_or(AuthnError::InvalidCredentials)?;
    let stored = sessions::password_hash(pool, profile.id)
        .await?
        .ok_or(AuthnError::InvalidCredentials)?;
    if !verify_password(&credentials.password, &stored) {
        return Err(AuthnError::InvalidCredentials);
    }
    if !profile.is_active {
        return Err(AuthnError::InactiveAccount);
    }
    Ok(User::from(profile))
}

/// Create a profile with `role` plus its password credential. Both rows are
/// written in one transaction.
#[instrument(name = "authn.register", skip(pool, credentials))]
pub async fn register(
    pool: &DbPool,
    credentials: &SignUpCredentials,
    role: &str,
) -> AuthnResult<User> {
    if normalize_email(&credentials.email).is_none() {
        return Err(AuthnError::InvalidEmail);
    }
    let hash = hash_password(&credentials.password)?;
    let name = credentials
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let txn = pool.begin().await.map_err(DbError::from)?;
    let profile = insert_profile(
        &txn,
        NewProfile {
            email: credentials.email.clone(),
            name,
            role: Some(role.to_string()),
        },
    )
    .await
    .map_err(|err| match err {
        DbError::Conflict { .. } => AuthnError::EmailTaken,
        other => AuthnError::Store(other),
    })?;
    sessions::set_password_hash(&txn, profile.id, &hash).await?;
    txn.commit().await.map_err(DbError::from)?;
    info!(profile = %profile.id, "profile registered");
    Ok(User::from(profile))
}

/// Fresh view of a user; `None` once the profile is gone or disabled.
pub async fn load_user(pool: &DbPool, id: Uuid) -> AuthnResult<Option<User>> {
    match ProfileRepository::new(pool.clone()).get_profile(id).await {
        Ok(profile) if profile.is_active => Ok(Some(User::from(profile))),
        Ok(_) | Err(DbError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Database-backed provider holding one in-process session.
pub struct DbAuthProvider {
    pool: DbPool,
    default_role: String,
    signed_in: RwLock<Option<Uuid>>,
}

impl DbAuthProvider {
    pub fn new(pool: DbPool, default_role: impl Into<String>) -> Self {
        Self {
            pool,
            default_role: default_role.into(),
            signed_in: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AuthProvider for DbAuthProvider {
    async fn sign_in(&self, credentials: &LoginCredentials) -> AuthnResult<User> {
        let user = authenticate(&self.pool, credentials).await?;
        *self.signed_in.write().await = Some(user.id);
        Ok(user)
    }

    async fn sign_up(&self, credentials: &SignUpCredentials) -> AuthnResult<User> {
        let user = register(&self.pool, credentials, &self.default_role).await?;
        *self.signed_in.write().await = Some(user.id);
        Ok(user)
    }

    async fn sign_out(&self) -> AuthnResult<()> {
        self.signed_in.write().await.take();
        Ok(())
    }

    async fn current_user(&self) -> AuthnResult<Option<User>> {
        let Some(id) = *self.signed_in.read().await else {
            return Ok(None);
        };
        load_user(&self.pool, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectionTrait, Database};

    async fn pool() -> DbPool {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        pool
    }

    fn signup(email: &str) -> SignUpCredentials {
        SignUpCredentials {
            email: email.into(),
            password: "hunter22".into(),
            name: Some(" Ada ".into()),
        }
    }

    fn login(email: &str, password: &str) -> LoginCredentials {
        LoginCredentials {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn registered_user_can_authenticate() {
        let pool = pool().await;
        let created = register(&pool, &signup("ada@example.test"), "user")
            .await
            .unwrap();
        assert_eq!(created.role.as_deref(), Some("user"));
        assert_eq!(created.name.as_deref(), Some("Ada"));

        let user = authenticate(&pool, &login("ADA@example.test", "hunter22"))
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let pool = pool().await;
        register(&pool, &signup("ada@example.test"), "user")
            .await
            .unwrap();
        assert!(matches!(
            authenticate(&pool, &login("ada@example.test", "nope-nope")).await,
            Err(AuthnError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&pool, &login("bob@example.test", "hunter22")).await,
            Err(AuthnError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn disabled_profile_cannot_sign_in() {
        let pool = pool().await;
        let user = register(&pool, &signup("ada@example.test"), "user")
            .await
            .unwrap();
        ProfileRepository::new(pool.clone())
            .set_profile_active(user.id, false)
            .await
            .unwrap();
        assert!(matches!(
            authenticate(&pool, &login("ada@example.test", "hunter22")).await,
            Err(AuthnError::InactiveAccount)
        ));
        assert_eq!(load_user(&pool, user.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let pool = pool().await;
        register(&pool, &signup("ada@example.test"), "user")
            .await
            .unwrap();
        assert!(matches!(
            register(&pool, &signup("ada@example.test"), "user").await,
            Err(AuthnError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn failed_credential_write_leaves_no_profile() {
        let pool = pool().await;
        pool.execute_unprepared("DROP TABLE credentials").await.unwrap();

        let err = register(&pool, &signup("ada@example.test"), "user")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthnError::Store(_)));
        assert!(ProfileRepository::new(pool.clone())
            .find_by_email("ada@example.test")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn provider_session_follows_sign_in_and_out() {
        let provider = DbAuthProvider::new(pool().await, "user");
        assert_eq!(provider.current_user().await.unwrap(), None);

        let user = provider.sign_up(&signup("ada@example.test")).await.unwrap();
        assert_eq!(provider.current_user().await.unwrap(), Some(user));

        provider.sign_out().await.unwrap();
        assert_eq!(provider.current_user().await.unwrap(), None);
    }
}
