//! Password credentials and server-side sessions.

use chrono::{Duration, Utc};
use entity::{credentials, sessions};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use tracing::debug;
use uuid::Uuid;

use crate::{DbPool, DbResult};

/// Store (or replace) the password hash of a profile.
pub async fn set_password_hash<C: ConnectionTrait>(
    db: &C,
    profile_id: Uuid,
    hash: &str,
) -> DbResult<()> {
    let model = credentials::ActiveModel {
        profile_id: Set(profile_id),
        password_hash: Set(hash.to_string()),
        updated_at: Set(Utc::now().into()),
    };
    credentials::Entity::insert(model)
        .on_conflict(
            OnConflict::column(credentials::Column::ProfileId)
                .update_columns([
                    credentials::Column::PasswordHash,
                    credentials::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn password_hash(pool: &DbPool, profile_id: Uuid) -> DbResult<Option<String>> {
    Ok(credentials::Entity::find_by_id(profile_id)
        .one(pool)
        .await?
        .map(|row| row.password_hash))
}

pub async fn create_session(
    pool: &DbPool,
    profile_id: Uuid,
    ttl: Duration,
) -> DbResult<sessions::Model> {
    let now = Utc::now();
    let model = sessions::ActiveModel {
        id: Set(Uuid::new_v4()),
        profile_id: Set(profile_id),
        created_at: Set(now.into()),
        expires_at: Set((now + ttl).into()),
    };
    Ok(model.insert(pool).await?)
}

/// Live session by id. Expired sessions are deleted and reported as absent.
pub async fn find_live_session(pool: &DbPool, id: Uuid) -> DbResult<Option<sessions::Model>> {
    let Some(session) = sessions::Entity::find_by_id(id).one(pool).await? else {
        return Ok(None);
    };
    if session.expires_at.with_timezone(&Utc) <= Utc::now() {
        debug!(session = %id, "dropping expired session");
        sessions::Entity::delete_by_id(id).exec(pool).await?;
        return Ok(None);
    }
    Ok(Some(session))
}

pub async fn delete_session(pool: &DbPool, id: Uuid) -> DbResult<()> {
    sessions::Entity::delete_by_id(id).exec(pool).await?;
    Ok(())
}

/// Remove every session of a profile, e.g. after it was deactivated.
pub async fn delete_sessions_for(pool: &DbPool, profile_id: Uuid) -> DbResult<u64> {
    let result = sessions::Entity::delete_many()
        .filter(sessions::Column::ProfileId.eq(profile_id))
        .exec(pool)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{NewProfile, ProfileRepository};
    use crate::test_support::memory_pool;

    async fn profile(pool: &DbPool) -> Uuid {
        ProfileRepository::new(pool.clone())
            .create_profile(NewProfile {
                email: "ada@example.test".into(),
                name: None,
                role: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn password_hash_is_replaced_in_place() {
        let pool = memory_pool().await;
        let id = profile(&pool).await;
        set_password_hash(&pool, id, "first").await.unwrap();
        set_password_hash(&pool, id, "second").await.unwrap();
        assert_eq!(
            password_hash(&pool, id).await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn expired_sessions_are_not_returned() {
        let pool = memory_pool().await;
        let id = profile(&pool).await;
        let live = create_session(&pool, id, Duration::days(1)).await.unwrap();
        let stale = create_session(&pool, id, Duration::seconds(-5)).await.unwrap();

        assert!(find_live_session(&pool, live.id).await.unwrap().is_some());
        assert!(find_live_session(&pool, stale.id).await.unwrap().is_none());
        assert!(sessions::Entity::find_by_id(stale.id)
            .one(&pool)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn sessions_can_be_revoked_per_profile() {
        let pool = memory_pool().await;
        let id = profile(&pool).await;
        create_session(&pool, id, Duration::days(1)).await.unwrap();
        create_session(&pool, id, Duration::days(1)).await.unwrap();
        assert_eq!(delete_sessions_for(&pool, id).await.unwrap(), 2);
    }
}
