//! Menu permission repository.
//!
//! Rows are deny-by-exception: a role may open every menu unless a row with
//! `can_access = false` exists for the `(role, menu_id)` pair. Writes are
//! upserts keyed on that pair, so repeating a write converges to one row.

use std::collections::HashMap;

use chrono::Utc;
use entity::menu_permissions::{self, Column};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{DbError, DbPool, DbResult};

/// Validated permission record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MenuPermission {
    pub id: Uuid,
    pub role: String,
    pub menu_id: String,
    pub can_access: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl TryFrom<menu_permissions::Model> for MenuPermission {
    type Error = DbError;

    fn try_from(model: menu_permissions::Model) -> Result<Self, Self::Error> {
        if model.role.trim().is_empty() || model.menu_id.trim().is_empty() {
            return Err(DbError::Invalid(format!(
                "menu permission {} has a blank role or menu id",
                model.id
            )));
        }
        Ok(Self {
            id: model.id,
            role: model.role,
            menu_id: model.menu_id,
            can_access: model.can_access,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Requested state for one `(role, menu_id)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct MenuPermissionUpdate {
    pub role: String,
    pub menu_id: String,
    pub can_access: bool,
}

impl MenuPermissionUpdate {
    pub fn new(role: impl Into<String>, menu_id: impl Into<String>, can_access: bool) -> Self {
        Self {
            role: role.into(),
            menu_id: menu_id.into(),
            can_access,
        }
    }

    pub fn deny(role: impl Into<String>, menu_id: impl Into<String>) -> Self {
        Self::new(role, menu_id, false)
    }

    pub fn allow(role: impl Into<String>, menu_id: impl Into<String>) -> Self {
        Self::new(role, menu_id, true)
    }

    /// Trimmed copy, or an error when either key is blank.
    fn normalized(&self) -> DbResult<Self> {
        let role = self.role.trim();
        let menu_id = self.menu_id.trim();
        if role.is_empty() {
            return Err(DbError::Invalid("role must not be blank".into()));
        }
        if menu_id.is_empty() {
            return Err(DbError::Invalid("menu_id must not be blank".into()));
        }
        Ok(Self::new(role, menu_id, self.can_access))
    }
}

#[derive(Clone, Debug)]
pub struct PermissionRepository {
    db: DbPool,
}

impl PermissionRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    #[instrument(name = "permissions.by_role", skip(self))]
    pub async fn permissions_by_role(&self, role: &str) -> DbResult<Vec<MenuPermission>> {
        self.load(Some(role), None).await
    }

    #[instrument(name = "permissions.all", skip(self))]
    pub async fn all_permissions(&self) -> DbResult<Vec<MenuPermission>> {
        self.load(None, None).await
    }

    #[instrument(name = "permissions.accessible", skip(self))]
    pub async fn accessible_menu_ids(&self, role: &str) -> DbResult<Vec<String>> {
        let rows = self.load(Some(role), Some(true)).await?;
        Ok(rows.into_iter().map(|row| row.menu_id).collect())
    }

    /// Menu ids explicitly denied to `role`. An error here means "unknown",
    /// never "everything denied".
    #[instrument(name = "permissions.denied", skip(self))]
    pub async fn denied_menu_ids(&self, role: &str) -> DbResult<Vec<String>> {
        let rows = self.load(Some(role), Some(false)).await?;
        Ok(rows.into_iter().map(|row| row.menu_id).collect())
    }

    pub async fn update_permission(
        &self,
        role: &str,
        menu_id: &str,
        can_access: bool,
    ) -> DbResult<()> {
        self.update_permissions(&[MenuPermissionUpdate::new(role, menu_id, can_access)])
            .await
    }

    /// Upsert every update in one statement. The batch succeeds or fails as a
    /// whole; duplicate keys keep their last occurrence.
    #[instrument(name = "permissions.upsert", skip_all, fields(count = updates.len()))]
    pub async fn update_permissions(&self, updates: &[MenuPermissionUpdate]) -> DbResult<()> {
        let batch = collapse(updates)?;
        if batch.is_empty() {
            return Ok(());
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        let models = batch
            .into_iter()
            .map(|update| menu_permissions::ActiveModel {
                id: Set(Uuid::new_v4()),
                role: Set(update.role),
                menu_id: Set(update.menu_id),
                can_access: Set(update.can_access),
                created_at: Set(now),
                updated_at: Set(now),
            });
        menu_permissions::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([Column::Role, Column::MenuId])
                    .update_columns([Column::CanAccess, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Store rules only for pairs that have none yet; existing rules keep
    /// their value.
    #[instrument(name = "permissions.insert_missing", skip_all, fields(count = updates.len()))]
    pub async fn insert_missing_permissions(
        &self,
        updates: &[MenuPermissionUpdate],
    ) -> DbResult<u64> {
        let batch = collapse(updates)?;
        if batch.is_empty() {
            return Ok(0);
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        let models = batch.into_iter().map(|update| menu_permissions::ActiveModel {
            id: Set(Uuid::new_v4()),
            role: Set(update.role),
            menu_id: Set(update.menu_id),
            can_access: Set(update.can_access),
            created_at: Set(now),
            updated_at: Set(now),
        });
        let inserted = menu_permissions::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([Column::Role, Column::MenuId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(inserted)
    }

    async fn load(
        &self,
        role: Option<&str>,
        can_access: Option<bool>,
    ) -> DbResult<Vec<MenuPermission>> {
        let mut query = menu_permissions::Entity::find();
        if let Some(role) = role {
            query = query.filter(Column::Role.eq(role.trim()));
        }
        if let Some(can_access) = can_access {
            query = query.filter(Column::CanAccess.eq(can_access));
        }
        let rows = query
            .order_by_asc(Column::Role)
            .order_by_asc(Column::MenuId)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match MenuPermission::try_from(row) {
                Ok(permission) => Some(permission),
                Err(err) => {
                    warn!(error = %err, "skipping malformed menu permission row");
                    None
                }
            })
            .collect())
    }
}

fn collapse(updates: &[MenuPermissionUpdate]) -> DbResult<Vec<MenuPermissionUpdate>> {
    let mut batch: Vec<MenuPermissionUpdate> = Vec::with_capacity(updates.len());
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    for update in updates {
        let update = update.normalized()?;
        let key = (update.role.clone(), update.menu_id.clone());
        match seen.get(&key) {
            Some(&index) => batch[index] = update,
            None => {
                seen.insert(key, batch.len());
                batch.push(update);
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;
    use sea_orm::{ActiveModelTrait, PaginatorTrait};

    #[tokio::test]
    async fn unknown_role_has_no_denials() {
        let repo = PermissionRepository::new(memory_pool().await);
        assert!(repo.denied_menu_ids("ghost").await.unwrap().is_empty());
        assert!(repo.permissions_by_role("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_upsert_keeps_a_single_row() {
        let pool = memory_pool().await;
        let repo = PermissionRepository::new(pool.clone());
        repo.update_permission("user", "admin-panel", false)
            .await
            .unwrap();
        repo.update_permission("user", "admin-panel", false)
            .await
            .unwrap();

        let count = menu_permissions::Entity::find().count(&pool).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            repo.denied_menu_ids("user").await.unwrap(),
            vec!["admin-panel".to_string()]
        );
    }

    #[tokio::test]
    async fn upsert_flips_existing_rule() {
        let repo = PermissionRepository::new(memory_pool().await);
        repo.update_permission("user", "reports", false).await.unwrap();
        repo.update_permission("user", "reports", true).await.unwrap();

        assert!(repo.denied_menu_ids("user").await.unwrap().is_empty());
        assert_eq!(
            repo.accessible_menu_ids("user").await.unwrap(),
            vec!["reports".to_string()]
        );
    }

    #[tokio::test]
    async fn batch_collapses_duplicate_keys_to_last_value() {
        let repo = PermissionRepository::new(memory_pool().await);
        repo.update_permissions(&[
            MenuPermissionUpdate::deny("user", "a"),
            MenuPermissionUpdate::allow("user", "a"),
            MenuPermissionUpdate::deny("user", "b"),
        ])
        .await
        .unwrap();

        assert_eq!(repo.denied_menu_ids("user").await.unwrap(), vec!["b"]);
        assert_eq!(repo.permissions_by_role("user").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_keys_reject_the_whole_batch() {
        let repo = PermissionRepository::new(memory_pool().await);
        let err = repo
            .update_permissions(&[
                MenuPermissionUpdate::deny("user", "a"),
                MenuPermissionUpdate::deny("user", "  "),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Invalid(_)));
        assert!(repo.all_permissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let repo = PermissionRepository::new(memory_pool().await);
        repo.update_permissions(&[]).await.unwrap();
        assert!(repo.all_permissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_rows_never_reach_callers() {
        let pool = memory_pool().await;
        let repo = PermissionRepository::new(pool.clone());
        repo.update_permission("user", "reports", false).await.unwrap();
        let now: DateTimeWithTimeZone = Utc::now().into();
        menu_permissions::ActiveModel {
            id: Set(Uuid::new_v4()),
            role: Set("user".into()),
            menu_id: Set("   ".into()),
            can_access: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&pool)
        .await
        .unwrap();

        assert_eq!(repo.denied_menu_ids("user").await.unwrap(), vec!["reports"]);
        let all = repo.all_permissions().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].menu_id, "reports");
    }

    #[tokio::test]
    async fn padded_role_reads_the_same_rules_it_writes() {
        let repo = PermissionRepository::new(memory_pool().await);
        repo.update_permission(" user ", "admin-panel", false)
            .await
            .unwrap();

        assert_eq!(repo.denied_menu_ids("user").await.unwrap(), vec!["admin-panel"]);
        assert_eq!(
            repo.denied_menu_ids("  user ").await.unwrap(),
            vec!["admin-panel"]
        );
        assert_eq!(repo.permissions_by_role(" user").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_missing_keeps_existing_rules() {
        let repo = PermissionRepository::new(memory_pool().await);
        repo.update_permission("user", "users", true).await.unwrap();

        let inserted = repo
            .insert_missing_permissions(&[
                MenuPermissionUpdate::deny("user", "users"),
                MenuPermissionUpdate::deny("user", "menus"),
            ])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(repo.denied_menu_ids("user").await.unwrap(), vec!["menus"]);
        assert_eq!(repo.accessible_menu_ids("user").await.unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn all_permissions_are_ordered_by_role_then_menu() {
        let repo = PermissionRepository::new(memory_pool().await);
        repo.update_permissions(&[
            MenuPermissionUpdate::deny("user", "z"),
            MenuPermissionUpdate::deny("admin", "m"),
            MenuPermissionUpdate::allow("user", "a"),
        ])
        .await
        .unwrap();

        let keys: Vec<(String, String)> = repo
            .all_permissions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.role, p.menu_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("admin".into(), "m".into()),
                ("user".into(), "a".into()),
                ("user".into(), "z".into()),
            ]
        );
    }
}
