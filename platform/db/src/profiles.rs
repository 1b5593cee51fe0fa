use chrono::Utc;
use entity::profiles::{self, Column};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{DbError, DbPool, DbResult};

#[derive(Clone, Debug)]
pub struct NewProfile {
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub department: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProfileRepository {
    db: DbPool,
}

/// Lowercased, trimmed email; `None` when it cannot be an address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
        return None;
    }
    Some(email)
}

/// `%term%` with LIKE wildcards in `term` escaped by a backslash.
fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

/// Insert a profile on any connection, so callers can pair it with other
/// writes inside one transaction.
pub async fn insert_profile<C: ConnectionTrait>(
    db: &C,
    new: NewProfile,
) -> DbResult<profiles::Model> {
    let email = normalize_email(&new.email)
        .ok_or_else(|| DbError::Invalid(format!("invalid email {:?}", new.email)))?;
    let existing = profiles::Entity::find()
        .filter(Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(DbError::conflict("profile", email));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = profiles::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        name: Set(new.name),
        department: Set(None),
        company: Set(None),
        role: Set(new.role),
        is_active: Set(true),
        description: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

impl ProfileRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Newest profiles first.
    #[instrument(name = "profiles.list", skip(self))]
    pub async fn list_profiles(&self) -> DbResult<Vec<profiles::Model>> {
        Ok(profiles::Entity::find()
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Case-insensitive substring match over name or email.
    #[instrument(name = "profiles.search", skip(self))]
    pub async fn search_profiles(&self, term: &str) -> DbResult<Vec<profiles::Model>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.list_profiles().await;
        }
        Ok(profiles::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(Column::Name)))
                            .like(contains_pattern(&term)),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(Column::Email)))
                            .like(contains_pattern(&term)),
                    ),
            )
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn get_profile(&self, id: Uuid) -> DbResult<profiles::Model> {
        profiles::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbError::not_found("profile", id))
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<profiles::Model>> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(profiles::Entity::find()
            .filter(Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    #[instrument(name = "profiles.create", skip_all)]
    pub async fn create_profile(&self, new: NewProfile) -> DbResult<profiles::Model> {
        insert_profile(&self.db, new).await
    }

    #[instrument(name = "profiles.update", skip(self, patch))]
    pub async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> DbResult<profiles::Model> {
        let mut model = self.get_profile(id).await?.into_active_model();
        if let Some(name) = patch.name {
            model.name = Set(Some(name));
        }
        if let Some(department) = patch.department {
            model.department = Set(Some(department));
        }
        if let Some(company) = patch.company {
            model.company = Set(Some(company));
        }
        if let Some(role) = patch.role {
            let role = role.trim().to_string();
            model.role = Set((!role.is_empty()).then_some(role));
        }
        if let Some(is_active) = patch.is_active {
            model.is_active = Set(is_active);
        }
        if let Some(description) = patch.description {
            model.description = Set(Some(description));
        }
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(&self.db).await?)
    }

    pub async fn set_profile_active(&self, id: Uuid, is_active: bool) -> DbResult<profiles::Model> {
        self.update_profile(
            id,
            ProfilePatch {
                is_active: Some(is_active),
                ..ProfilePatch::default()
            },
        )
        .await
    }
}
