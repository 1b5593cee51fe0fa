use async_graphql::{Context, InputObject, Object, SimpleObject};
use entity::profiles;
use platform_api::gql;
use platform_db::{ProfilePatch, ProfileRepository, sessions};
use tracing::{info, instrument};

use crate::graphql::{menus::parse_uuid, require_admin, schema_data, timestamp};

#[derive(Default)]
pub struct ProfileQuery;

#[derive(Default)]
pub struct ProfileMutation;

#[derive(Clone, Debug, SimpleObject)]
pub struct ProfileNode {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub department: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<profiles::Model> for ProfileNode {
    fn from(value: profiles::Model) -> Self {
        Self {
            id: value.id.to_string(),
            created_at: timestamp(&value.created_at),
            updated_at: timestamp(&value.updated_at),
            email: value.email,
            name: value.name,
            department: value.department,
            company: value.company,
            role: value.role,
            is_active: value.is_active,
            description: value.description,
        }
    }
}

/// Omitted fields stay as they are. A blank `role` removes the assignment.
#[derive(Clone, Debug, Default, InputObject)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub department: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
}

impl From<UpdateProfileInput> for ProfilePatch {
    fn from(value: UpdateProfileInput) -> Self {
        Self {
            name: value.name,
            department: value.department,
            company: value.company,
            role: value.role,
            is_active: None,
            description: value.description,
        }
    }
}

fn repository(ctx: &Context<'_>) -> async_graphql::Result<ProfileRepository> {
    require_admin(ctx)?;
    Ok(ProfileRepository::new(schema_data(ctx)?.pool.clone()))
}

#[Object]
impl ProfileQuery {
    /// Newest first; `search` matches name or email ignoring case.
    async fn profiles(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
    ) -> async_graphql::Result<Vec<ProfileNode>> {
        let repo = repository(ctx)?;
        let rows = match search {
            Some(term) => gql(repo.search_profiles(&term).await)?,
            None => gql(repo.list_profiles().await)?,
        };
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn profile(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<ProfileNode> {
        let id = parse_uuid(&id)?;
        Ok(gql(repository(ctx)?.get_profile(id).await)?.into())
    }
}

#[Object]
impl ProfileMutation {
    #[instrument(name = "graphql.update_profile", skip(self, ctx, input))]
    async fn update_profile(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: UpdateProfileInput,
    ) -> async_graphql::Result<ProfileNode> {
        let id = parse_uuid(&id)?;
        let profile = gql(repository(ctx)?.update_profile(id, input.into()).await)?;
        info!(profile = %profile.id, role = ?profile.role, "profile updated");
        Ok(profile.into())
    }

    /// Deactivating a profile also ends its sessions.
    #[instrument(name = "graphql.set_profile_active", skip(self, ctx))]
    async fn set_profile_active(
        &self,
        ctx: &Context<'_>,
        id: String,
        is_active: bool,
    ) -> async_graphql::Result<ProfileNode> {
        let id = parse_uuid(&id)?;
        let profile = gql(repository(ctx)?.set_profile_active(id, is_active).await)?;
        if !is_active {
            let data = schema_data(ctx)?;
            let revoked = gql(sessions::delete_sessions_for(&data.pool, id).await)?;
            info!(profile = %id, revoked, "profile deactivated");
        }
        Ok(profile.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::graphql::test_support::*;
    use chrono::Duration;
    use platform_db::{NewProfile, ProfileRepository, sessions};
    use serde_json::json;

    #[tokio::test]
    async fn deactivation_revokes_sessions() {
        let pool = memory_pool().await;
        let profile = ProfileRepository::new(pool.clone())
            .create_profile(NewProfile {
                email: "ada@example.test".into(),
                name: Some("Ada".into()),
                role: Some("user".into()),
            })
            .await
            .unwrap();
        let session = sessions::create_session(&pool, profile.id, Duration::days(1))
            .await
            .unwrap();

        let query = format!(
            r#"mutation {{ setProfileActive(id: "{}", isActive: false) {{ isActive role }} }}"#,
            profile.id
        );
        let response = execute(&pool, Some(user(Some("admin"))), &query).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"setProfileActive": {"isActive": false, "role": "user"}})
        );
        assert!(sessions::find_live_session(&pool, session.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn role_reassignment_and_search() {
        let pool = memory_pool().await;
        let profile = ProfileRepository::new(pool.clone())
            .create_profile(NewProfile {
                email: "grace@navy.test".into(),
                name: Some("Grace Hopper".into()),
                role: Some("user".into()),
            })
            .await
            .unwrap();

        let update = format!(
            r#"mutation {{ updateProfile(id: "{}", input: {{ role: "manager", department: "R&D" }}) {{ role department }} }}"#,
            profile.id
        );
        let response = execute(&pool, Some(user(Some("admin"))), &update).await;
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"updateProfile": {"role": "manager", "department": "R&D"}})
        );

        let found = execute(
            &pool,
            Some(user(Some("admin"))),
            r#"{ profiles(search: "HOPPER") { email } }"#,
        )
        .await;
        assert_eq!(
            found.data.into_json().unwrap(),
            json!({"profiles": [{"email": "grace@navy.test"}]})
        );
    }

    #[tokio::test]
    async fn profiles_require_admin() {
        let pool = memory_pool().await;
        let response = execute(&pool, None, "{ profiles { id } }").await;
        assert_eq!(error_code(&response).as_deref(), Some("UNAUTHORIZED"));
    }
}
