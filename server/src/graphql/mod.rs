mod me;
mod menus;
mod permissions;
mod profiles;

use async_graphql::{Context, EmptySubscription, MergedObject, Object, Schema, SimpleObject};
use platform_api::{ApiError, ApiResult, gql};
use platform_authn::User;
use platform_authz::DenialList;
use platform_db::{DbPool, PermissionRepository};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use tracing::instrument;

use self::me::MePayload;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Schema-wide state.
#[derive(Clone)]
pub struct GraphqlData {
    pub pool: DbPool,
    pub admin_role: String,
}

/// Caller of the current request; `None` when no session cookie matched.
#[derive(Clone, Debug, Default)]
pub struct Requester(pub Option<User>);

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .data(data)
    .finish()
}

#[derive(MergedObject, Default)]
pub struct QueryRoot(
    CoreQuery,
    permissions::PermissionQuery,
    menus::MenuQuery,
    profiles::ProfileQuery,
);

#[derive(MergedObject, Default)]
pub struct MutationRoot(
    permissions::PermissionMutation,
    menus::MenuMutation,
    profiles::ProfileMutation,
);

#[derive(Default)]
pub struct CoreQuery;

#[Object]
impl CoreQuery {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self, ctx: &Context<'_>) -> async_graphql::Result<HealthPayload> {
        let data = schema_data(ctx)?;
        Ok(HealthPayload {
            ok: data.pool.ping().await.is_ok(),
        })
    }

    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<MePayload>> {
        let Some(user) = requester(ctx) else {
            return Ok(None);
        };
        let denied = denial_for(ctx, user.role.as_deref()).await?;
        Ok(Some(MePayload::from_user(user, &denied)))
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> ApiResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

pub(crate) fn schema_data<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
}

pub(crate) fn requester<'a>(ctx: &Context<'a>) -> Option<&'a User> {
    ctx.data_opt::<Requester>()
        .and_then(|requester| requester.0.as_ref())
}

/// The caller, provided it holds the configured admin role.
pub(crate) fn require_admin<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a User> {
    let data = schema_data(ctx)?;
    let user = requester(ctx).ok_or(ApiError::Unauthorized);
    let user = gql(user)?;
    if user.role.as_deref() != Some(data.admin_role.as_str()) {
        return gql(Err(ApiError::Forbidden));
    }
    Ok(user)
}

/// Authoritative denial list for `role`, read straight from storage.
///
/// Unlike the client cache this fails closed: a storage error is an error.
pub(crate) async fn denial_for(
    ctx: &Context<'_>,
    role: Option<&str>,
) -> async_graphql::Result<DenialList> {
    let Some(role) = role else {
        return Ok(DenialList::default());
    };
    let data = schema_data(ctx)?;
    let ids = gql(PermissionRepository::new(data.pool.clone())
        .denied_menu_ids(role)
        .await)?;
    Ok(DenialList::new(ids))
}

pub(crate) fn timestamp(value: &DateTimeWithTimeZone) -> String {
    value.to_rfc3339()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_graphql::{Request, Response};
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use uuid::Uuid;

    pub async fn memory_pool() -> DbPool {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        pool
    }

    pub fn user(role: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "caller@example.test".into(),
            name: None,
            role: role.map(str::to_string),
            created_at: Utc::now().into(),
        }
    }

    pub async fn execute(pool: &DbPool, caller: Option<User>, query: &str) -> Response {
        let schema = build_schema(GraphqlData {
            pool: pool.clone(),
            admin_role: "admin".into(),
        });
        schema
            .execute(Request::new(query).data(Requester(caller)))
            .await
    }

    pub fn error_code(response: &Response) -> Option<String> {
        let err = response.errors.first()?;
        match err.extensions.as_ref()?.get("code")? {
            async_graphql::Value::String(code) => Some(code.clone()),
            _ => None,
        }
    }
}
