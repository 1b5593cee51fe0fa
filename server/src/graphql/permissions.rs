use std::collections::HashMap;

use async_graphql::{Context, Enum, InputObject, Object, SimpleObject};
use entity::menus;
use platform_api::{ApiError, gql};
use platform_db::{MenuPermission, MenuPermissionUpdate, MenuRepository, PermissionRepository};
use tracing::{info, instrument};

use crate::graphql::{denial_for, require_admin, requester, schema_data, timestamp};

#[derive(Default)]
pub struct PermissionQuery;

#[derive(Default)]
pub struct PermissionMutation;

#[derive(Clone, Debug, SimpleObject)]
pub struct MenuPermissionNode {
    pub id: String,
    pub role: String,
    pub menu_id: String,
    pub can_access: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MenuPermission> for MenuPermissionNode {
    fn from(value: MenuPermission) -> Self {
        Self {
            id: value.id.to_string(),
            created_at: timestamp(&value.created_at),
            updated_at: timestamp(&value.updated_at),
            role: value.role,
            menu_id: value.menu_id,
            can_access: value.can_access,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct NavigationItem {
    pub id: String,
    pub menu_name: String,
    pub parent_id: Option<String>,
    pub depth: i32,
    pub sort_order: i32,
    pub path: Option<String>,
    pub icon: Option<String>,
}

impl From<menus::Model> for NavigationItem {
    fn from(value: menus::Model) -> Self {
        Self {
            id: value.id,
            menu_name: value.menu_name,
            parent_id: value.parent_id,
            depth: value.depth,
            sort_order: value.sort_order,
            path: value.path,
            icon: value.icon,
        }
    }
}

/// One menu as seen by one role.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
pub struct PermissionMatrixRow {
    pub menu_id: String,
    pub menu_name: String,
    pub parent_id: Option<String>,
    pub depth: i32,
    pub can_access: bool,
    /// Whether a stored rule exists, as opposed to the implicit default.
    pub explicit: bool,
}

#[derive(Copy, Clone, Debug, Default, Enum, Eq, PartialEq)]
pub enum AccessFilter {
    #[default]
    All,
    Allowed,
    Denied,
}

#[derive(Clone, Debug, InputObject)]
pub struct PermissionUpdateInput {
    pub role: String,
    pub menu_id: String,
    pub can_access: bool,
}

impl From<PermissionUpdateInput> for MenuPermissionUpdate {
    fn from(value: PermissionUpdateInput) -> Self {
        MenuPermissionUpdate::new(value.role, value.menu_id, value.can_access)
    }
}

/// Effective access of `role` to every menu, filtered by a case-insensitive
/// term over name or id and by access.
pub fn build_matrix(
    menus: Vec<menus::Model>,
    rules: &[MenuPermission],
    search: Option<&str>,
    access: AccessFilter,
) -> Vec<PermissionMatrixRow> {
    let stored: HashMap<&str, bool> = rules
        .iter()
        .map(|rule| (rule.menu_id.as_str(), rule.can_access))
        .collect();
    let term = search
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty());

    menus
        .into_iter()
        .map(|menu| {
            let rule = stored.get(menu.id.as_str()).copied();
            PermissionMatrixRow {
                can_access: rule.unwrap_or(true),
                explicit: rule.is_some(),
                menu_id: menu.id,
                menu_name: menu.menu_name,
                parent_id: menu.parent_id,
                depth: menu.depth,
            }
        })
        .filter(|row| match &term {
            Some(term) => {
                row.menu_name.to_lowercase().contains(term)
                    || row.menu_id.to_lowercase().contains(term)
            }
            None => true,
        })
        .filter(|row| match access {
            AccessFilter::All => true,
            AccessFilter::Allowed => row.can_access,
            AccessFilter::Denied => !row.can_access,
        })
        .collect()
}

/// Admins may inspect any role; everyone else only their own.
fn require_role_reader(ctx: &Context<'_>, role: &str) -> async_graphql::Result<()> {
    let user = gql(requester(ctx).ok_or(ApiError::Unauthorized))?;
    if user.role.as_deref() == Some(role) {
        return Ok(());
    }
    require_admin(ctx).map(|_| ())
}

#[Object]
impl PermissionQuery {
    /// Server-side verdict for the caller; storage errors surface as errors.
    #[instrument(name = "graphql.can_access", skip(self, ctx))]
    async fn can_access(&self, ctx: &Context<'_>, menu_id: String) -> async_graphql::Result<bool> {
        let user = gql(requester(ctx).ok_or(ApiError::Unauthorized))?;
        let denied = denial_for(ctx, user.role.as_deref()).await?;
        Ok(denied.allows(&menu_id))
    }

    /// Active menus the caller's role may open.
    #[instrument(name = "graphql.navigation", skip_all)]
    async fn navigation(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<NavigationItem>> {
        let user = gql(requester(ctx).ok_or(ApiError::Unauthorized))?;
        let data = schema_data(ctx)?;
        let denied = denial_for(ctx, user.role.as_deref()).await?;
        let menus = gql(MenuRepository::new(data.pool.clone()).list_menus().await)?;
        Ok(menus
            .into_iter()
            .filter(|menu| menu.is_active && denied.allows(&menu.id))
            .map(NavigationItem::from)
            .collect())
    }

    async fn denied_menu_ids(
        &self,
        ctx: &Context<'_>,
        role: String,
    ) -> async_graphql::Result<Vec<String>> {
        require_role_reader(ctx, &role)?;
        let data = schema_data(ctx)?;
        gql(PermissionRepository::new(data.pool.clone())
            .denied_menu_ids(&role)
            .await)
    }

    async fn accessible_menu_ids(
        &self,
        ctx: &Context<'_>,
        role: String,
    ) -> async_graphql::Result<Vec<String>> {
        require_role_reader(ctx, &role)?;
        let data = schema_data(ctx)?;
        gql(PermissionRepository::new(data.pool.clone())
            .accessible_menu_ids(&role)
            .await)
    }

    async fn menu_permissions(
        &self,
        ctx: &Context<'_>,
        role: String,
    ) -> async_graphql::Result<Vec<MenuPermissionNode>> {
        require_role_reader(ctx, &role)?;
        let data = schema_data(ctx)?;
        let rows = gql(PermissionRepository::new(data.pool.clone())
            .permissions_by_role(&role)
            .await)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn all_permissions(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<MenuPermissionNode>> {
        require_admin(ctx)?;
        let data = schema_data(ctx)?;
        let rows = gql(PermissionRepository::new(data.pool.clone())
            .all_permissions()
            .await)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.permission_matrix", skip(self, ctx))]
    async fn permission_matrix(
        &self,
        ctx: &Context<'_>,
        role: String,
        search: Option<String>,
        #[graphql(default)] access: AccessFilter,
    ) -> async_graphql::Result<Vec<PermissionMatrixRow>> {
        require_admin(ctx)?;
        let data = schema_data(ctx)?;
        let menus = gql(MenuRepository::new(data.pool.clone()).list_menus().await)?;
        let rules = gql(PermissionRepository::new(data.pool.clone())
            .permissions_by_role(&role)
            .await)?;
        Ok(build_matrix(menus, &rules, search.as_deref(), access))
    }
}

#[Object]
impl PermissionMutation {
    #[instrument(name = "graphql.update_permission", skip(self, ctx))]
    async fn update_permission(
        &self,
        ctx: &Context<'_>,
        role: String,
        menu_id: String,
        can_access: bool,
    ) -> async_graphql::Result<bool> {
        let admin = require_admin(ctx)?;
        let data = schema_data(ctx)?;
        gql(PermissionRepository::new(data.pool.clone())
            .update_permission(&role, &menu_id, can_access)
            .await)?;
        info!(by = %admin.email, %role, %menu_id, can_access, "menu permission updated");
        Ok(true)
    }

    #[instrument(name = "graphql.update_permissions", skip_all, fields(count = updates.len()))]
    async fn update_permissions(
        &self,
        ctx: &Context<'_>,
        updates: Vec<PermissionUpdateInput>,
    ) -> async_graphql::Result<bool> {
        let admin = require_admin(ctx)?;
        let data = schema_data(ctx)?;
        let updates: Vec<MenuPermissionUpdate> = updates.into_iter().map(Into::into).collect();
        gql(PermissionRepository::new(data.pool.clone())
            .update_permissions(&updates)
            .await)?;
        info!(by = %admin.email, count = updates.len(), "menu permissions updated");
        Ok(true)
    }
}
