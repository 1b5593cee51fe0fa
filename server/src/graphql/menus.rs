use async_graphql::{Context, Enum, InputObject, MaybeUndefined, Object, SimpleObject};
use entity::{menu_objects, menus};
use platform_api::{ApiError, gql};
use platform_db::{MenuInput, MenuObjectInput, MenuObjectPatch, MenuPatch, MenuRepository};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::graphql::{require_admin, schema_data, timestamp};

#[derive(Default)]
pub struct MenuQuery;

#[derive(Default)]
pub struct MenuMutation;

#[derive(Clone, Debug, SimpleObject)]
pub struct MenuNode {
    pub id: String,
    pub menu_name: String,
    pub parent_id: Option<String>,
    pub depth: i32,
    pub sort_order: i32,
    pub path: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<menus::Model> for MenuNode {
    fn from(value: menus::Model) -> Self {
        Self {
            created_at: timestamp(&value.created_at),
            updated_at: timestamp(&value.updated_at),
            id: value.id,
            menu_name: value.menu_name,
            parent_id: value.parent_id,
            depth: value.depth,
            sort_order: value.sort_order,
            path: value.path,
            icon: value.icon,
            is_active: value.is_active,
        }
    }
}

#[derive(Copy, Clone, Debug, Enum, Eq, PartialEq)]
pub enum ActionKind {
    Create,
    Read,
    Update,
    Delete,
}

impl From<menu_objects::ActionType> for ActionKind {
    fn from(value: menu_objects::ActionType) -> Self {
        match value {
            menu_objects::ActionType::Create => Self::Create,
            menu_objects::ActionType::Read => Self::Read,
            menu_objects::ActionType::Update => Self::Update,
            menu_objects::ActionType::Delete => Self::Delete,
        }
    }
}

impl From<ActionKind> for menu_objects::ActionType {
    fn from(value: ActionKind) -> Self {
        match value {
            ActionKind::Create => Self::Create,
            ActionKind::Read => Self::Read,
            ActionKind::Update => Self::Update,
            ActionKind::Delete => Self::Delete,
        }
    }
}

#[derive(Copy, Clone, Debug, Enum, Eq, PartialEq)]
pub enum ObjectKind {
    Basic,
    Additional,
}

impl From<menu_objects::ObjectType> for ObjectKind {
    fn from(value: menu_objects::ObjectType) -> Self {
        match value {
            menu_objects::ObjectType::Basic => Self::Basic,
            menu_objects::ObjectType::Additional => Self::Additional,
        }
    }
}

impl From<ObjectKind> for menu_objects::ObjectType {
    fn from(value: ObjectKind) -> Self {
        match value {
            ObjectKind::Basic => Self::Basic,
            ObjectKind::Additional => Self::Additional,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MenuObjectNode {
    pub id: String,
    pub menu_id: String,
    pub object_name: String,
    pub action_url: String,
    pub action_type: ActionKind,
    pub sort_order: i32,
    pub log_yn: bool,
    pub obj_type: ObjectKind,
    pub created_at: String,
    pub updated_at: String,
}

impl From<menu_objects::Model> for MenuObjectNode {
    fn from(value: menu_objects::Model) -> Self {
        Self {
            id: value.id.to_string(),
            created_at: timestamp(&value.created_at),
            updated_at: timestamp(&value.updated_at),
            menu_id: value.menu_id,
            object_name: value.object_name,
            action_url: value.action_url,
            action_type: value.action_type.into(),
            sort_order: value.sort_order,
            log_yn: value.log_yn,
            obj_type: value.obj_type.into(),
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateMenuInput {
    pub id: String,
    pub menu_name: String,
    pub parent_id: Option<String>,
    #[graphql(default = 1)]
    pub depth: i32,
    #[graphql(default)]
    pub sort_order: i32,
    pub path: Option<String>,
    pub icon: Option<String>,
    #[graphql(default = true)]
    pub is_active: bool,
}

impl From<CreateMenuInput> for MenuInput {
    fn from(value: CreateMenuInput) -> Self {
        Self {
            id: value.id,
            menu_name: value.menu_name,
            parent_id: value.parent_id,
            depth: value.depth,
            sort_order: value.sort_order,
            path: value.path,
            icon: value.icon,
            is_active: value.is_active,
        }
    }
}

/// Omitted fields stay as they are; explicit `null` clears nullable ones.
#[derive(Clone, Debug, Default, InputObject)]
pub struct UpdateMenuInput {
    pub menu_name: Option<String>,
    pub parent_id: MaybeUndefined<String>,
    pub depth: Option<i32>,
    pub sort_order: Option<i32>,
    pub path: MaybeUndefined<String>,
    pub icon: MaybeUndefined<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateMenuInput> for MenuPatch {
    fn from(value: UpdateMenuInput) -> Self {
        Self {
            menu_name: value.menu_name,
            parent_id: patch_field(value.parent_id),
            depth: value.depth,
            sort_order: value.sort_order,
            path: patch_field(value.path),
            icon: patch_field(value.icon),
            is_active: value.is_active,
        }
    }
}

fn patch_field<T>(value: MaybeUndefined<T>) -> Option<Option<T>> {
    match value {
        MaybeUndefined::Undefined => None,
        MaybeUndefined::Null => Some(None),
        MaybeUndefined::Value(value) => Some(Some(value)),
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateMenuObjectInput {
    pub menu_id: String,
    pub object_name: String,
    pub action_url: String,
    pub action_type: ActionKind,
    #[graphql(default)]
    pub sort_order: i32,
    #[graphql(default)]
    pub log_yn: bool,
    pub obj_type: ObjectKind,
}

impl From<CreateMenuObjectInput> for MenuObjectInput {
    fn from(value: CreateMenuObjectInput) -> Self {
        Self {
            menu_id: value.menu_id,
            object_name: value.object_name,
            action_url: value.action_url,
            action_type: value.action_type.into(),
            sort_order: value.sort_order,
            log_yn: value.log_yn,
            obj_type: value.obj_type.into(),
        }
    }
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct UpdateMenuObjectInput {
    pub object_name: Option<String>,
    pub action_url: Option<String>,
    pub action_type: Option<ActionKind>,
    pub sort_order: Option<i32>,
    pub log_yn: Option<bool>,
    pub obj_type: Option<ObjectKind>,
}

impl From<UpdateMenuObjectInput> for MenuObjectPatch {
    fn from(value: UpdateMenuObjectInput) -> Self {
        Self {
            object_name: value.object_name,
            action_url: value.action_url,
            action_type: value.action_type.map(Into::into),
            sort_order: value.sort_order,
            log_yn: value.log_yn,
            obj_type: value.obj_type.map(Into::into),
        }
    }
}

pub(crate) fn parse_uuid(raw: &str) -> async_graphql::Result<Uuid> {
    gql(Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::InvalidInput(format!("{raw:?} is not a valid id"))))
}

fn repository(ctx: &Context<'_>) -> async_graphql::Result<MenuRepository> {
    require_admin(ctx)?;
    Ok(MenuRepository::new(schema_data(ctx)?.pool.clone()))
}

#[Object]
impl MenuQuery {
    async fn menus(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<MenuNode>> {
        let menus = gql(repository(ctx)?.list_menus().await)?;
        Ok(menus.into_iter().map(Into::into).collect())
    }

    async fn menu(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<MenuNode> {
        Ok(gql(repository(ctx)?.get_menu(&id).await)?.into())
    }

    async fn menu_objects(
        &self,
        ctx: &Context<'_>,
        menu_id: String,
        obj_type: Option<ObjectKind>,
    ) -> async_graphql::Result<Vec<MenuObjectNode>> {
        let objects = gql(repository(ctx)?
            .list_menu_objects(&menu_id, obj_type.map(Into::into))
            .await)?;
        Ok(objects.into_iter().map(Into::into).collect())
    }
}

#[Object]
impl MenuMutation {
    #[instrument(name = "graphql.create_menu", skip(self, ctx, input), fields(id = %input.id))]
    async fn create_menu(
        &self,
        ctx: &Context<'_>,
        input: CreateMenuInput,
    ) -> async_graphql::Result<MenuNode> {
        let menu = gql(repository(ctx)?.create_menu(input.into()).await)?;
        info!(id = %menu.id, "menu created");
        Ok(menu.into())
    }

    async fn update_menu(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: UpdateMenuInput,
    ) -> async_graphql::Result<MenuNode> {
        Ok(gql(repository(ctx)?.update_menu(&id, input.into()).await)?.into())
    }

    #[instrument(name = "graphql.delete_menu", skip(self, ctx))]
    async fn delete_menu(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<bool> {
        gql(repository(ctx)?.delete_menu(&id).await)?;
        info!(%id, "menu deleted");
        Ok(true)
    }

    async fn create_menu_object(
        &self,
        ctx: &Context<'_>,
        input: CreateMenuObjectInput,
    ) -> async_graphql::Result<MenuObjectNode> {
        Ok(gql(repository(ctx)?.create_menu_object(input.into()).await)?.into())
    }

    async fn update_menu_object(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: UpdateMenuObjectInput,
    ) -> async_graphql::Result<MenuObjectNode> {
        let id = parse_uuid(&id)?;
        Ok(gql(repository(ctx)?.update_menu_object(id, input.into()).await)?.into())
    }

    async fn delete_menu_object(
        &self,
        ctx: &Context<'_>,
        id: String,
    ) -> async_graphql::Result<bool> {
        let id = parse_uuid(&id)?;
        gql(repository(ctx)?.delete_menu_object(id).await)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::graphql::test_support::*;
    use serde_json::json;

    #[tokio::test]
    async fn admin_manages_menus_and_objects() {
        let pool = memory_pool().await;
        let admin = Some(user(Some("admin")));

        let created = execute(
            &pool,
            admin.clone(),
            r#"mutation { createMenu(input: { id: "reports", menuName: "Reports", path: "/reports" }) { id depth isActive } }"#,
        )
        .await;
        assert!(created.errors.is_empty(), "{:?}", created.errors);
        assert_eq!(
            created.data.into_json().unwrap(),
            json!({"createMenu": {"id": "reports", "depth": 1, "isActive": true}})
        );

        let object = execute(
            &pool,
            admin.clone(),
            r#"mutation { createMenuObject(input: { menuId: "reports", objectName: "Export", actionUrl: "/reports/export", actionType: READ, objType: ADDITIONAL }) { objectName actionType } }"#,
        )
        .await;
        assert!(object.errors.is_empty(), "{:?}", object.errors);

        let listed = execute(
            &pool,
            admin.clone(),
            r#"{ basic: menuObjects(menuId: "reports", objType: BASIC) { id } extra: menuObjects(menuId: "reports", objType: ADDITIONAL) { objectName } }"#,
        )
        .await;
        assert_eq!(
            listed.data.into_json().unwrap(),
            json!({"basic": [], "extra": [{"objectName": "Export"}]})
        );

        let cleared = execute(
            &pool,
            admin,
            r#"mutation { updateMenu(id: "reports", input: { path: null, sortOrder: 3 }) { path sortOrder } }"#,
        )
        .await;
        assert_eq!(
            cleared.data.into_json().unwrap(),
            json!({"updateMenu": {"path": null, "sortOrder": 3}})
        );
    }

    #[tokio::test]
    async fn duplicate_menu_is_a_conflict() {
        let pool = memory_pool().await;
        let query = r#"mutation { createMenu(input: { id: "reports", menuName: "Reports" }) { id } }"#;
        execute(&pool, Some(user(Some("admin"))), query).await;
        let again = execute(&pool, Some(user(Some("admin"))), query).await;
        assert_eq!(error_code(&again).as_deref(), Some("CONFLICT"));
    }

    #[tokio::test]
    async fn menu_catalog_requires_admin() {
        let pool = memory_pool().await;
        let response = execute(&pool, Some(user(Some("user"))), "{ menus { id } }").await;
        assert_eq!(error_code(&response).as_deref(), Some("FORBIDDEN"));
    }

    #[tokio::test]
    async fn malformed_object_id_is_bad_input() {
        let pool = memory_pool().await;
        let response = execute(
            &pool,
            Some(user(Some("admin"))),
            r#"mutation { deleteMenuObject(id: "not-a-uuid") }"#,
        )
        .await;
        assert_eq!(error_code(&response).as_deref(), Some("INVALID_INPUT"));
    }
}
