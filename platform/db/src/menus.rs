//! Menu catalog: navigation nodes and the action objects hanging off them.

use chrono::Utc;
use entity::menu_objects::{self, ActionType, ObjectType};
use entity::menus;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{DbError, DbPool, DbResult};

#[derive(Clone, Debug, Deserialize)]
pub struct MenuInput {
    pub id: String,
    pub menu_name: String,
    pub parent_id: Option<String>,
    pub depth: i32,
    pub sort_order: i32,
    pub path: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
}

/// Partial menu update; `None` leaves a field untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MenuPatch {
    pub menu_name: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub depth: Option<i32>,
    pub sort_order: Option<i32>,
    pub path: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct MenuObjectInput {
    pub menu_id: String,
    pub object_name: String,
    pub action_url: String,
    pub action_type: ActionType,
    pub sort_order: i32,
    pub log_yn: bool,
    pub obj_type: ObjectType,
}

#[derive(Clone, Debug, Default)]
pub struct MenuObjectPatch {
    pub object_name: Option<String>,
    pub action_url: Option<String>,
    pub action_type: Option<ActionType>,
    pub sort_order: Option<i32>,
    pub log_yn: Option<bool>,
    pub obj_type: Option<ObjectType>,
}

#[derive(Clone, Debug)]
pub struct MenuRepository {
    db: DbPool,
}

impl MenuRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// All menus, shallowest first, then by sort order.
    #[instrument(name = "menus.list", skip(self))]
    pub async fn list_menus(&self) -> DbResult<Vec<menus::Model>> {
        Ok(menus::Entity::find()
            .order_by_asc(menus::Column::Depth)
            .order_by_asc(menus::Column::SortOrder)
            .order_by_asc(menus::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn get_menu(&self, id: &str) -> DbResult<menus::Model> {
        menus::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| DbError::not_found("menu", id))
    }

    #[instrument(name = "menus.create", skip(self, input), fields(id = %input.id))]
    pub async fn create_menu(&self, input: MenuInput) -> DbResult<menus::Model> {
        let id = input.id.trim().to_string();
        if id.is_empty() {
            return Err(DbError::Invalid("menu id must not be blank".into()));
        }
        if input.menu_name.trim().is_empty() {
            return Err(DbError::Invalid("menu name must not be blank".into()));
        }
        if menus::Entity::find_by_id(id.clone())
            .one(&self.db)
            .await?
            .is_some()
        {
            return Err(DbError::conflict("menu", id));
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        let model = menus::ActiveModel {
            id: Set(id),
            menu_name: Set(input.menu_name),
            parent_id: Set(input.parent_id),
            depth: Set(input.depth),
            sort_order: Set(input.sort_order),
            path: Set(input.path),
            icon: Set(input.icon),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    #[instrument(name = "menus.update", skip(self, patch))]
    pub async fn update_menu(&self, id: &str, patch: MenuPatch) -> DbResult<menus::Model> {
        let mut model = self.get_menu(id).await?.into_active_model();
        if let Some(name) = patch.menu_name {
            model.menu_name = Set(name);
        }
        if let Some(parent_id) = patch.parent_id {
            model.parent_id = Set(parent_id);
        }
        if let Some(depth) = patch.depth {
            model.depth = Set(depth);
        }
        if let Some(sort_order) = patch.sort_order {
            model.sort_order = Set(sort_order);
        }
        if let Some(path) = patch.path {
            model.path = Set(path);
        }
        if let Some(icon) = patch.icon {
            model.icon = Set(icon);
        }
        if let Some(is_active) = patch.is_active {
            model.is_active = Set(is_active);
        }
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(&self.db).await?)
    }

    #[instrument(name = "menus.delete", skip(self))]
    pub async fn delete_menu(&self, id: &str) -> DbResult<()> {
        let result = menus::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(DbError::not_found("menu", id));
        }
        Ok(())
    }

    /// Objects of one menu ordered by `sort_order`, optionally narrowed to one kind.
    pub async fn list_menu_objects(
        &self,
        menu_id: &str,
        obj_type: Option<ObjectType>,
    ) -> DbResult<Vec<menu_objects::Model>> {
        let mut query =
            menu_objects::Entity::find().filter(menu_objects::Column::MenuId.eq(menu_id));
        if let Some(obj_type) = obj_type {
            query = query.filter(menu_objects::Column::ObjType.eq(obj_type));
        }
        Ok(query
            .order_by_asc(menu_objects::Column::SortOrder)
            .all(&self.db)
            .await?)
    }

    pub async fn get_menu_object(&self, id: Uuid) -> DbResult<menu_objects::Model> {
        menu_objects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbError::not_found("menu object", id))
    }

    #[instrument(name = "menus.create_object", skip(self, input), fields(menu_id = %input.menu_id))]
    pub async fn create_menu_object(
        &self,
        input: MenuObjectInput,
    ) -> DbResult<menu_objects::Model> {
        if input.object_name.trim().is_empty() {
            return Err(DbError::Invalid("object name must not be blank".into()));
        }
        self.get_menu(&input.menu_id).await?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let model = menu_objects::ActiveModel {
            id: Set(Uuid::new_v4()),
            menu_id: Set(input.menu_id),
            object_name: Set(input.object_name),
            action_url: Set(input.action_url),
            action_type: Set(input.action_type),
            sort_order: Set(input.sort_order),
            log_yn: Set(input.log_yn),
            obj_type: Set(input.obj_type),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn update_menu_object(
        &self,
        id: Uuid,
        patch: MenuObjectPatch,
    ) -> DbResult<menu_objects::Model> {
        let mut model = self.get_menu_object(id).await?.into_active_model();
        if let Some(name) = patch.object_name {
            model.object_name = Set(name);
        }
        if let Some(url) = patch.action_url {
            model.action_url = Set(url);
        }
        if let Some(action_type) = patch.action_type {
            model.action_type = Set(action_type);
        }
        if let Some(sort_order) = patch.sort_order {
            model.sort_order = Set(sort_order);
        }
        if let Some(log_yn) = patch.log_yn {
            model.log_yn = Set(log_yn);
        }
        if let Some(obj_type) = patch.obj_type {
            model.obj_type = Set(obj_type);
        }
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(&self.db).await?)
    }

    pub async fn delete_menu_object(&self, id: Uuid) -> DbResult<()> {
        let result = menu_objects::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(DbError::not_found("menu object", id));
        }
        Ok(())
    }
}
