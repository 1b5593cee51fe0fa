use crate::menus;
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "menu_objects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub menu_id: String,
    pub object_name: String,
    pub action_url: String,
    pub action_type: ActionType,
    pub sort_order: i32,
    pub log_yn: bool,
    pub obj_type: ObjectType,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// CRUD verb a menu object triggers.
#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(1))")]
pub enum ActionType {
    #[sea_orm(string_value = "C")]
    Create,
    #[sea_orm(string_value = "R")]
    Read,
    #[sea_orm(string_value = "U")]
    Update,
    #[sea_orm(string_value = "D")]
    Delete,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum ObjectType {
    #[sea_orm(string_value = "basic")]
    Basic,
    #[sea_orm(string_value = "additional")]
    Additional,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "menus::Entity",
        from = "Column::MenuId",
        to = "menus::Column::Id",
        on_delete = "Cascade"
    )]
    Menu,
}

impl Related<menus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Menu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
