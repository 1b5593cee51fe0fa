use crate::menu_objects;
use sea_orm::prelude::{DateTimeWithTimeZone, *};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "menus")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub menu_name: String,
    pub parent_id: Option<String>,
    pub depth: i32,
    pub sort_order: i32,
    pub path: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "menu_objects::Entity")]
    MenuObject,
}

impl Related<menu_objects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MenuObject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
