use crate::profiles;
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub profile_id: Uuid,
    /// argon2 PHC string.
    pub password_hash: String,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "profiles::Entity",
        from = "Column::ProfileId",
        to = "profiles::Column::Id",
        on_delete = "Cascade"
    )]
    Profile,
}

impl Related<profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
