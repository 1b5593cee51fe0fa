pub use sea_orm_migration::prelude::*;

mod m20240101_000001_profiles_and_sessions;
mod m20240102_000002_menus_and_permissions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_profiles_and_sessions::Migration),
            Box::new(m20240102_000002_menus_and_permissions::Migration),
        ]
    }
}
