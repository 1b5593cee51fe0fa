use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Menus {
    Table,
    Id,
    MenuName,
    ParentId,
    Depth,
    SortOrder,
    Path,
    Icon,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MenuObjects {
    Table,
    Id,
    MenuId,
    ObjectName,
    ActionUrl,
    ActionType,
    SortOrder,
    LogYn,
    ObjType,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MenuPermissions {
    Table,
    Id,
    Role,
    MenuId,
    CanAccess,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Menus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Menus::Id)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Menus::MenuName).string_len(256).not_null())
                    .col(ColumnDef::new(Menus::ParentId).string_len(128))
                    .col(ColumnDef::new(Menus::Depth).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Menus::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Menus::Path).string_len(512))
                    .col(ColumnDef::new(Menus::Icon).string_len(128))
                    .col(
                        ColumnDef::new(Menus::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Menus::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Menus::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_menus_parent")
                            .from(Menus::Table, Menus::ParentId)
                            .to(Menus::Table, Menus::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_menus_depth_sort")
                    .table(Menus::Table)
                    .col(Menus::Depth)
                    .col(Menus::SortOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MenuObjects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MenuObjects::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::MenuId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::ObjectName)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::ActionUrl)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::ActionType)
                            .string_len(1)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::LogYn)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::ObjType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuObjects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_menu_objects_menu")
                            .from(MenuObjects::Table, MenuObjects::MenuId)
                            .to(Menus::Table, Menus::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_menu_objects_menu")
                    .table(MenuObjects::Table)
                    .col(MenuObjects::MenuId)
                    .to_owned(),
            )
            .await?;

        // No FK on menu_id: rules may name route ids that only exist client-side.
        manager
            .create_table(
                Table::create()
                    .table(MenuPermissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MenuPermissions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MenuPermissions::Role)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuPermissions::MenuId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuPermissions::CanAccess)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MenuPermissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MenuPermissions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_menu_permissions_role_menu")
                    .table(MenuPermissions::Table)
                    .col(MenuPermissions::Role)
                    .col(MenuPermissions::MenuId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MenuPermissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MenuObjects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Menus::Table).to_owned())
            .await?;
        Ok(())
    }
}
