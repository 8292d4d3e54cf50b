use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PersonalProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PersonalProfiles::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PersonalProfiles::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PersonalProfiles::FirstName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PersonalProfiles::LastName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PersonalProfiles::Age).small_integer())
                    .col(ColumnDef::new(PersonalProfiles::Gender).string())
                    .foreign_key(
                        ForeignKey::create()
                            .from(PersonalProfiles::Table, PersonalProfiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PersonalProfiles::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PersonalProfiles {
    Table,
    UserId,
    Email,
    FirstName,
    LastName,
    Age,
    Gender,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
