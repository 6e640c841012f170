use sea_orm_migration::prelude::*;

use crate::database::entity::project::*;
use crate::database::entity::user;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20261018_000002_create_projects_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Column::Author).big_integer().not_null())
                    .col(ColumnDef::new(Column::Title).string().not_null())
                    .col(ColumnDef::new(Column::Description).text().not_null())
                    .col(ColumnDef::new(Column::Thumbnail).string().null())
                    .col(ColumnDef::new(Column::File).string().null())
                    .col(
                        ColumnDef::new(Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_author")
                            .from_tbl(Entity)
                            .from_col(Column::Author)
                            .to_tbl(user::Entity)
                            .to_col(user::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-projects-author")
                    .table(Entity)
                    .col(Column::Author)
                    .to_owned(),
            )
            .await
    }
}
