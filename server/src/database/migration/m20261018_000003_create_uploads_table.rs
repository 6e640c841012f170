use sea_orm_migration::prelude::*;

use crate::database::entity::upload::*;
use crate::database::entity::user;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20261018_000003_create_uploads_table"
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
                            .string_len(22)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Column::Bucket).string_len(16).not_null())
                    .col(ColumnDef::new(Column::Hash).string_len(64).not_null())
                    .col(ColumnDef::new(Column::Filename).string().not_null())
                    .col(ColumnDef::new(Column::Mime).string().not_null())
                    .col(ColumnDef::new(Column::Uploader).big_integer().not_null())
                    .col(
                        ColumnDef::new(Column::UploadTs)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Column::Size).big_integer().not_null())
                    .col(ColumnDef::new(Column::Width).integer().null())
                    .col(ColumnDef::new(Column::Height).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploads_uploader")
                            .from_tbl(Entity)
                            .from_col(Column::Uploader)
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
                    .name("idx-uploads-hash")
                    .table(Entity)
                    .col(Column::Hash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-uploads-uploader")
                    .table(Entity)
                    .col(Column::Uploader)
                    .to_owned(),
            )
            .await
    }
}
