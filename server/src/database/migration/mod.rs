//! Database migrations.

pub use sea_orm_migration::*;

mod m20261018_000001_create_users_table;
mod m20261018_000002_create_projects_table;
mod m20261018_000003_create_uploads_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261018_000001_create_users_table::Migration),
            Box::new(m20261018_000002_create_projects_table::Migration),
            Box::new(m20261018_000003_create_uploads_table::Migration),
        ]
    }
}
