//! A published project.

use sea_orm::entity::prelude::*;

use hatch::api::v1::upload::ProjectInfo;

pub type ProjectModel = Model;

/// A published project.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Unique numeric ID of the project.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// ID of the user who created the project.
    #[sea_orm(indexed)]
    pub author: i64,

    pub title: String,

    pub description: String,

    /// ID of the thumbnail upload.
    pub thumbnail: Option<String>,

    /// ID of the project archive upload.
    ///
    /// The upload only becomes visible once the archive has been
    /// processed.
    pub file: Option<String>,

    /// Timestamp when the project is created.
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Author",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Model {
    pub fn to_project_info(&self) -> ProjectInfo {
        ProjectInfo {
            id: self.id,
            author: self.author,
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
