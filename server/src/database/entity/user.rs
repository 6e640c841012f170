//! A user.
//!
//! Only the columns needed to authorize uploads live here.

use sea_orm::entity::prelude::*;

pub type UserModel = Model;

/// A user.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique numeric ID of the user.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Unique name of the user.
    #[sea_orm(unique, indexed)]
    pub name: String,

    /// Hex-encoded SHA-256 hash of the user's bearer token.
    #[sea_orm(unique, indexed)]
    pub token_hash: String,

    /// Whether the user is banned.
    pub banned: bool,

    /// Whether the user has verified their account.
    pub verified: bool,

    /// ID of the upload used as the profile picture.
    pub profile_picture: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project::Entity")]
    Project,

    #[sea_orm(has_many = "super::upload::Entity")]
    Upload,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::upload::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Upload.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
