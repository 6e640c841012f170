pub mod entity;
pub mod migration;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveValue::Set, ConnectionTrait};

use crate::error::{ServerError, ServerResult};
use entity::project::{self, Entity as Project, ProjectModel};
use entity::upload::{self, Entity as Upload, UploadModel};
use entity::user::{self, Entity as User, UserModel};
use hatch::api::v1::upload::UploadRecord;
use hatch::id::UploadId;

/// Queries and writes used by the upload service.
///
/// This is implemented for both connections and transactions, so the
/// writes can be grouped into a single transaction by the caller.
#[async_trait]
pub trait HatchDatabase: Send + Sync {
    /// Retrieves an indexed upload.
    async fn find_upload(&self, id: &UploadId) -> ServerResult<UploadModel>;

    /// Retrieves the user owning a bearer token hash.
    async fn find_user_by_token(&self, token_hash: &str) -> ServerResult<Option<UserModel>>;

    /// Retrieves a project.
    async fn find_project(&self, id: i64) -> ServerResult<ProjectModel>;

    /// Indexes an upload whose bytes have been stored.
    async fn index_upload(&self, record: &UploadRecord) -> ServerResult<()>;

    /// Points a user's profile picture at an upload.
    async fn set_profile_picture(&self, user_id: i64, upload: &UploadId) -> ServerResult<()>;

    /// Points a project's thumbnail at an upload.
    ///
    /// Only projects authored by `author` are updated. Returns whether
    /// the project was updated.
    async fn set_project_thumbnail(
        &self,
        project_id: i64,
        author: i64,
        upload: &UploadId,
    ) -> ServerResult<bool>;

    /// Creates a project.
    async fn insert_project(
        &self,
        author: i64,
        title: String,
        description: String,
        thumbnail: &UploadId,
        file: &UploadId,
    ) -> ServerResult<ProjectModel>;
}

#[async_trait]
impl<C> HatchDatabase for C
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_upload(&self, id: &UploadId) -> ServerResult<UploadModel> {
        Upload::find_by_id(id.as_str().to_owned())
            .one(self)
            .await
            .map_err(ServerError::database_error)?
            .ok_or(ServerError::NoSuchUpload)
    }

    async fn find_user_by_token(&self, token_hash: &str) -> ServerResult<Option<UserModel>> {
        User::find()
            .filter(user::Column::TokenHash.eq(token_hash))
            .one(self)
            .await
            .map_err(ServerError::database_error)
    }

    async fn find_project(&self, id: i64) -> ServerResult<ProjectModel> {
        Project::find_by_id(id)
            .one(self)
            .await
            .map_err(ServerError::database_error)?
            .ok_or(ServerError::NotFound)
    }

    async fn index_upload(&self, record: &UploadRecord) -> ServerResult<()> {
        let model = upload::ActiveModel::from_record(record)?;

        Upload::insert(model)
            .exec_without_returning(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn set_profile_picture(&self, user_id: i64, upload: &UploadId) -> ServerResult<()> {
        User::update_many()
            .col_expr(
                user::Column::ProfilePicture,
                Expr::value(upload.as_str().to_owned()),
            )
            .filter(user::Column::Id.eq(user_id))
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(())
    }

    async fn set_project_thumbnail(
        &self,
        project_id: i64,
        author: i64,
        upload: &UploadId,
    ) -> ServerResult<bool> {
        let res = Project::update_many()
            .col_expr(
                project::Column::Thumbnail,
                Expr::value(upload.as_str().to_owned()),
            )
            .filter(project::Column::Id.eq(project_id))
            .filter(project::Column::Author.eq(author))
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        Ok(res.rows_affected > 0)
    }

    async fn insert_project(
        &self,
        author: i64,
        title: String,
        description: String,
        thumbnail: &UploadId,
        file: &UploadId,
    ) -> ServerResult<ProjectModel> {
        let model = project::ActiveModel {
            author: Set(author),
            title: Set(title),
            description: Set(description),
            thumbnail: Set(Some(thumbnail.as_str().to_owned())),
            file: Set(Some(file.as_str().to_owned())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let insertion = Project::insert(model)
            .exec(self)
            .await
            .map_err(ServerError::database_error)?;

        self.find_project(insertion.last_insert_id).await
    }
}
