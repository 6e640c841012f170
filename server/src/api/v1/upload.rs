//! Upload endpoints.
//!
//! All uploads are `multipart/form-data`. File fields are streamed
//! straight into the ingestion pipeline without being buffered in memory.

use std::io;

use anyhow::anyhow;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Extension, Json, Multipart, Query};
use axum::http::StatusCode;
use futures::stream::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::instrument;

use crate::database::HatchDatabase;
use crate::error::{ServerError, ServerResult};
use crate::ingest::{PendingImage, PendingProject};
use crate::{RequestState, State};
use hatch::api::v1::upload::{ProjectUploadResult, UploadRecord};
use hatch::bucket::Bucket;

#[derive(Debug, Deserialize)]
pub(crate) struct ThumbnailQuery {
    /// The project to attach the thumbnail to.
    project: Option<i64>,
}

/// Uploads a profile picture.
///
/// The uploader's profile picture is replaced.
#[instrument(skip_all)]
pub(crate) async fn upload_pfp(
    Extension(state): Extension<State>,
    Extension(req_state): Extension<RequestState>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadRecord>> {
    let identity = req_state.auth.require_uploader()?;
    let ingestor = state.ingestor().await?;

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = file_name(&field);
        let record = ingestor
            .ingest_image(Bucket::Pfps, field_reader(field), filename, identity.id, None)
            .await?;

        return Ok(Json(record));
    }

    Err(missing_field("file"))
}

/// Uploads a thumbnail.
///
/// With `?project=<id>`, the thumbnail of the project is replaced.
#[instrument(skip_all, fields(project = query.project))]
pub(crate) async fn upload_thumbnail(
    Extension(state): Extension<State>,
    Extension(req_state): Extension<RequestState>,
    Query(query): Query<ThumbnailQuery>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadRecord>> {
    let identity = req_state.auth.require_uploader()?;
    let ingestor = state.ingestor().await?;

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = file_name(&field);
        let record = ingestor
            .ingest_image(
                Bucket::Thumbnails,
                field_reader(field),
                filename,
                identity.id,
                query.project,
            )
            .await?;

        return Ok(Json(record));
    }

    Err(missing_field("file"))
}

/// Creates a project.
///
/// The fields are `file`, `thumbnail`, `title` and `description`, in
/// any order. The archive is validated before the response is sent,
/// and finished in the background. The returned `file` record is
/// provisional.
///
/// Both files are only staged while the fields are read. Nothing is
/// stored or indexed unless the whole request is valid.
#[instrument(skip_all)]
pub(crate) async fn upload_project(
    Extension(state): Extension<State>,
    Extension(req_state): Extension<RequestState>,
    mut multipart: Multipart,
) -> ServerResult<Json<ProjectUploadResult>> {
    let identity = req_state.auth.require_uploader()?;
    let ingestor = state.ingestor().await?;
    let database = state.database().await?;

    let mut file: Option<PendingProject> = None;
    let mut thumbnail: Option<PendingImage> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some("file") => {
                reject_duplicate("file", file.is_some())?;
                let filename = file_name(&field);
                file = Some(
                    ingestor
                        .stage_project(field_reader(field), filename, identity.id)
                        .await?,
                );
            }
            Some("thumbnail") => {
                reject_duplicate("thumbnail", thumbnail.is_some())?;
                let filename = file_name(&field);
                thumbnail = Some(
                    ingestor
                        .stage_image(
                            Bucket::Thumbnails,
                            field_reader(field),
                            filename,
                            identity.id,
                        )
                        .await?,
                );
            }
            Some("title") => {
                title = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("description") => {
                description = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                tracing::debug!("Ignoring field {:?}", name);
            }
        }
    }

    let file = file.ok_or_else(|| missing_field("file"))?;
    let thumbnail = thumbnail.ok_or_else(|| missing_field("thumbnail"))?;
    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| missing_field("title"))?;
    let description = description.unwrap_or_default();

    let thumbnail = ingestor.commit_image(thumbnail, None).await?;

    let project = database
        .insert_project(
            identity.id,
            title,
            description,
            &thumbnail.id,
            &file.record().id,
        )
        .await?;

    // The completion is detached and reports its own failures
    let record = file.record().clone();
    let _ = ingestor.spawn_completion(file);

    tracing::info!("Created project {} with upload {}", project.id, record.id);

    Ok(Json(ProjectUploadResult {
        project: project.to_project_info(),
        file: record,
        thumbnail,
    }))
}

async fn next_field(multipart: &mut Multipart) -> ServerResult<Option<Field<'_>>> {
    multipart.next_field().await.map_err(multipart_error)
}

fn file_name(field: &Field<'_>) -> String {
    field.file_name().unwrap_or("upload").to_owned()
}

/// Turns a file field into a reader for the pipeline.
///
/// Errors in the body (like exceeding the size limit) are carried
/// through the reader as `ServerError`s.
fn field_reader<'a>(field: Field<'a>) -> impl AsyncRead + Unpin + Send + 'a {
    let stream = field.map(|chunk| {
        chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, multipart_error(e)))
    });

    StreamReader::new(stream.boxed())
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge
    } else {
        ServerError::request_error(e)
    }
}

fn missing_field(name: &str) -> ServerError {
    ServerError::RequestError(anyhow!("Missing field \"{}\"", name))
}

fn reject_duplicate(name: &str, seen: bool) -> ServerResult<()> {
    if seen {
        return Err(ServerError::RequestError(anyhow!(
            "Duplicate field \"{}\"",
            name
        )));
    }

    Ok(())
}
