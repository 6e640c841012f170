use axum::extract::{Extension, Json, Path};
use tracing::instrument;

use crate::error::ServerResult;
use crate::State;
use hatch::api::v1::upload::UploadRecord;
use hatch::id::UploadId;

/// Gets the record of an upload.
///
/// Uploads still being processed are not found.
#[instrument(skip_all, fields(id = %id))]
pub(crate) async fn get_upload(
    Extension(state): Extension<State>,
    Path(id): Path<UploadId>,
) -> ServerResult<Json<UploadRecord>> {
    let ingestor = state.ingestor().await?;
    let record = ingestor.get_file_record(&id).await?;

    Ok(Json(record))
}
