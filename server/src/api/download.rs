//! Downloads of stored uploads.
//!
//! Upload ids are never reused and the bytes behind an id never change,
//! so responses can be cached forever.

use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{
        header::{
            CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH,
        },
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::error::{ServerError, ServerResult};
use crate::State;
use hatch::api::v1::upload::UploadRecord;
use hatch::id::UploadId;
use hatch::mime;

const CACHE_FOREVER: &str = "public, max-age=31536000";

/// Gets the bytes of an upload.
///
/// - GET `/uploads/:id`
#[instrument(skip_all, fields(id = %id))]
async fn get_upload_file(
    Extension(state): Extension<State>,
    Path(id): Path<UploadId>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let ingestor = state.ingestor().await?;
    let record = ingestor.get_file_record(&id).await?;
    let etag = format!("\"{}\"", id);

    let if_none_match = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());

    if let Some(if_none_match) = if_none_match {
        if etag_matches(if_none_match, &id) {
            return Ok((
                StatusCode::NOT_MODIFIED,
                [(ETAG, etag), (CACHE_CONTROL, CACHE_FOREVER.to_string())],
            )
                .into_response());
        }
    }

    // Indexed records always have a hash
    let key = record.content_hash.as_ref().ok_or(ServerError::NoSuchUpload)?;
    let download = ingestor.get_object(record.bucket, key).await?;

    let body = Body::from_stream(ReaderStream::new(download.stream));

    Ok((
        [
            (CONTENT_TYPE, record.mime.clone()),
            (CONTENT_LENGTH, download.size.to_string()),
            (ETAG, etag),
            (CACHE_CONTROL, CACHE_FOREVER.to_string()),
            (CONTENT_DISPOSITION, content_disposition(&record)),
        ],
        body,
    )
        .into_response())
}

/// Returns whether an `If-None-Match` header matches an upload.
///
/// Clients that strip the quotes are tolerated.
fn etag_matches(if_none_match: &str, id: &UploadId) -> bool {
    if_none_match.split(',').any(|tag| {
        let tag = tag.trim();
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(tag);

        tag == "*" || tag == id.as_str()
    })
}

fn content_disposition(record: &UploadRecord) -> String {
    let disposition = if mime::is_image(&record.mime) {
        "inline"
    } else {
        "attachment"
    };

    match mime::download_extension(&record.mime) {
        Some(ext) => format!("{}; filename=\"{}.{}\"", disposition, record.id, ext),
        None => format!("{}; filename=\"{}\"", disposition, record.id),
    }
}

pub fn get_router() -> Router {
    Router::new().route("/uploads/:id", get(get_upload_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    use hatch::bucket::Bucket;

    fn record(mime: &str) -> UploadRecord {
        UploadRecord {
            id: UploadId::generate(),
            bucket: Bucket::Projects,
            content_hash: None,
            filename: "My Game.sb3".to_string(),
            mime: mime.to_string(),
            uploader_id: 1,
            upload_timestamp: None,
            size_bytes: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_etag_matches() {
        let id = UploadId::generate();

        assert!(etag_matches(&format!("\"{}\"", id), &id));
        assert!(etag_matches(id.as_str(), &id));
        assert!(etag_matches(&format!("W/\"{}\"", id), &id));
        assert!(etag_matches(&format!("\"other\", \"{}\"", id), &id));
        assert!(etag_matches("*", &id));

        assert!(!etag_matches("\"other\"", &id));
        assert!(!etag_matches("", &id));
    }

    #[test]
    fn test_content_disposition() {
        let project = record(mime::ZIP);
        assert_eq!(
            format!("attachment; filename=\"{}.sb3\"", project.id),
            content_disposition(&project)
        );

        let image = record(mime::WEBP);
        assert_eq!(
            format!("inline; filename=\"{}.webp\"", image.id),
            content_disposition(&image)
        );

        let unknown = record(mime::OCTET_STREAM);
        assert_eq!(
            format!("attachment; filename=\"{}\"", unknown.id),
            content_disposition(&unknown)
        );
    }
}
