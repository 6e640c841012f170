mod get_upload;
mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::config::IngestConfig;

pub(crate) fn get_router(config: &IngestConfig) -> Router {
    let images = DefaultBodyLimit::max(config.max_image_upload_size);
    let projects = DefaultBodyLimit::max(config.max_project_upload_size);

    Router::new()
        .route(
            "/uploads/pfp",
            post(upload::upload_pfp).layer(images.clone()),
        )
        .route(
            "/uploads/thumbnail",
            post(upload::upload_thumbnail).layer(images),
        )
        .route(
            "/uploads/project",
            post(upload::upload_project).layer(projects),
        )
        .route("/_api/v1/uploads/:id", get(get_upload::get_upload))
}
