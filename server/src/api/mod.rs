//! HTTP API.

mod download;
mod v1;

use axum::Router;

use crate::config::IngestConfig;

pub(crate) fn get_router(config: &IngestConfig) -> Router {
    Router::new()
        .merge(download::get_router())
        .merge(v1::get_router(config))
}
