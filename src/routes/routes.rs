//! Defines routes for the image operations.
//!
//! ## Structure
//! - `ANY /images/upload` — upload (handler enforces `POST`)
//! - `ANY /images/list`   — list, `?file_name=&created_at=`
//! - `ANY /images/get`    — get, `?id=`
//! - `ANY /images/delete` — delete (handler enforces `DELETE`)
//! - `GET /healthz`, `GET /readyz`
//!
//! Image routes accept every method so each handler applies its own method
//! check and answers with its own 405 envelope. Request bodies are capped at
//! `body_limit` bytes; a larger upload or delete body gets a 413 envelope.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::{handle_delete, handle_get, handle_list, handle_upload},
    },
    services::image_service::ImageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};

/// Build and return the router for all image routes.
///
/// The router carries the shared `ImageService` to every handler.
pub fn routes(body_limit: usize) -> Router<ImageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/images/upload", any(handle_upload))
        .route("/images/list", any(handle_list))
        .route("/images/get", any(handle_get))
        .route("/images/delete", any(handle_delete))
        .layer(DefaultBodyLimit::max(body_limit))
}
