//! Event handlers for the four image operations.
//!
//! Each `*_image(s)` function takes an [`ApiEvent`] and always returns an
//! [`ApiResponse`] envelope: validation and store failures are carried as
//! [`AppError`] until the boundary and only then turned into a status code.
//! The `handle_*` functions adapt plain axum requests into events.

use crate::{
    errors::{AppError, ErrorKind},
    models::{
        event::{ApiEvent, ApiResponse, DeleteResponse, GetResponse, ListResponse, UploadResponse},
        image::ImageFilter,
    },
    services::image_service::ImageService,
};
use axum::{
    extract::{Query, State, rejection::BytesRejection},
    http::{Method, StatusCode},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{error, warn};

/// The four operations an event can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Operation {
    Upload,
    List,
    Get,
    Delete,
}

/// Route an event to the handler for `op`.
pub async fn dispatch(service: &ImageService, op: Operation, event: ApiEvent) -> ApiResponse {
    match op {
        Operation::Upload => upload_image(service, event).await,
        Operation::List => list_images(service, event).await,
        Operation::Get => get_image(service, event).await,
        Operation::Delete => delete_image(service, event).await,
    }
}

/// Upload a base64 payload and record its metadata.
///
/// Expects `POST` with `{"file_name", "file_content", "metadata"?}`.
pub async fn upload_image(service: &ImageService, event: ApiEvent) -> ApiResponse {
    respond(Operation::Upload, upload(service, &event).await)
}

/// List records, optionally filtered by `file_name` and/or `created_at`.
pub async fn list_images(service: &ImageService, event: ApiEvent) -> ApiResponse {
    respond(Operation::List, list(service, &event).await)
}

/// Fetch one record and its blob by `?id=`.
pub async fn get_image(service: &ImageService, event: ApiEvent) -> ApiResponse {
    respond(Operation::Get, get(service, &event).await)
}

/// Delete a blob and its record. Expects `DELETE` with `{"id"}`.
pub async fn delete_image(service: &ImageService, event: ApiEvent) -> ApiResponse {
    respond(Operation::Delete, delete(service, &event).await)
}

fn respond<T: Serialize>(op: Operation, result: Result<T, AppError>) -> ApiResponse {
    match result {
        Ok(body) => ApiResponse::ok(&body),
        Err(err) => {
            if err.kind == ErrorKind::Internal {
                error!("{:?} failed: {}", op, err);
            } else {
                warn!("{:?} rejected ({}): {}", op, err.status(), err);
            }
            err.into_envelope()
        }
    }
}

async fn upload(service: &ImageService, event: &ApiEvent) -> Result<UploadResponse, AppError> {
    if !event.method_is("POST") {
        return Err(AppError::method_not_allowed("Method not allowed, use POST"));
    }
    let body = parse_body(event, "Request body is missing")?;

    let (Some(file_name), Some(file_content)) = (
        string_field(&body, "file_name"),
        string_field(&body, "file_content"),
    ) else {
        return Err(AppError::bad_request("file_name and file_content required"));
    };

    let content = general_purpose::STANDARD
        .decode(file_content)
        .map_err(|_| AppError::bad_request("Invalid base64 for file_content"))?;

    let metadata = match body.get("metadata") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(AppError::bad_request("metadata must be a JSON object")),
    };

    let record = service
        .upload(file_name, Bytes::from(content), metadata)
        .await?;

    Ok(UploadResponse {
        message: "Image uploaded".into(),
        file_name: record.file_name,
        id: record.id,
    })
}

async fn list(service: &ImageService, event: &ApiEvent) -> Result<ListResponse, AppError> {
    let filter = ImageFilter {
        file_name: event.query_param("file_name").map(str::to_string),
        created_at: event.query_param("created_at").map(str::to_string),
    };
    let images = service.list(&filter).await?;
    Ok(ListResponse { images })
}

async fn get(service: &ImageService, event: &ApiEvent) -> Result<GetResponse, AppError> {
    let id = event
        .query_param("id")
        .ok_or_else(|| AppError::bad_request("Missing id in query parameters"))?;

    let (record, content) = service.get(id).await?;

    Ok(GetResponse {
        id: record.id,
        file_name: record.file_name,
        file_content: general_purpose::STANDARD.encode(&content),
        created_at: record.created_at.to_string(),
    })
}

async fn delete(service: &ImageService, event: &ApiEvent) -> Result<DeleteResponse, AppError> {
    if !event.method_is("DELETE") {
        return Err(AppError::method_not_allowed("Method not allowed, use DELETE"));
    }
    let body = parse_body(event, "Request body missing")?;
    let id = string_field(&body, "id").ok_or_else(|| AppError::bad_request("Missing id in body"))?;

    let record = service.delete(id).await?;

    Ok(DeleteResponse {
        message: "Deleted successfully".into(),
        id: record.id,
    })
}

fn parse_body(event: &ApiEvent, missing: &str) -> Result<Value, AppError> {
    let raw = event.body().ok_or_else(|| AppError::bad_request(missing))?;
    serde_json::from_str(raw).map_err(|_| AppError::bad_request("Invalid JSON in body"))
}

/// A non-empty string field of a JSON object body.
fn string_field<'a>(body: &'a Value, name: &str) -> Option<&'a str> {
    body.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Build an event from an HTTP request.
///
/// A body only matters to operations that read one, and only once the
/// method check has passed, so `reads_body` decides whether an unreadable
/// body is an error or is dropped. Bodies that are not UTF-8 cannot be JSON.
fn event_from_request(
    method: Method,
    params: HashMap<String, String>,
    body: Result<Bytes, BytesRejection>,
    reads_body: bool,
) -> Result<ApiEvent, AppError> {
    let body = match body {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(text),
            Err(_) if reads_body => return Err(AppError::bad_request("Invalid JSON in body")),
            Err(_) => None,
        },
        Err(rejection) if reads_body => {
            let kind = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ErrorKind::PayloadTooLarge
            } else {
                ErrorKind::BadRequest
            };
            return Err(AppError::new(kind, rejection.body_text()));
        }
        Err(_) => None,
    };

    Ok(ApiEvent {
        http_method: Some(method.as_str().to_string()),
        body,
        query_string_parameters: (!params.is_empty()).then_some(params),
    })
}

/// `ANY /images/upload`
pub async fn handle_upload(
    State(service): State<ImageService>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    let reads_body = method == Method::POST;
    match event_from_request(method, params, body, reads_body) {
        Ok(event) => upload_image(&service, event).await,
        Err(err) => respond::<UploadResponse>(Operation::Upload, Err(err)),
    }
}

/// `ANY /images/list`
pub async fn handle_list(
    State(service): State<ImageService>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    match event_from_request(method, params, body, false) {
        Ok(event) => list_images(&service, event).await,
        Err(err) => respond::<ListResponse>(Operation::List, Err(err)),
    }
}

/// `ANY /images/get`
pub async fn handle_get(
    State(service): State<ImageService>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    match event_from_request(method, params, body, false) {
        Ok(event) => get_image(&service, event).await,
        Err(err) => respond::<GetResponse>(Operation::Get, Err(err)),
    }
}

/// `ANY /images/delete`
pub async fn handle_delete(
    State(service): State<ImageService>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    let reads_body = method == Method::DELETE;
    match event_from_request(method, params, body, reads_body) {
        Ok(event) => delete_image(&service, event).await,
        Err(err) => respond::<DeleteResponse>(Operation::Delete, Err(err)),
    }
}
