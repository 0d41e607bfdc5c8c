//! Invocation event and response envelope, plus the JSON bodies carried
//! inside the envelope.
//!
//! An event looks like
//! `{"httpMethod": "POST", "body": "{...}", "queryStringParameters": {...}}`
//! and every handler answers with `{"statusCode": 200, "body": "{...}"}`,
//! where `body` is itself a JSON-encoded string.

use crate::models::image::ImageRecord;
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An HTTP-shaped request handed to one of the image handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default)]
    pub http_method: Option<String>,

    /// Raw request body (JSON text) if one was sent.
    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl ApiEvent {
    pub fn method_is(&self, method: &str) -> bool {
        self.http_method.as_deref() == Some(method)
    }

    /// The body, or `None` when absent or empty.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    /// A query parameter, or `None` when absent or empty.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// The `{statusCode, body}` envelope returned by every handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
}

impl ApiResponse {
    /// Serialize `body` into the envelope with the given status.
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_string(body) {
            Ok(body) => Self {
                status_code: status.as_u16(),
                body,
            },
            Err(err) => Self {
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                body: serde_json::json!({ "error": err.to_string() }).to_string(),
            },
        }
    }

    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self::json(StatusCode::OK, body)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_name: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetResponse {
    pub id: String,
    pub file_name: String,
    /// Blob bytes, standard base64.
    pub file_content: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}
