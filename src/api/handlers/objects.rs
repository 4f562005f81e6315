use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppMultipart, AppPath, AppQuery, UploadReceipt};
use crate::media;
use crate::object_store::{validate_key, ObjectStoreError};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReadParams {
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Route: POST /
/// Multipart fields: `image` (binary), `key`, optional `contentType`.
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    let mut payload: Option<Bytes> = None;
    let mut part_type: Option<String> = None;
    let mut key: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "image" => {
                part_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "Object exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }
                payload = Some(data);
            }
            "key" => {
                key = Some(field.text().await.map_err(multipart_error)?);
            }
            "contentType" => {
                content_type = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    let (Some(payload), Some(key)) = (payload, key) else {
        return Err(ApiError::bad_request("Missing image or key"));
    };
    validate_key(&key).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let content_type =
        media::infer_upload_content_type(content_type.as_deref(), part_type.as_deref(), &key);
    let byte_size = payload.len();

    state
        .object_store
        .put(&key, payload, Some(&content_type))
        .await
        .map_err(|e| {
            tracing::error!(key = %key, error = %e, "Upload failed");
            ApiError::internal(e.to_string())
        })?;

    tracing::debug!(key = %key, content_type = %content_type, bytes = byte_size, "Stored object");

    let url = format!("{}/{}", state.config.storage.public_base_url, key);
    Ok(Json(UploadReceipt {
        success: true,
        key,
        url,
    }))
}

/// Route: GET /?path=<key>
pub async fn read_object(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ReadParams>,
) -> Result<Response, ApiError> {
    let key = params
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing path"))?;

    serve_object(&state, key.trim()).await
}

/// Route: GET /*key, with `?path=` taking precedence when present.
pub async fn read_object_at_path(
    State(state): State<Arc<AppState>>,
    AppPath(key): AppPath<String>,
    AppQuery(params): AppQuery<ReadParams>,
) -> Result<Response, ApiError> {
    let key = params
        .path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(key);

    serve_object(&state, key.trim()).await
}

// ============================================================================
// Helpers
// ============================================================================

async fn serve_object(state: &AppState, key: &str) -> Result<Response, ApiError> {
    let object = state.object_store.get(key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) => ApiError::not_found("Object not found"),
        ObjectStoreError::InvalidKey(_) => ApiError::bad_request(e.to_string()),
        _ => {
            tracing::error!(key = %key, error = %e, "Read failed");
            ApiError::internal(e.to_string())
        }
    })?;

    let content_type = media::resolve_content_type(object.content_type.as_deref(), key);
    let body = if media::is_binary(&content_type) {
        Body::from(object.data)
    } else {
        Body::from(String::from_utf8_lossy(&object.data).into_owned())
    };

    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or(HeaderValue::from_static(media::OCTET_STREAM)),
    );

    tracing::debug!(key = %key, content_type = %content_type, "Served object");
    Ok(response)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}
