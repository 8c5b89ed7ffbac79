//! HTTP handlers for the prediction proxy

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::sync::Arc;

use super::AppState;
use crate::client::ImageUpload;
use crate::client::models::ErrorBody;
use crate::error::ProxyError;

/// Media type assumed when the image part does not declare one
const DEFAULT_IMAGE_MIME: &str = "image/png";

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingField | ProxyError::MalformedContext => StatusCode::BAD_REQUEST,
            ProxyError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::PredictionFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// `POST /api/predict`
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            log::debug!("Rejected non-multipart request: {}", rejection.body_text());
            return ProxyError::MissingField.into_response();
        }
    };

    let mut image = None;
    let mut smash = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_failure(e),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let mime = field
                    .content_type()
                    .unwrap_or(DEFAULT_IMAGE_MIME)
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => image = Some(ImageUpload::new(bytes.to_vec(), mime)),
                    Err(e) => return multipart_failure(e),
                }
            }
            Some("smash") => match field.text().await {
                Ok(text) => smash = Some(text),
                Err(e) => return multipart_failure(e),
            },
            other => log::debug!("Ignoring multipart field {:?}", other),
        }
    }

    match state.predictions.predict(image, smash).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            log::debug!("Prediction request rejected: {}", e);
            e.into_response()
        }
    }
}

fn multipart_failure(err: MultipartError) -> Response {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        let body = ErrorBody {
            error: "Upload exceeds the size limit".to_string(),
        };
        return (status, Json(body)).into_response();
    }
    log::debug!("Unreadable multipart body: {}", err.body_text());
    ProxyError::MissingField.into_response()
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
