//! HTTP client for a running prediction proxy

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::PredictionApi;
use super::models::{ErrorBody, ImageUpload, PredictionResponse};
use crate::error::{ApiError, Result};

/// Path of the prediction route on the proxy
pub const PREDICT_PATH: &str = "/api/predict";

/// Calls `POST /api/predict` with `{ image, smash }`
pub struct ProxyClient {
    http: HttpClient,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PredictionApi for ProxyClient {
    async fn predict(&self, image: &ImageUpload, context: &Value) -> Result<PredictionResponse> {
        let url = format!("{}{}", self.base_url, PREDICT_PATH);

        let image_part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid image type: {}", e)))?;
        let form = Form::new()
            .part("image", image_part)
            .text("smash", serde_json::to_string(context)?);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if status.is_success() {
            let data = response.json::<PredictionResponse>().await.map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse prediction: {}", e))
            })?;
            return Ok(data);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        Err(ApiError::Status {
            status: status.as_u16(),
            body: message,
        }
        .into())
    }
}
