//! OpenAI image-edit client

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client as HttpClient;
use reqwest::multipart::{Form, Part};

use super::ImageGenerationApi;
use super::models::{ImageEditRequest, ImagesResponse};
use crate::error::{ApiError, Result};

/// Client for `POST /v1/images/edits`.
///
/// No request timeout is set: a slow generation only holds up the caller
/// waiting on it.
pub struct OpenAiImageClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl OpenAiImageClient {
    /// Create a client against `base_url` (e.g. `https://api.openai.com`)
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn build_form(request: &ImageEditRequest) -> Result<Form> {
        let image = Part::bytes(request.image.bytes.clone())
            .file_name(request.image.file_name.clone())
            .mime_str(&request.image.mime_type)
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid image type: {}", e)))?;

        Ok(Form::new()
            .text("model", request.model.clone())
            .text("prompt", request.prompt.clone())
            .text("n", request.n.to_string())
            .text("size", request.size.clone())
            .text("quality", request.quality.clone())
            .part("image", image))
    }
}

#[async_trait]
impl ImageGenerationApi for OpenAiImageClient {
    async fn edit_image(&self, request: &ImageEditRequest) -> Result<Vec<u8>> {
        let url = format!("{}/v1/images/edits", self.base_url);
        let form = Self::build_form(request)?;

        log::debug!(
            "Requesting image edit: model={} size={} quality={}",
            request.model,
            request.size,
            request.quality
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: ImagesResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse image response: {}", e))
        })?;

        let b64 = parsed
            .data
            .into_iter()
            .next()
            .and_then(|img| img.b64_json)
            .ok_or_else(|| ApiError::InvalidResponse("Response contained no image".to_string()))?;

        let bytes = general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| ApiError::InvalidResponse(format!("Image was not base64: {}", e)))?;

        Ok(bytes)
    }
}
