//! Validation and translation behind `POST /api/predict`

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::prompt::build_instruction;
use crate::capture::asset::encode_data_url;
use crate::client::{
    ImageEditRequest, ImageGenerationApi, ImageUpload, OpenAiImageClient, PredictionResponse,
};
use crate::config::{Config, GenerationConfig};
use crate::error::{ProxyError, Result};

/// Media type of images returned by the generation API
const OUTPUT_MIME: &str = "image/png";

/// Stateless relay to the image-generation API.
///
/// Holds no per-request state; every call is independent.
pub struct PredictionService {
    generator: Option<Arc<dyn ImageGenerationApi>>,
    settings: GenerationConfig,
}

impl PredictionService {
    pub fn new(generator: Option<Arc<dyn ImageGenerationApi>>, settings: GenerationConfig) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Build the OpenAI-backed service.
    ///
    /// A missing API key is not an error here; requests answer
    /// `ServiceUnavailable` until one is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator: Option<Arc<dyn ImageGenerationApi>> = match config.resolved_api_key() {
            Some(key) => Some(Arc::new(OpenAiImageClient::new(
                key,
                config.generation.base_url.clone(),
            )?)),
            None => {
                log::debug!("No OpenAI API key configured");
                None
            }
        };
        Ok(Self::new(generator, config.generation.clone()))
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Validate the request fields and relay them.
    ///
    /// Checks run in order: both fields present, context parses, credential
    /// configured. Downstream failures are logged and collapsed to
    /// `PredictionFailed`.
    pub async fn predict(
        &self,
        image: Option<ImageUpload>,
        smash: Option<String>,
    ) -> std::result::Result<PredictionResponse, ProxyError> {
        let image = image.filter(|i| !i.bytes.is_empty());
        let smash = smash.filter(|s| !s.trim().is_empty());
        let (Some(image), Some(smash)) = (image, smash) else {
            return Err(ProxyError::MissingField);
        };

        let context: Value =
            serde_json::from_str(&smash).map_err(|_| ProxyError::MalformedContext)?;

        let Some(generator) = &self.generator else {
            return Err(ProxyError::ServiceUnavailable);
        };

        let request = ImageEditRequest {
            image,
            prompt: build_instruction(&context, self.settings.horizon_years),
            model: self.settings.model.clone(),
            size: self.settings.size.clone(),
            quality: self.settings.quality.clone(),
            n: 1,
        };

        log::info!(
            "Generating {}-year forecast ({} byte image)",
            self.settings.horizon_years,
            request.image.bytes.len()
        );

        let bytes = generator.edit_image(&request).await.map_err(|e| {
            match &e {
                crate::error::Error::Api(crate::error::ApiError::Status { status, body }) => {
                    log::error!("Image generation failed with status {}: {}", status, body)
                }
                other => log::error!("Image generation failed: {}", other),
            }
            ProxyError::PredictionFailed
        })?;

        Ok(PredictionResponse {
            prediction: Some(encode_data_url(OUTPUT_MIME, &bytes)),
            model_used: self.settings.model.clone(),
            timestamp: Utc::now(),
        })
    }
}
