//! Mock service clients for testing
//!
//! Provides in-process implementations of the client traits so the capture
//! component and the proxy can be tested without making real HTTP calls.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use super::models::{ImageEditRequest, ImageUpload, PredictionResponse};
use super::{ImageGenerationApi, PredictionApi};
use crate::error::{ApiError, Result};

/// Mock image-generation API.
///
/// # Example
/// ```ignore
/// let mock = MockImageGenerator::new().with_image(b"png".to_vec()).await;
/// let bytes = mock.edit_image(&request).await?;
/// ```
#[derive(Default)]
pub struct MockImageGenerator {
    /// Bytes returned from edit_image
    image: Arc<Mutex<Vec<u8>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Requests received, in order
    captured: Arc<Mutex<Vec<ImageEditRequest>>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the image bytes to return.
    pub async fn with_image(self, bytes: Vec<u8>) -> Self {
        *self.image.lock().await = bytes;
        self
    }

    /// Configure an error to return on the next call.
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    /// All requests received so far.
    pub async fn captured_requests(&self) -> Vec<ImageEditRequest> {
        self.captured.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.captured.lock().await.len()
    }
}

#[async_trait]
impl ImageGenerationApi for MockImageGenerator {
    async fn edit_image(&self, request: &ImageEditRequest) -> Result<Vec<u8>> {
        self.captured.lock().await.push(request.clone());
        if let Some(e) = self.error.lock().await.take() {
            return Err(e.into());
        }
        Ok(self.image.lock().await.clone())
    }
}

/// A call received by [`MockPredictor`]
#[derive(Debug, Clone)]
pub struct CapturedPrediction {
    pub image: ImageUpload,
    pub context: Value,
}

/// Mock prediction proxy.
///
/// Calls can be held open with [`MockPredictor::hold`] until
/// [`MockPredictor::release`] is called, to test behaviour while a request is
/// in flight.
pub struct MockPredictor {
    prediction: Arc<Mutex<Option<String>>>,
    error: Arc<Mutex<Option<ApiError>>>,
    captured: Arc<Mutex<Vec<CapturedPrediction>>>,
    held: Arc<Mutex<bool>>,
    gate: Arc<Notify>,
    entered: Arc<Notify>,
}

impl Default for MockPredictor {
    fn default() -> Self {
        Self {
            prediction: Arc::new(Mutex::new(Some(
                "data:image/png;base64,cHJlZGljdGlvbg==".to_string(),
            ))),
            error: Arc::new(Mutex::new(None)),
            captured: Arc::new(Mutex::new(Vec::new())),
            held: Arc::new(Mutex::new(false)),
            gate: Arc::new(Notify::new()),
            entered: Arc::new(Notify::new()),
        }
    }
}

impl MockPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the prediction data URL to return.
    pub async fn with_prediction(self, prediction: Option<&str>) -> Self {
        *self.prediction.lock().await = prediction.map(str::to_string);
        self
    }

    /// Configure an error to return on the next call.
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    /// Make the next call fail without rebuilding the mock.
    pub async fn fail_next(&self, error: ApiError) {
        *self.error.lock().await = Some(error);
    }

    /// Block every call until [`MockPredictor::release`] is called.
    pub async fn hold(self) -> Self {
        *self.held.lock().await = true;
        self
    }

    /// Let one held call complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Wait until a call has started.
    pub async fn wait_for_call(&self) {
        self.entered.notified().await;
    }

    pub async fn call_count(&self) -> usize {
        self.captured.lock().await.len()
    }

    pub async fn captured(&self) -> Vec<CapturedPrediction> {
        self.captured.lock().await.clone()
    }
}

#[async_trait]
impl PredictionApi for MockPredictor {
    async fn predict(&self, image: &ImageUpload, context: &Value) -> Result<PredictionResponse> {
        self.captured.lock().await.push(CapturedPrediction {
            image: image.clone(),
            context: context.clone(),
        });
        self.entered.notify_one();

        let held = *self.held.lock().await;
        if held {
            self.gate.notified().await;
        }

        if let Some(e) = self.error.lock().await.take() {
            return Err(e.into());
        }

        Ok(PredictionResponse {
            prediction: self.prediction.lock().await.clone(),
            model_used: "mock-image-model".to_string(),
            timestamp: Utc::now(),
        })
    }
}
