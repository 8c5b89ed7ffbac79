//! Clients for the hosted services Med Mirror talks to
//!
//! Each service is reached through a narrow trait so the capture component and
//! the proxy can be exercised without network access.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[cfg(test)]
pub mod mock;
pub mod models;
pub mod openai;
pub mod proxy;
pub mod recommendation;

#[cfg(test)]
pub use mock::{MockImageGenerator, MockPredictor};
pub use models::{ImageEditRequest, ImageUpload, PatientRecord, PredictionResponse, VisitResponse};
pub use openai::OpenAiImageClient;
pub use proxy::ProxyClient;
pub use recommendation::RecommendationClient;

/// Hosted image-generation API
#[async_trait]
pub trait ImageGenerationApi: Send + Sync {
    /// Submit an image plus instruction and return the decoded output image
    async fn edit_image(&self, request: &ImageEditRequest) -> Result<Vec<u8>>;
}

/// The prediction proxy as seen from the capture component
#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// Request a forecast image for `image` given an opaque health context
    async fn predict(&self, image: &ImageUpload, context: &Value) -> Result<PredictionResponse>;
}

/// Remote "visit-crew" recommendation service
#[async_trait]
pub trait RecommendationApi: Send + Sync {
    /// Forward a patient record and return it augmented with recommendations
    async fn visit(&self, record: &Value) -> Result<VisitResponse>;
}
