//! Error types for Med Mirror

use thiserror::Error;

/// Result type alias for Med Mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    HealthImport(#[from] HealthImportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Outbound HTTP errors (image generation, proxy, recommendation service)
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Upstream rejected the request with status {status}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to service".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Failures surfaced by the capture component.
///
/// All of these are recoverable: the component records them as a dismissible
/// message and stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Only image files can be selected (got {0})")]
    InvalidInputKind(String),

    #[error("Camera unavailable: {0}. You can still choose a file instead.")]
    DeviceUnavailable(String),

    #[error("Camera is not ready yet. Wait for the preview to start and try again.")]
    StreamNotReady,

    #[error("Select or capture an image first")]
    NoImage,

    #[error("A prediction is already in progress")]
    PredictionPending,

    #[error("Failed to generate prediction. Please try again.")]
    PredictionFailed,

    #[error("Could not update the local image cache: {0}")]
    Cache(String),
}

impl From<CacheError> for CaptureError {
    fn from(err: CacheError) -> Self {
        CaptureError::Cache(err.to_string())
    }
}

/// Prediction proxy validation and relay errors.
///
/// The display strings are exactly what the HTTP caller sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("Both image and smash data are required")]
    MissingField,

    #[error("Invalid smash data: expected a JSON document")]
    MalformedContext,

    #[error("Image generation service is not configured")]
    ServiceUnavailable,

    #[error("Failed to generate prediction")]
    PredictionFailed,
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `med-mirror init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Recommendation service URL not configured. Set `recommendation_url` in the config.")]
    MissingRecommendationUrl,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Health app export import errors
#[derive(Debug, Error)]
pub enum HealthImportError {
    #[error("No export.xml found in the archive. Is this a Health app export?")]
    MissingExport,

    #[error("Failed to read health export archive: {0}")]
    Archive(String),

    #[error("Failed to parse export.xml: {0}")]
    Xml(String),
}

impl From<zip::result::ZipError> for HealthImportError {
    fn from(err: zip::result::ZipError) -> Self {
        HealthImportError::Archive(err.to_string())
    }
}

impl From<quick_xml::Error> for HealthImportError {
    fn from(err: quick_xml::Error) -> Self {
        HealthImportError::Xml(err.to_string())
    }
}

/// Local cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache lock poisoned")]
    Poisoned,
}
