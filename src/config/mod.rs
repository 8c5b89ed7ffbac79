//! Configuration management for Med Mirror

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::{FacingMode, StreamConstraints};
use crate::error::{ConfigError, Result};

/// Environment variable consulted when no API key is stored in the config file
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAI API key used by the prediction proxy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// Image generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Prediction proxy server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Camera capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Base URL of a running prediction proxy (used by `predict`)
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Base URL of the remote recommendation service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Override for the local image cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Settings for the hosted image-generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API base URL (no trailing slash)
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model identifier, echoed back as `model_used`
    #[serde(default = "default_model")]
    pub model: String,

    /// Square output size
    #[serde(default = "default_size")]
    pub size: String,

    /// Rendering quality tier
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Projection horizon embedded in the instruction
    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,
}

/// Settings for the `serve` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: String,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

/// Settings for camera capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// `environment` (rear) or `user` (front, mirrored)
    #[serde(default = "default_facing")]
    pub facing: FacingMode,

    #[serde(default = "default_capture_width")]
    pub width: u32,

    #[serde(default = "default_capture_height")]
    pub height: u32,

    /// JPEG quality for captured frames, 1-100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_facing() -> FacingMode {
    FacingMode::Environment
}

fn default_capture_width() -> u32 {
    1280
}

fn default_capture_height() -> u32 {
    720
}

fn default_jpeg_quality() -> u8 {
    crate::capture::component::DEFAULT_JPEG_QUALITY
}

fn default_proxy_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-image-1".to_string()
}

fn default_size() -> String {
    "1024x1024".to_string()
}

fn default_quality() -> String {
    "medium".to_string()
}

fn default_horizon_years() -> u32 {
    5
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

fn default_body_limit() -> usize {
    20 * 1024 * 1024
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_model(),
            size: default_size(),
            quality: default_quality(),
            horizon_years: default_horizon_years(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: default_facing(),
            width: default_capture_width(),
            height: default_capture_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl CaptureConfig {
    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            facing: self.facing,
            ideal_width: self.width,
            ideal_height: self.height,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
            capture: CaptureConfig::default(),
            proxy_url: default_proxy_url(),
            recommendation_url: None,
            log_level: None,
            cache_dir: None,
        }
    }
}

impl ServerConfig {
    /// Split the configured origins, dropping blanks
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".med-mirror").join("config.yaml"))
    }

    /// Resolve an optional override to a concrete path
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an optional override path
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(&Self::resolve_path(path)?)
    }

    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// Parse errors are still reported; only a missing file is tolerated.
    pub fn load_or_default_at(path: Option<&str>) -> Result<Self> {
        match Self::load_at(path) {
            Ok(config) => Ok(config),
            Err(crate::error::Error::Config(ConfigError::NotFound)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an optional override path
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(&Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // The file holds an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.generation.horizon_years == 0 {
            return Err(
                ConfigError::Invalid("generation.horizon_years must be at least 1".to_string())
                    .into(),
            );
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "capture.jpeg_quality must be between 1 and 100 (got {})",
                self.capture.jpeg_quality
            ))
            .into());
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(
                ConfigError::Invalid("capture.width and capture.height must be non-zero".to_string())
                    .into(),
            );
        }
        if !is_square_size(&self.generation.size) {
            return Err(ConfigError::Invalid(format!(
                "generation.size must be square like 1024x1024 (got {})",
                self.generation.size
            ))
            .into());
        }
        Ok(())
    }

    /// API key from the config file, else from `OPENAI_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(OPENAI_API_KEY_ENV)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Recommendation service URL or a config error
    pub fn require_recommendation_url(&self) -> Result<&str> {
        self.recommendation_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRecommendationUrl.into())
    }
}

fn is_square_size(size: &str) -> bool {
    match size.split_once('x') {
        Some((w, h)) => match (w.parse::<u32>(), h.parse::<u32>()) {
            (Ok(w), Ok(h)) => w == h && w > 0,
            _ => false,
        },
        None => false,
    }
}
