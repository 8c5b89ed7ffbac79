//! Command execution context
//!
//! Loads configuration and opens the image cache once, so handlers only deal
//! with their own work.

use std::sync::Arc;

use crate::cache::{LocalCache, SqliteStore};
use crate::capture::{CameraDevice, CaptureComponent};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::ProxyClient;
use crate::config::Config;
use crate::error::Result;

/// Shared state for command execution
pub struct CommandContext {
    /// Loaded configuration, defaults if no file exists
    pub config: Config,
    /// Output format preference
    pub format: OutputFormat,
    store: Arc<SqliteStore>,
}

impl CommandContext {
    /// Load config from `opts` and open the cache database.
    ///
    /// A missing config file is fine; a malformed one is an error.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_or_default_at(opts.config_ref())?;
        Self::with_config(config, opts.format)
    }

    pub fn with_config(config: Config, format: OutputFormat) -> Result<Self> {
        let store = match &config.cache_dir {
            Some(dir) => SqliteStore::open_at(dir)?,
            None => SqliteStore::open()?,
        };
        log::debug!("Cache database at {}", store.db_path().display());

        Ok(Self {
            config,
            format,
            store: Arc::new(store),
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Image cache on top of the SQLite store
    pub fn cache(&self) -> LocalCache {
        LocalCache::new(self.store.clone())
    }

    /// Build a capture component talking to the prediction proxy.
    ///
    /// `proxy_url` overrides the configured proxy.
    pub fn component(
        &self,
        camera: Arc<dyn CameraDevice>,
        proxy_url: Option<&str>,
    ) -> Result<CaptureComponent> {
        let url = proxy_url.unwrap_or(&self.config.proxy_url);
        let predictor = Arc::new(ProxyClient::new(url)?);

        Ok(
            CaptureComponent::new(self.cache(), camera, predictor)
                .with_constraints(self.config.capture.constraints())
                .with_jpeg_quality(self.config.capture.jpeg_quality)
                .with_upload_callback(Arc::new(|data_url: &str| {
                    if data_url.is_empty() {
                        log::info!("Current photo removed");
                    } else {
                        log::debug!("Current photo updated ({} chars)", data_url.len());
                    }
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_context() -> (CommandContext, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        let ctx = CommandContext::with_config(config, OutputFormat::Json).unwrap();
        (ctx, dir)
    }

    #[test]
    fn test_uses_configured_cache_dir() {
        let (ctx, dir) = test_context();
        assert!(ctx.store().db_path().starts_with(dir.path().join("cache")));
    }

    #[test]
    fn test_cache_round_trip_through_context() {
        let (ctx, _dir) = test_context();
        ctx.cache().write("data:image/png;base64,AAAA").unwrap();

        let entry = ctx.cache().read().unwrap().unwrap();
        assert_eq!(entry.image, "data:image/png;base64,AAAA");
    }
}
