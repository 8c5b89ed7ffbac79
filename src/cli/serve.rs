//! Serve command implementation

use crate::config::Config;
use crate::error::Result;
use crate::proxy;

/// Run the prediction proxy until interrupted
pub async fn run(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    log::info!(
        "Forecast horizon {} years, model {}",
        config.generation.horizon_years,
        config.generation.model
    );
    proxy::serve(&config).await
}
