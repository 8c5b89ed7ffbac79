//! Photo acquisition and forecast commands

use chrono::Utc;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::asset::decode_data_url;
use crate::capture::{CaptureComponent, MediaFile, StillCommandCamera};
use crate::cli::cache::EntrySummary;
use crate::cli::{CommandContext, format_size};
use crate::error::{CaptureError, Error, Result};

/// Component for commands that never open the camera
fn file_only_component(ctx: &CommandContext, proxy: Option<&str>) -> Result<CaptureComponent> {
    ctx.component(Arc::new(StillCommandCamera::default()), proxy)
}

/// Print what was cached after a successful acquisition
fn report_cached(ctx: &CommandContext, component: &CaptureComponent, source: &str) -> Result<()> {
    let Some(entry) = ctx.cache().read()? else {
        return Err(Error::Other("photo was not cached".to_string()));
    };
    let summary = EntrySummary::from_entry(&entry);

    if ctx.format.is_json() {
        let value = json!({
            "cached": true,
            "source": source,
            "state": component.state(),
            "mime_type": summary.mime_type,
            "size_bytes": summary.size_bytes,
            "captured_at": summary.captured_at.to_rfc3339(),
            "expires_at": summary.expires_at.to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "{} Photo cached from {} ({}, {})",
            "✓".green(),
            source.bold(),
            summary.mime_type,
            format_size(summary.size_bytes)
        );
        println!("  Expires {}", summary.expires_in(Utc::now()));
    }
    Ok(())
}

/// Select an image file as the current photo
pub async fn upload(ctx: &CommandContext, file: &Path) -> Result<()> {
    let media = MediaFile::from_path(file).await?;
    let component = file_only_component(ctx, None)?;

    component.select_file(media).await?;
    report_cached(ctx, &component, &file.display().to_string())
}

/// Take a photo with the camera as the current photo
pub async fn capture(ctx: &CommandContext, command: &str, output: Option<&Path>) -> Result<()> {
    let component = ctx.component(Arc::new(StillCommandCamera::new(command)), None)?;

    if !ctx.format.is_json() {
        println!("{}", "Starting camera...".cyan());
    }
    component.activate_camera().await?;

    let data_url = match component.capture_photo().await {
        Ok(data_url) => data_url,
        Err(e) => {
            component.dispose().await;
            return Err(e.into());
        }
    };

    if let Some(path) = output {
        write_data_url(&data_url, path).await?;
        log::info!("Captured photo written to {}", path.display());
    }

    report_cached(ctx, &component, command)
}

/// Request a forecast for the current photo
pub async fn predict(
    ctx: &CommandContext,
    context_file: &Path,
    image: Option<&Path>,
    proxy: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let context = read_context(context_file).await?;
    let component = file_only_component(ctx, proxy)?;

    match image {
        Some(path) => {
            component.select_file(MediaFile::from_path(path).await?).await?;
        }
        None => {
            if component.restore().await?.is_none() {
                log::debug!("No fresh cached photo to restore");
            }
        }
    }

    let spinner = (!ctx.format.is_json()).then(|| {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Generating forecast...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let result = component.request_prediction(&context).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if result?.is_none() {
        return Err(CaptureError::PredictionFailed.into());
    }
    let Some(prediction) = component.displayed_image() else {
        return Err(CaptureError::NoImage.into());
    };

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(default_output_path);
    write_data_url(&prediction, &path).await?;

    if ctx.format.is_json() {
        let value = json!({
            "prediction": prediction,
            "state": component.state(),
            "output": path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} Forecast saved to {}", "✓".green(), path.display());
    }
    Ok(())
}

async fn read_context(path: &Path) -> Result<Value> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "forecast-{}.png",
        Utc::now().format("%Y%m%d-%H%M%S")
    ))
}

/// Decode a data URL and write its bytes to `path`
async fn write_data_url(data_url: &str, path: &Path) -> Result<()> {
    let (_, bytes) = decode_data_url(data_url)
        .ok_or_else(|| Error::Other("image is not a base64 data URL".to_string()))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
