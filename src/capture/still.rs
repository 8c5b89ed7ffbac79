//! Camera backed by an external still-capture command
//!
//! Each frame is one invocation of a libcamera-style tool (`rpicam-still` by
//! default) writing a JPEG to a temporary file.

use async_trait::async_trait;
use image::RgbImage;
use std::path::PathBuf;
use tokio::process::Command;

use super::camera::{CameraDevice, FacingMode, MediaStream, StreamConstraints};
use crate::error::CaptureError;

/// Default capture tool
pub const DEFAULT_STILL_COMMAND: &str = "rpicam-still";

/// [`CameraDevice`] that shells out to a still-capture tool
pub struct StillCommandCamera {
    command: String,
}

impl StillCommandCamera {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for StillCommandCamera {
    fn default() -> Self {
        Self::new(DEFAULT_STILL_COMMAND)
    }
}

#[async_trait]
impl CameraDevice for StillCommandCamera {
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        // Probe the tool before claiming a stream
        let probe = Command::new(&self.command).arg("--help").output().await;
        match probe {
            Ok(_) => log::info!("Camera available via {}", self.command),
            Err(e) => {
                log::warn!("{} not found: {}", self.command, e);
                return Err(CaptureError::DeviceUnavailable(format!(
                    "{} is not installed",
                    self.command
                )));
            }
        }

        let frame_path = std::env::temp_dir().join(format!(
            "med-mirror-frame-{}-{}.jpg",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        ));

        Ok(Box::new(StillCommandStream {
            command: self.command.clone(),
            width: constraints.ideal_width,
            height: constraints.ideal_height,
            mirror: constraints.facing == FacingMode::User,
            frame_path,
            dimensions: (0, 0),
            stopped: false,
        }))
    }
}

struct StillCommandStream {
    command: String,
    width: u32,
    height: u32,
    mirror: bool,
    frame_path: PathBuf,
    dimensions: (u32, u32),
    stopped: bool,
}

impl StillCommandStream {
    async fn capture(&self) -> Result<RgbImage, CaptureError> {
        if self.stopped {
            return Err(CaptureError::StreamNotReady);
        }

        let path = self.frame_path.to_string_lossy().into_owned();
        let mut args = vec![
            "-o".to_string(),
            path,
            "--width".to_string(),
            self.width.to_string(),
            "--height".to_string(),
            self.height.to_string(),
            "--immediate".to_string(),
            "--nopreview".to_string(),
            "--timeout".to_string(),
            "1000".to_string(),
        ];
        // A user-facing preview is shown mirrored
        if self.mirror {
            args.push("--hflip".to_string());
        }
        log::debug!("Capture command: {} {}", self.command, args.join(" "));

        let output = Command::new(&self.command)
            .args(&args)
            .output()
            .await
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        if !output.status.success() {
            log::warn!(
                "{} failed with status {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(CaptureError::StreamNotReady);
        }

        let frame_path = self.frame_path.clone();
        let decoded = tokio::task::spawn_blocking(move || image::open(&frame_path))
            .await
            .map_err(|_| CaptureError::StreamNotReady)?;

        let _ = tokio::fs::remove_file(&self.frame_path).await;

        match decoded {
            Ok(img) => Ok(img.to_rgb8()),
            Err(e) => {
                log::warn!("Failed to load captured frame: {}", e);
                Err(CaptureError::StreamNotReady)
            }
        }
    }
}

#[async_trait]
impl MediaStream for StillCommandStream {
    async fn loaded_metadata(&mut self) -> Result<(), CaptureError> {
        // The first frame tells us the real size the sensor delivered
        let frame = self
            .capture()
            .await
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        self.dimensions = frame.dimensions();
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.stopped { (0, 0) } else { self.dimensions }
    }

    async fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let frame = self.capture().await?;
        self.dimensions = frame.dimensions();
        Ok(frame)
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if self.frame_path.exists() {
            let _ = std::fs::remove_file(&self.frame_path);
        }
    }
}
