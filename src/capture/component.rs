//! The capture/upload component
//!
//! Owns the current image, its forecast and at most one camera stream, and keeps
//! the local cache in step with what it shows.

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;

use super::asset::{ImageAsset, MediaFile};
use super::camera::{CameraDevice, CameraSession, StreamConstraints, rasterize};
use crate::cache::LocalCache;
use crate::client::PredictionApi;
use crate::error::CaptureError;

type Result<T> = std::result::Result<T, CaptureError>;

/// Notified with the new data URL on every acquisition, `""` on removal
pub type UploadCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// JPEG quality used when rasterizing camera frames
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// What the component is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    CameraActive,
    HasImage,
}

#[derive(Default)]
struct Inner {
    asset: Option<ImageAsset>,
    prediction: Option<String>,
    camera_active: bool,
}

/// Capture/upload state machine.
///
/// Every operation reports failures as a [`CaptureError`] and the component
/// stays usable afterwards. Cache updates and the matching state change happen
/// under one acquisition lock, so the cache always holds what is shown.
pub struct CaptureComponent {
    cache: LocalCache,
    camera: Arc<dyn CameraDevice>,
    predictor: Arc<dyn PredictionApi>,
    on_upload: Option<UploadCallback>,
    constraints: StreamConstraints,
    jpeg_quality: u8,
    inner: Mutex<Inner>,
    acquisition: AsyncMutex<()>,
    session: AsyncMutex<Option<CameraSession>>,
    pending: AtomicBool,
    disposed: AtomicBool,
}

/// Clears the pending flag however the request ends
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CaptureComponent {
    pub fn new(
        cache: LocalCache,
        camera: Arc<dyn CameraDevice>,
        predictor: Arc<dyn PredictionApi>,
    ) -> Self {
        Self {
            cache,
            camera,
            predictor,
            on_upload: None,
            constraints: StreamConstraints::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            inner: Mutex::new(Inner::default()),
            acquisition: AsyncMutex::new(()),
            session: AsyncMutex::new(None),
            pending: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with_upload_callback(mut self, callback: UploadCallback) -> Self {
        self.on_upload = Some(callback);
        self
    }

    pub fn with_constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain data; a panic elsewhere can't leave it half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fail<T>(&self, err: CaptureError) -> Result<T> {
        log::warn!("{}", err);
        Err(err)
    }

    fn notify(&self, value: &str) {
        if let Some(cb) = &self.on_upload {
            cb(value);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> CaptureState {
        let inner = self.inner();
        if inner.camera_active {
            CaptureState::CameraActive
        } else if inner.asset.is_some() {
            CaptureState::HasImage
        } else {
            CaptureState::Idle
        }
    }

    pub fn asset(&self) -> Option<ImageAsset> {
        self.inner().asset.clone()
    }

    pub fn prediction(&self) -> Option<String> {
        self.inner().prediction.clone()
    }

    /// The forecast if one exists, otherwise the captured image
    pub fn displayed_image(&self) -> Option<String> {
        let inner = self.inner();
        inner
            .prediction
            .clone()
            .or_else(|| inner.asset.as_ref().map(|a| a.data_url().to_string()))
    }

    /// True while a prediction request is in flight
    pub fn is_prediction_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Restore the cached image, if it is still fresh
    pub async fn restore(&self) -> Result<Option<String>> {
        let _acquiring = self.acquisition.lock().await;
        let entry = match self.cache.read() {
            Ok(entry) => entry,
            Err(e) => return self.fail(e.into()),
        };
        let Some(entry) = entry else {
            return Ok(None);
        };

        {
            let mut inner = self.inner();
            inner.asset = Some(ImageAsset::from_data_url(entry.image.clone()));
            inner.prediction = None;
        }
        log::info!("Restored cached image");
        self.notify(&entry.image);
        Ok(Some(entry.image))
    }

    /// Accept a user-selected file. Only `image/*` types are accepted.
    pub async fn select_file(&self, file: MediaFile) -> Result<String> {
        if !file.is_image() {
            return self.fail(CaptureError::InvalidInputKind(file.mime_type));
        }

        let MediaFile {
            name,
            mime_type,
            bytes,
        } = file;
        log::debug!("Encoding {} ({} bytes)", name, bytes.len());

        let asset = tokio::task::spawn_blocking(move || ImageAsset::from_bytes(bytes, &mime_type))
            .await;
        let asset = match asset {
            Ok(asset) => asset,
            Err(e) => {
                log::error!("Image encoding task failed: {}", e);
                return self.fail(CaptureError::InvalidInputKind(
                    "unreadable image".to_string(),
                ));
            }
        };

        self.accept(asset).await
    }

    /// Cache first, then update state, so a cache failure changes nothing
    async fn accept(&self, asset: ImageAsset) -> Result<String> {
        let _acquiring = self.acquisition.lock().await;
        if self.is_disposed() {
            log::debug!("Ignoring image accepted after dispose");
            return Ok(asset.data_url().to_string());
        }

        if let Err(e) = self.cache.write(asset.data_url()) {
            return self.fail(e.into());
        }

        let data_url = asset.data_url().to_string();
        {
            let mut inner = self.inner();
            inner.asset = Some(asset);
            inner.prediction = None;
        }
        self.notify(&data_url);
        Ok(data_url)
    }

    /// Open the camera, replacing any stream that is already open
    pub async fn activate_camera(&self) -> Result<()> {
        let mut session = self.session.lock().await;

        if let Some(previous) = session.take() {
            log::debug!("Releasing previous camera stream");
            previous.release();
        }
        self.inner().camera_active = false;

        let started = CameraSession::start(self.camera.as_ref(), &self.constraints).await;
        let started = match started {
            Ok(s) => s,
            Err(e) => {
                let err = match e {
                    CaptureError::DeviceUnavailable(_) => e,
                    other => CaptureError::DeviceUnavailable(other.to_string()),
                };
                return self.fail(err);
            }
        };

        if self.is_disposed() {
            started.release();
            return Err(CaptureError::DeviceUnavailable(
                "component was disposed".to_string(),
            ));
        }

        *session = Some(started);
        self.inner().camera_active = true;
        Ok(())
    }

    /// Capture the current frame and close the camera.
    ///
    /// Without a live stream reporting a non-zero frame size this is
    /// `StreamNotReady` and nothing changes.
    pub async fn capture_photo(&self) -> Result<String> {
        let mut guard = self.session.lock().await;

        let Some(session) = guard.as_mut() else {
            return self.fail(CaptureError::StreamNotReady);
        };
        if !session.is_ready() {
            return self.fail(CaptureError::StreamNotReady);
        }

        let frame = match session.grab_frame().await {
            Ok(frame) => frame,
            Err(_) => return self.fail(CaptureError::StreamNotReady),
        };

        let quality = self.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || rasterize(&frame, quality)).await;
        let jpeg = match jpeg {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return self.fail(e),
            Err(e) => {
                log::error!("Frame encoding task failed: {}", e);
                return self.fail(CaptureError::StreamNotReady);
            }
        };

        // From here the stream is closed whatever happens to the image
        let session = guard.take();
        self.inner().camera_active = false;
        drop(guard);

        let result = self
            .accept(ImageAsset::from_bytes(jpeg, "image/jpeg"))
            .await;
        if let Some(session) = session {
            session.release();
        }
        result
    }

    /// Stop the camera and go back to idle. Safe to call repeatedly.
    pub async fn cancel_camera(&self) {
        let mut session = self.session.lock().await;
        if let Some(s) = session.take() {
            s.release();
        }
        self.inner().camera_active = false;
    }

    /// Drop the image, its forecast and the cache entry
    pub async fn remove_image(&self) -> Result<()> {
        let _acquiring = self.acquisition.lock().await;
        if let Err(e) = self.cache.clear() {
            return self.fail(e.into());
        }
        {
            let mut inner = self.inner();
            inner.asset = None;
            inner.prediction = None;
        }
        self.notify("");
        Ok(())
    }

    /// Request a forecast for the current image.
    ///
    /// Returns `Ok(None)` when the result arrived after the image changed or
    /// the component was disposed; such results are dropped.
    pub async fn request_prediction(&self, context: &Value) -> Result<Option<String>> {
        let Some(asset) = self.asset() else {
            return self.fail(CaptureError::NoImage);
        };

        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return self.fail(CaptureError::PredictionPending);
        }
        let _pending = PendingGuard(&self.pending);

        let Some(upload) = asset.upload() else {
            log::error!("Current image cannot be decoded for upload");
            return self.fail(CaptureError::PredictionFailed);
        };

        let requested_for = asset.fingerprint();
        let response = self.predictor.predict(&upload, context).await;

        let prediction = match response {
            Ok(resp) => match resp.prediction {
                Some(p) => {
                    log::info!("Prediction generated by {}", resp.model_used);
                    p
                }
                None => {
                    log::warn!("Prediction service returned no image");
                    return self.fail(CaptureError::PredictionFailed);
                }
            },
            Err(e) => {
                log::warn!("Prediction request failed: {}", e);
                return self.fail(CaptureError::PredictionFailed);
            }
        };

        if self.is_disposed() {
            log::debug!("Discarding prediction that arrived after dispose");
            return Ok(None);
        }

        let mut inner = self.inner();
        let still_current = inner
            .asset
            .as_ref()
            .is_some_and(|a| a.fingerprint() == requested_for);
        if !still_current {
            log::debug!("Discarding prediction for a replaced image");
            return Ok(None);
        }

        inner.prediction = Some(prediction.clone());
        Ok(Some(prediction))
    }

    /// Release the camera and stop applying late results
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.cancel_camera().await;
    }
}
