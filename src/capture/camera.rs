//! Camera streams and the scoped session that owns one

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use image::codecs::jpeg::JpegEncoder;

use crate::error::CaptureError;

/// Which camera to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Requested stream shape; devices honour it on a best-effort basis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Source of live camera streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Open a stream. Permission or hardware problems are `DeviceUnavailable`.
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;
}

/// A live stream with one or more tracks
#[async_trait]
pub trait MediaStream: Send {
    /// Resolve once the first frame's metadata is known
    async fn loaded_metadata(&mut self) -> Result<(), CaptureError>;

    /// Current frame size; `(0, 0)` until metadata has loaded
    fn dimensions(&self) -> (u32, u32);

    /// Grab the current frame
    async fn grab_frame(&mut self) -> Result<RgbImage, CaptureError>;

    /// Stop every track. Must be safe to call more than once.
    fn stop(&mut self);
}

/// An open camera stream that is stopped when the session is dropped.
pub struct CameraSession {
    stream: Box<dyn MediaStream>,
}

impl CameraSession {
    /// Open a stream and wait for its first frame metadata.
    ///
    /// If waiting fails the stream is stopped before the error is returned.
    pub async fn start(
        device: &dyn CameraDevice,
        constraints: &StreamConstraints,
    ) -> Result<Self, CaptureError> {
        let stream = device.open(constraints).await?;
        let mut session = Self { stream };
        session.stream.loaded_metadata().await?;

        let (w, h) = session.dimensions();
        log::info!("Camera stream ready at {}x{}", w, h);
        Ok(session)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.stream.dimensions()
    }

    /// True once the stream reports a non-zero frame size
    pub fn is_ready(&self) -> bool {
        let (w, h) = self.dimensions();
        w > 0 && h > 0
    }

    pub async fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        self.stream.grab_frame().await
    }

    /// Stop all tracks now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stream.stop();
        log::debug!("Camera stream released");
    }
}

/// Encode a frame as JPEG at `quality` (1-100)
pub fn rasterize(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(frame)
        .map_err(|e| {
            log::error!("Failed to encode camera frame: {}", e);
            CaptureError::StreamNotReady
        })?;
    Ok(buf)
}

#[cfg(test)]
pub mod fake {
    //! Scriptable camera for tests

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counters shared by a fake device and the streams it opens
    #[derive(Debug, Default)]
    pub struct CameraStats {
        pub opened: AtomicUsize,
        pub live: AtomicUsize,
        pub stop_calls: AtomicUsize,
    }

    impl CameraStats {
        pub fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    /// Device returning streams of a fixed size, or refusing to open
    pub struct FakeCamera {
        pub stats: Arc<CameraStats>,
        pub size: (u32, u32),
        pub deny: bool,
        pub fail_metadata: bool,
    }

    impl FakeCamera {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                stats: Arc::new(CameraStats::default()),
                size: (width, height),
                deny: false,
                fail_metadata: false,
            }
        }

        pub fn denied() -> Self {
            Self {
                deny: true,
                ..Self::new(0, 0)
            }
        }
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn open(
            &self,
            _constraints: &StreamConstraints,
        ) -> Result<Box<dyn MediaStream>, CaptureError> {
            if self.deny {
                return Err(CaptureError::DeviceUnavailable(
                    "permission denied".to_string(),
                ));
            }
            self.stats.opened.fetch_add(1, Ordering::SeqCst);
            self.stats.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStream {
                stats: self.stats.clone(),
                size: self.size,
                loaded: false,
                stopped: false,
                fail_metadata: self.fail_metadata,
            }))
        }
    }

    pub struct FakeStream {
        stats: Arc<CameraStats>,
        size: (u32, u32),
        loaded: bool,
        stopped: bool,
        fail_metadata: bool,
    }

    #[async_trait]
    impl MediaStream for FakeStream {
        async fn loaded_metadata(&mut self) -> Result<(), CaptureError> {
            if self.fail_metadata {
                return Err(CaptureError::DeviceUnavailable(
                    "stream ended before first frame".to_string(),
                ));
            }
            self.loaded = true;
            Ok(())
        }

        fn dimensions(&self) -> (u32, u32) {
            if self.loaded && !self.stopped {
                self.size
            } else {
                (0, 0)
            }
        }

        async fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
            let (w, h) = self.dimensions();
            if w == 0 || h == 0 {
                return Err(CaptureError::StreamNotReady);
            }
            Ok(RgbImage::from_fn(w, h, |x, y| {
                image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
            }))
        }

        fn stop(&mut self) {
            self.stats.stop_calls.fetch_add(1, Ordering::SeqCst);
            if !self.stopped {
                self.stopped = true;
                self.stats.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
