//! Image acquisition: file selection, camera capture and forecasts

pub mod asset;
pub mod camera;
pub mod component;
pub mod still;

pub use asset::MediaFile;
pub use camera::{CameraDevice, FacingMode, StreamConstraints};
pub use component::CaptureComponent;
pub use still::StillCommandCamera;
