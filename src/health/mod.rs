//! Apple Health import
//!
//! Turns an `export.zip` from the Health app into a patient record of the
//! shape `predict --context` and `recommend` consume. Only what HealthKit
//! actually tracks is filled in; everything else is marked unavailable.

pub mod export;
pub mod summary;

pub use export::read_export;
