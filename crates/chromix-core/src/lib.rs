//! Chromix Core — domain layer for display color-pipeline state.
//!
//! This crate contains the stage model (per-unit and per-display pipeline
//! stages with their typed register payloads), payload-to-blob encoding,
//! hardware capability descriptors, and the interface to the external color
//! engine that computes the actual coefficients. No synchronization state or
//! device dependencies.

pub mod capability;
pub mod encode;
pub mod engine;
pub mod error;
pub mod stage;

// Re-exports for convenience.
pub use capability::{DisplayCapabilities, UnitCapabilities};
pub use engine::{ColorEngine, StageRef, UnitStageSource};
pub use error::EncodeError;
pub use stage::{DisplayStage, StageConfig, UnitStage};
