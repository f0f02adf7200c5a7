//! Chromix Sync — stateful synchronization of color-pipeline configuration
//! onto a blob-handle, atomic-commit display controller interface.
//!
//! The synchronizer decides per stage and per frame whether new hardware
//! configuration must be built, reuses previously committed resources when
//! nothing changed, and retires stale resources safely. The stepped dimming
//! controller ramps the tone-curve strength toward its target across frames
//! on an independent schedule.

pub mod dimming;
pub mod layers;
pub mod slots;
pub mod sync;
pub mod transport;

// Re-exports for convenience.
pub use dimming::{DimmingController, DimmingProfile, DimmingSurface};
pub use layers::{LayerAssignmentTable, LayerId};
pub use slots::{ResourceSlotTable, SlotKey};
pub use sync::{FrameReport, LayerError, LayerFrame, LayerKind, PipelineSynchronizer, SyncError};
pub use transport::{
    BlobId, CommitTarget, CommitTransport, PlaneId, PropertyTag, PropertyValue, TransportError,
};
