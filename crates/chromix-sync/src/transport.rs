//! Commit-transport interface — blob resources and the atomic property
//! batch.
//!
//! The transport is the device boundary: it creates and destroys opaque
//! binary resources ("blobs") and applies batches of property writes
//! atomically. Everything here is synchronous; the commit call is bounded by
//! the underlying device interface.

use chromix_core::stage::{DisplayStage, UnitStage};

/// Handle to a device-side binary resource.
///
/// Zero is the reserved "no resource" handle, used to return a stage to its
/// hardware default. Non-zero handles must be destroyed exactly once;
/// ownership sits with the slot table once a frame commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(u32);

impl BlobId {
    /// The "no resource" handle.
    pub const NONE: Self = Self(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Stable identity of a hardware plane backing a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId(pub u32);

/// Hardware object a property write is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitTarget {
    /// The display controller itself.
    Display,
    /// One hardware plane.
    Plane(PlaneId),
}

/// Property written within an atomic commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyTag {
    /// Blob property of a display-level stage.
    DisplayBlob(DisplayStage),
    /// Scalar force-bit-depth control on the display controller.
    ForceBitDepth,
    /// Blob property of a per-unit stage on a plane.
    PlaneBlob(UnitStage),
}

/// Value carried by a staged property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    Blob(BlobId),
    Scalar(u64),
}

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("blob creation failed: {0}")]
    CreateFailed(String),

    #[error("failed to stage property write: {0}")]
    StageFailed(String),

    #[error("atomic commit rejected: {0}")]
    CommitRejected(String),
}

/// Atomic key/value commit transport to the display controller.
pub trait CommitTransport {
    /// Create a device resource from `bytes` and return its handle.
    fn create_blob(&mut self, bytes: &[u8]) -> Result<BlobId, TransportError>;

    /// Destroy a device resource. Passing [`BlobId::NONE`] is a no-op.
    fn destroy_blob(&mut self, id: BlobId);

    /// Add a property write to the pending atomic batch.
    fn stage_property(
        &mut self,
        target: CommitTarget,
        prop: PropertyTag,
        value: PropertyValue,
    ) -> Result<(), TransportError>;

    /// Submit the pending batch as one atomic commit. The hardware applies
    /// all staged writes or none. The batch is consumed on success and
    /// failure alike.
    fn commit(&mut self) -> Result<(), TransportError>;
}
