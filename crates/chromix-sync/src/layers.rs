//! Per-frame layer-to-unit assignments with previous-frame diffing.
//!
//! The table is rebuilt every frame: a snapshot of the previous frame's
//! assignments is kept so that a layer landing on a different hardware plane
//! can be detected. A plane change forces the unit's stages to be rebuilt
//! even when their data is clean, because the new plane's properties have
//! never seen the current configuration.

use std::collections::HashMap;

use crate::transport::PlaneId;

/// Stable handle the composition framework uses to identify a layer.
///
/// Valid for the duration of one `synchronize_frame` call; the table keeps
/// only plain value data, so layers that disappear simply drop out on the
/// next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, Copy)]
struct Assignment {
    unit: usize,
    plane: Option<PlaneId>,
}

/// Mapping from layer to processing unit and last-seen plane.
#[derive(Debug, Default)]
pub struct LayerAssignmentTable {
    current: HashMap<LayerId, Assignment>,
    previous: HashMap<LayerId, Assignment>,
}

impl LayerAssignmentTable {
    /// Start a new frame: snapshot the current assignments for diffing and
    /// clear the working table.
    pub fn begin_frame(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    /// Record that `layer` is processed by `unit` this frame.
    pub fn assign(&mut self, layer: LayerId, unit: usize) {
        self.current.insert(
            layer,
            Assignment {
                unit,
                plane: None,
            },
        );
    }

    /// Record the plane now backing `layer` and report whether it differs
    /// from the previous frame. A layer unseen last frame counts as changed.
    pub fn record_plane(&mut self, layer: LayerId, plane: PlaneId) -> bool {
        let changed = self
            .previous
            .get(&layer)
            .is_none_or(|a| a.plane != Some(plane));
        if let Some(assignment) = self.current.get_mut(&layer) {
            assignment.plane = Some(plane);
        }
        changed
    }

    /// Unit assigned to `layer` this frame.
    pub fn unit_for(&self, layer: LayerId) -> Option<usize> {
        self.current.get(&layer).map(|a| a.unit)
    }

    /// Forget everything known about `layer`, including the previous-frame
    /// snapshot, so its next appearance is treated as a fresh assignment.
    pub fn reset(&mut self, layer: LayerId) {
        self.current.remove(&layer);
        self.previous.remove(&layer);
    }

    /// Number of layers assigned this frame.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
