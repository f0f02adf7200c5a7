//! Per-frame pipeline synchronization: decide, build, stage, commit, retire.
//!
//! For every hardware stage on every frame the synchronizer decides whether
//! a new device resource must be built, reuses the previously committed one
//! when nothing changed, and stages the resulting property writes into one
//! atomic commit. Slot-table bookkeeping is deferred until the commit
//! succeeds so that a rejected frame leaves the staleness state exactly as
//! it was and the next frame retries cleanly.

use chromix_core::capability::DisplayCapabilities;
use chromix_core::encode;
use chromix_core::engine::{ColorEngine, StageRef};
use chromix_core::error::EncodeError;
use chromix_core::stage::{DisplayStage, StageConfig, UnitStage};

use crate::layers::{LayerAssignmentTable, LayerId};
use crate::slots::{ResourceSlotTable, SlotKey};
use crate::transport::{
    BlobId, CommitTarget, CommitTransport, PlaneId, PropertyTag, PropertyValue,
};

/// Scalar value for the force-bit-depth control: leave the depth to the
/// hardware.
pub const BIT_DEPTH_UNSPECIFIED: u64 = 0;
/// Scalar value for the force-bit-depth control: force a 10-bit output path.
pub const BIT_DEPTH_FORCE_10: u64 = 10;

/// Kind of composition source behind a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// An application layer on its own plane.
    Overlay,
    /// The blended fallback target. Passes through silently when the engine
    /// has no data for it.
    ClientTarget,
}

/// One layer submitted for color synchronization this frame.
#[derive(Debug, Clone, Copy)]
pub struct LayerFrame {
    pub id: LayerId,
    /// Hardware plane backing the layer this frame.
    pub plane: PlaneId,
    pub kind: LayerKind,
    /// Color conversion already happened upstream; the layer's unit stages
    /// must not be touched.
    pub preconverted: bool,
}

impl LayerFrame {
    pub fn overlay(id: LayerId, plane: PlaneId) -> Self {
        Self {
            id,
            plane,
            kind: LayerKind::Overlay,
            preconverted: false,
        }
    }

    pub fn client_target(id: LayerId, plane: PlaneId) -> Self {
        Self {
            id,
            plane,
            kind: LayerKind::ClientTarget,
            preconverted: false,
        }
    }
}

/// Why a layer fell back to un-color-managed composition. Recoverable and
/// per-layer; the rest of the frame proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    #[error("no processing unit available at index {0}")]
    NoUnitAvailable(usize),

    #[error("color engine has no data for processing unit {0}")]
    MissingUnitData(usize),
}

/// Frame-level synchronization failure. The slot table is left at its
/// pre-frame state; the next frame runs under forced refresh.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("stage payload rejected: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
}

/// Outcome of one successfully committed frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Layers that fell back to un-color-managed composition.
    pub layer_errors: Vec<(LayerId, LayerError)>,
    /// Solid fill color resolved for each color-managed layer, packed ARGB.
    pub solid_colors: Vec<(LayerId, u32)>,
}

/// What to do for one stage this frame.
enum StageAction {
    /// Nothing changed; the committed resource stays valid.
    Reuse,
    /// Return the stage to its hardware default (no resource).
    Clear,
    /// Commit a freshly encoded resource.
    Build(Vec<u8>),
}

/// Apply the per-stage decision rules to one stage configuration.
fn prepare<T>(
    cfg: &StageConfig<T>,
    forced: bool,
    encoder: impl FnOnce(&T) -> Result<Option<Vec<u8>>, EncodeError>,
) -> Result<StageAction, EncodeError> {
    if cfg.is_enabled() && !cfg.is_dirty() && !forced {
        return Ok(StageAction::Reuse);
    }
    if !cfg.is_enabled() {
        return Ok(StageAction::Clear);
    }
    let payload = cfg.payload().ok_or(EncodeError::MissingPayload)?;
    Ok(match encoder(payload)? {
        Some(bytes) => StageAction::Build(bytes),
        None => StageAction::Clear,
    })
}

/// Slot updates and fresh resources accumulated while staging a frame.
///
/// Applied to the slot table only after the atomic commit succeeds; on
/// failure the fresh resources are destroyed and the table is untouched.
#[derive(Default)]
struct PendingFrame {
    created: Vec<BlobId>,
    updates: Vec<(SlotKey, BlobId)>,
    bit_depth: Option<u64>,
}

/// The central per-display state machine.
///
/// One instance per display, driven to completion once per frame; not
/// reentrant. All hardware-facing calls go through the transport passed into
/// each operation.
#[derive(Debug)]
pub struct PipelineSynchronizer {
    caps: DisplayCapabilities,
    slots: ResourceSlotTable,
    layers: LayerAssignmentTable,
    /// Last scalar value written to the force-bit-depth control.
    last_bit_depth: Option<u64>,
    /// Whether the most recent frame delivered its color settings. Starts
    /// false so the first frame runs under forced refresh.
    settings_delivered: bool,
    /// External full-resend request (display power-on transition).
    force_resend: bool,
}

impl PipelineSynchronizer {
    pub fn new(caps: DisplayCapabilities) -> Self {
        let slots = ResourceSlotTable::new(caps.unit_count());
        Self {
            caps,
            slots,
            layers: LayerAssignmentTable::default(),
            last_bit_depth: None,
            settings_delivered: false,
            force_resend: false,
        }
    }

    /// Request a full color resend on the next frame, bypassing every reuse
    /// shortcut. Used on display power-on transitions.
    pub fn set_force_full_resend(&mut self) {
        self.force_resend = true;
    }

    /// Unit assigned to `layer` this frame, if any.
    pub fn assigned_unit(&self, layer: LayerId) -> Option<usize> {
        self.layers.unit_for(layer)
    }

    /// Forget the mapping state for `layer`; its next appearance is treated
    /// as a fresh assignment and refreshed unconditionally.
    pub fn reset_layer(&mut self, layer: LayerId) {
        self.layers.reset(layer);
    }

    /// Number of slots currently holding a committed resource.
    pub fn occupied_slots(&self) -> usize {
        self.slots.occupied()
    }

    /// Drop all synchronization state and retire every committed resource.
    /// Must be called on display reconnect or reinitialization; stored
    /// handles must never be reused across a device reset.
    pub fn reset(&mut self, transport: &mut dyn CommitTransport) {
        self.slots.clear_all(transport);
        self.layers = LayerAssignmentTable::default();
        self.last_bit_depth = None;
        self.settings_delivered = false;
        self.force_resend = false;
    }

    /// Synchronize one frame: stage the display and per-unit color state
    /// into the transport's pending batch and submit it atomically.
    ///
    /// On success the report lists layers that fell back to un-color-managed
    /// composition and the solid fill colors resolved for the rest. On
    /// failure nothing reached the hardware, no bookkeeping changed, and the
    /// next frame retries under forced refresh.
    pub fn synchronize_frame<E: ColorEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        transport: &mut dyn CommitTransport,
        frame_layers: &[LayerFrame],
    ) -> Result<FrameReport, SyncError> {
        let force = self.force_resend || !self.settings_delivered;
        let mut pending = PendingFrame::default();
        let mut report = FrameReport::default();

        match self.run_frame(engine, transport, frame_layers, force, &mut pending, &mut report) {
            Ok(()) => {
                for (slot, id) in pending.updates.drain(..) {
                    self.slots.set(transport, slot, id);
                }
                if let Some(depth) = pending.bit_depth {
                    self.last_bit_depth = Some(depth);
                }
                self.settings_delivered = true;
                self.force_resend = false;
                Ok(report)
            }
            Err(e) => {
                for id in pending.created.drain(..) {
                    transport.destroy_blob(id);
                }
                self.settings_delivered = false;
                Err(e)
            }
        }
    }

    fn run_frame<E: ColorEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        transport: &mut dyn CommitTransport,
        frame_layers: &[LayerFrame],
        force: bool,
        pending: &mut PendingFrame,
        report: &mut FrameReport,
    ) -> Result<(), SyncError> {
        self.stage_display_set(engine, transport, force, pending)?;
        self.stage_layer_set(engine, transport, frame_layers, force, pending, report)?;
        transport.commit()?;
        Ok(())
    }

    /// Stage the per-display singleton batch: the LUT and matrix stages,
    /// then the composite control stage (both dithers plus the scalar
    /// bit-depth property).
    fn stage_display_set<E: ColorEngine + ?Sized>(
        &self,
        engine: &mut E,
        transport: &mut dyn CommitTransport,
        force: bool,
        pending: &mut PendingFrame,
    ) -> Result<(), SyncError> {
        if self.stage_display_blob(transport, pending, DisplayStage::CgcLut, force, engine.cgc(), |c| {
            encode::cgc(c).map(Some)
        })? {
            engine.notify_data_applied(StageRef::Display(DisplayStage::CgcLut));
        }
        if self.stage_display_blob(
            transport,
            pending,
            DisplayStage::DegammaLut,
            force,
            engine.degamma(),
            |c| encode::degamma(self.caps.degamma_lut_len, c).map(Some),
        )? {
            engine.notify_data_applied(StageRef::Display(DisplayStage::DegammaLut));
        }
        if self.stage_display_blob(
            transport,
            pending,
            DisplayStage::RegammaLut,
            force,
            engine.regamma(),
            |c| encode::regamma(self.caps.regamma_lut_len, c).map(Some),
        )? {
            engine.notify_data_applied(StageRef::Display(DisplayStage::RegammaLut));
        }
        if self.stage_display_blob(
            transport,
            pending,
            DisplayStage::GammaMatrix,
            force,
            engine.gamma_matrix(),
            |c| encode::display_matrix(c).map(Some),
        )? {
            engine.notify_data_applied(StageRef::Display(DisplayStage::GammaMatrix));
        }
        if self.stage_display_blob(
            transport,
            pending,
            DisplayStage::LinearMatrix,
            force,
            engine.linear_matrix(),
            |c| encode::display_matrix(c).map(Some),
        )? {
            engine.notify_data_applied(StageRef::Display(DisplayStage::LinearMatrix));
        }

        // The control stage bundles three commit points; its apply
        // notification is deferred until all of them are processed.
        let mut control_touched = self.stage_display_blob(
            transport,
            pending,
            DisplayStage::DisplayDither,
            force,
            engine.display_control(),
            |c| Ok(encode::display_dither(c)),
        )?;
        control_touched |= self.stage_display_blob(
            transport,
            pending,
            DisplayStage::CgcDither,
            force,
            engine.display_control(),
            |c| Ok(encode::cgc_dither(c)),
        )?;
        control_touched |= self.stage_bit_depth(engine, transport, force, pending)?;

        if control_touched || engine.display_control().is_dirty() {
            engine.notify_data_applied(StageRef::Display(DisplayStage::DisplayDither));
        }
        Ok(())
    }

    /// Stage the scalar force-bit-depth control when its derived value
    /// differs from the last committed one.
    fn stage_bit_depth<E: ColorEngine + ?Sized>(
        &self,
        engine: &mut E,
        transport: &mut dyn CommitTransport,
        force: bool,
        pending: &mut PendingFrame,
    ) -> Result<bool, SyncError> {
        if !self.caps.force_bit_depth {
            return Ok(false);
        }
        let control = engine.display_control();
        let depth = if control.is_enabled() && control.payload().is_some_and(|c| c.force_10bit) {
            BIT_DEPTH_FORCE_10
        } else {
            BIT_DEPTH_UNSPECIFIED
        };
        if !force && self.last_bit_depth == Some(depth) {
            return Ok(false);
        }
        transport.stage_property(
            CommitTarget::Display,
            PropertyTag::ForceBitDepth,
            PropertyValue::Scalar(depth),
        )?;
        pending.bit_depth = Some(depth);
        Ok(true)
    }

    fn stage_display_blob<T>(
        &self,
        transport: &mut dyn CommitTransport,
        pending: &mut PendingFrame,
        stage: DisplayStage,
        force: bool,
        cfg: &StageConfig<T>,
        encoder: impl FnOnce(&T) -> Result<Option<Vec<u8>>, EncodeError>,
    ) -> Result<bool, SyncError> {
        if !self.caps.supports(stage) {
            return Ok(false);
        }
        let action = prepare(cfg, force, encoder).map_err(|e| {
            tracing::error!("{}: {e}", stage.label());
            SyncError::Encode(e)
        })?;
        self.stage_action(
            transport,
            pending,
            CommitTarget::Display,
            SlotKey::Display(stage),
            action,
            false,
        )
    }

    /// Stage the per-unit batches, one per color-managed layer in frame
    /// order. Layer failures are recoverable: the layer is reported and its
    /// stages are skipped.
    fn stage_layer_set<E: ColorEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        transport: &mut dyn CommitTransport,
        frame_layers: &[LayerFrame],
        force: bool,
        pending: &mut PendingFrame,
        report: &mut FrameReport,
    ) -> Result<(), SyncError> {
        self.layers.begin_frame();
        let mut next_unit = 0usize;

        for layer in frame_layers {
            if layer.preconverted {
                continue;
            }

            let unit_idx = next_unit;
            if unit_idx >= self.caps.unit_count() {
                if layer.kind == LayerKind::Overlay {
                    tracing::warn!("layer {:?}: no processing unit left", layer.id);
                    report
                        .layer_errors
                        .push((layer.id, LayerError::NoUnitAvailable(unit_idx)));
                }
                continue;
            }
            if engine.unit(unit_idx).is_none() {
                if layer.kind == LayerKind::Overlay {
                    tracing::warn!("layer {:?}: engine has no data for unit {unit_idx}", layer.id);
                    report
                        .layer_errors
                        .push((layer.id, LayerError::MissingUnitData(unit_idx)));
                }
                continue;
            }
            next_unit += 1;

            self.layers.assign(layer.id, unit_idx);
            let plane_changed = self.layers.record_plane(layer.id, layer.plane);
            let force_unit = force || plane_changed;

            if let Some(unit) = engine.unit(unit_idx) {
                report
                    .solid_colors
                    .push((layer.id, unit.solid_color().argb()));
            }

            for stage in UnitStage::ALL {
                let Some(unit_caps) = self.caps.unit(unit_idx) else {
                    break;
                };
                if !unit_caps.supports(stage) {
                    continue;
                }
                let action = {
                    let Some(unit) = engine.unit(unit_idx) else {
                        break;
                    };
                    let prepared = match stage {
                        UnitStage::EotfLut => {
                            prepare(unit.eotf(), force_unit, |c| encode::eotf(c).map(Some))
                        }
                        UnitStage::GamutMatrix => prepare(unit.gamut_matrix(), force_unit, |c| {
                            encode::gamut_matrix(c).map(Some)
                        }),
                        UnitStage::ToneMap => {
                            prepare(unit.tone_map(), force_unit, |c| encode::tone_map(c).map(Some))
                        }
                        UnitStage::OetfLut => {
                            prepare(unit.oetf(), force_unit, |c| encode::oetf(c).map(Some))
                        }
                    };
                    prepared.map_err(|e| {
                        tracing::error!("unit {unit_idx} {}: {e}", stage.label());
                        SyncError::Encode(e)
                    })?
                };
                let staged = self.stage_action(
                    transport,
                    pending,
                    CommitTarget::Plane(layer.plane),
                    SlotKey::Unit(unit_idx, stage),
                    action,
                    force_unit,
                )?;
                if staged {
                    engine.notify_data_applied(StageRef::Unit(unit_idx, stage));
                }
            }
        }
        Ok(())
    }

    /// Turn a stage decision into transport calls and pending bookkeeping.
    /// Returns whether anything was staged for commit.
    fn stage_action(
        &self,
        transport: &mut dyn CommitTransport,
        pending: &mut PendingFrame,
        target: CommitTarget,
        slot: SlotKey,
        action: StageAction,
        forced: bool,
    ) -> Result<bool, SyncError> {
        let (tag, label) = match slot {
            SlotKey::Display(stage) => (PropertyTag::DisplayBlob(stage), stage.label()),
            SlotKey::Unit(_, stage) => (PropertyTag::PlaneBlob(stage), stage.label()),
        };

        let new_id = match action {
            StageAction::Reuse => return Ok(false),
            StageAction::Clear => BlobId::NONE,
            StageAction::Build(bytes) => {
                let id = transport.create_blob(&bytes).map_err(|e| {
                    tracing::error!("{label}: blob creation failed: {e}");
                    SyncError::Transport(e)
                })?;
                pending.created.push(id);
                id
            }
        };

        // A no-resource write over an empty slot is redundant; skip it
        // unless a forced per-unit refresh asked for the write anyway.
        let old = self.slots.get(slot);
        if new_id.is_none() && old.is_none() && !forced {
            return Ok(false);
        }

        transport.stage_property(target, tag, PropertyValue::Blob(new_id))?;
        pending.updates.push((slot, new_id));
        Ok(true)
    }
}
