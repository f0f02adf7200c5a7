//! Interface to the external color engine.
//!
//! The engine owns the color science: it consumes scene and calibration data
//! and produces register payloads for every pipeline stage. The synchronizer
//! only reads stage configurations and reports back when a stage's data has
//! been staged for commit, so the engine can clear its dirty flag.

use crate::stage::control::{DisplayControlConfig, SolidColor};
use crate::stage::lut::{
    CgcConfig, DegammaLutConfig, EotfLutConfig, OetfLutConfig, RegammaLutConfig, ToneMapConfig,
};
use crate::stage::matrix::MatrixConfig;
use crate::stage::{DisplayStage, StageConfig, UnitStage};

/// Identifies one stage instance for apply notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRef {
    /// A display-wide singleton stage.
    Display(DisplayStage),
    /// A per-unit stage on the unit with the given index.
    Unit(usize, UnitStage),
}

/// Stage data for one color-processing unit.
///
/// Unit data is ordered: the data behind index `n` describes the `n`-th
/// color-managed layer of the frame the engine was last updated with.
pub trait UnitStageSource {
    fn eotf(&self) -> &StageConfig<EotfLutConfig>;
    fn gamut_matrix(&self) -> &StageConfig<MatrixConfig<u32>>;
    fn tone_map(&self) -> &StageConfig<ToneMapConfig>;
    fn oetf(&self) -> &StageConfig<OetfLutConfig>;

    /// Solid fill color for the unit's layer, read every frame regardless of
    /// dirty state.
    fn solid_color(&self) -> SolidColor;
}

/// Read access to the engine's per-frame stage data.
pub trait ColorEngine {
    fn cgc(&self) -> &StageConfig<CgcConfig>;
    fn degamma(&self) -> &StageConfig<DegammaLutConfig>;
    fn regamma(&self) -> &StageConfig<RegammaLutConfig>;
    fn gamma_matrix(&self) -> &StageConfig<MatrixConfig<u16>>;
    fn linear_matrix(&self) -> &StageConfig<MatrixConfig<u16>>;

    /// The composite display-control stage (dithers + force bit depth).
    fn display_control(&self) -> &StageConfig<DisplayControlConfig>;

    /// Stage data for the unit at `index`, or `None` when the engine has no
    /// layer data for that unit this frame.
    fn unit(&self, index: usize) -> Option<&dyn UnitStageSource>;

    /// A stage's data has been staged into the frame's atomic commit; the
    /// engine should clear the stage's dirty flag.
    ///
    /// The display-control stage spans three commit points and receives a
    /// single `StageRef::Display(DisplayStage::DisplayDither)` notification
    /// once the whole display batch has been processed.
    fn notify_data_applied(&mut self, stage: StageRef);
}
