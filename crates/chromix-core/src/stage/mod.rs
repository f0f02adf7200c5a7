//! Pipeline stage model — stage kinds, staging order, and the enabled/dirty
//! configuration container produced by the color engine each frame.

pub mod control;
pub mod lut;
pub mod matrix;

/// Stage kinds attached to one color-processing unit.
///
/// Each unit owns one instance of every stage; together they form the
/// per-layer half of the pipeline (HDR decode, gamut mapping, dynamic tone
/// mapping, re-encode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitStage {
    /// Electro-optical transfer LUT (decode to linear light).
    EotfLut,
    /// 3×3 gamut mapping matrix.
    GamutMatrix,
    /// Dynamic tone mapping curve. Not present on every unit.
    ToneMap,
    /// Opto-electronic transfer LUT (re-encode for blending).
    OetfLut,
}

impl UnitStage {
    /// All per-unit stages in fixed hardware staging order.
    pub const ALL: [Self; 4] = [
        Self::EotfLut,
        Self::GamutMatrix,
        Self::ToneMap,
        Self::OetfLut,
    ];

    /// Short label for log messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::EotfLut => "eotf lut",
            Self::GamutMatrix => "gamut matrix",
            Self::ToneMap => "tone map",
            Self::OetfLut => "oetf lut",
        }
    }
}

/// Stage kinds attached to the display controller itself (one instance per
/// display, applied after blending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayStage {
    /// 3D color-gamut-conversion LUT.
    CgcLut,
    /// 1D degamma LUT (decode to linear before the matrices).
    DegammaLut,
    /// 3×1D regamma LUT (re-encode for the panel).
    RegammaLut,
    /// 3×3 matrix applied in gamma space.
    GammaMatrix,
    /// 3×3 matrix applied in linear space.
    LinearMatrix,
    /// Output dither ahead of the panel interface.
    DisplayDither,
    /// Dither applied at the CGC stage.
    CgcDither,
}

impl DisplayStage {
    /// All per-display stages in fixed hardware staging order.
    pub const ALL: [Self; 7] = [
        Self::CgcLut,
        Self::DegammaLut,
        Self::RegammaLut,
        Self::GammaMatrix,
        Self::LinearMatrix,
        Self::DisplayDither,
        Self::CgcDither,
    ];

    /// Short label for log messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::CgcLut => "cgc lut",
            Self::DegammaLut => "degamma lut",
            Self::RegammaLut => "regamma lut",
            Self::GammaMatrix => "gamma matrix",
            Self::LinearMatrix => "linear matrix",
            Self::DisplayDither => "display dither",
            Self::CgcDither => "cgc dither",
        }
    }
}

/// One pipeline stage's configuration as produced by the color engine.
///
/// The engine recomputes stage data when the scene changes and marks the
/// stage dirty; the synchronizer consumes the dirty flag when the data has
/// been staged for commit. `dirty` is only meaningful while the stage is
/// enabled, and an enabled stage always carries a payload.
#[derive(Debug, Clone)]
pub struct StageConfig<T> {
    enabled: bool,
    dirty: bool,
    payload: Option<T>,
}

impl<T> StageConfig<T> {
    /// A disabled stage. The hardware falls back to its bypass default.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            dirty: false,
            payload: None,
        }
    }

    /// An enabled stage carrying `payload`, initially marked dirty so the
    /// first synchronization builds a resource for it.
    pub const fn enabled(payload: T) -> Self {
        Self {
            enabled: true,
            dirty: true,
            payload: Some(payload),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the payload changed since it was last consumed. Always false
    /// for a disabled stage.
    pub const fn is_dirty(&self) -> bool {
        self.enabled && self.dirty
    }

    /// Payload data, present whenever the stage is enabled.
    pub const fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Replace the payload and mark the stage dirty.
    pub fn update(&mut self, payload: T) {
        self.enabled = true;
        self.dirty = true;
        self.payload = Some(payload);
    }

    /// Mark the payload as changed without replacing it.
    pub fn mark_dirty(&mut self) {
        if self.enabled {
            self.dirty = true;
        }
    }

    /// Consume the dirty flag once the data has been applied.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Disable the stage, dropping its payload.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.dirty = false;
        self.payload = None;
    }
}

impl<T> Default for StageConfig<T> {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_stage_is_never_dirty() {
        let mut cfg: StageConfig<u32> = StageConfig::disabled();
        assert!(!cfg.is_enabled());
        assert!(!cfg.is_dirty());
        cfg.mark_dirty();
        assert!(!cfg.is_dirty(), "dirty must stay false while disabled");
    }

    #[test]
    fn test_enabled_stage_starts_dirty_and_carries_payload() {
        let cfg = StageConfig::enabled(7u32);
        assert!(cfg.is_enabled());
        assert!(cfg.is_dirty());
        assert_eq!(cfg.payload(), Some(&7));
    }

    #[test]
    fn test_clear_dirty_then_update_marks_dirty_again() {
        let mut cfg = StageConfig::enabled(1u32);
        cfg.clear_dirty();
        assert!(!cfg.is_dirty());
        cfg.update(2);
        assert!(cfg.is_dirty());
        assert_eq!(cfg.payload(), Some(&2));
    }

    #[test]
    fn test_disable_drops_payload() {
        let mut cfg = StageConfig::enabled(1u32);
        cfg.disable();
        assert!(cfg.payload().is_none());
        assert!(!cfg.is_dirty());
    }
}
