//! Static hardware capability descriptors.
//!
//! Capability data is enumerated once at device initialization and passed to
//! the synchronizer at construction time. A stage whose owning hardware
//! property is absent from the descriptor is silently skipped during
//! synchronization — absence is a hardware variant, not an error.

use crate::stage::{DisplayStage, UnitStage};

/// Capabilities of one color-processing unit.
#[derive(Debug, Clone)]
pub struct UnitCapabilities {
    stages: Vec<UnitStage>,
}

impl UnitCapabilities {
    pub fn new(stages: Vec<UnitStage>) -> Self {
        Self { stages }
    }

    /// A unit exposing every per-unit stage.
    pub fn full() -> Self {
        Self::new(UnitStage::ALL.to_vec())
    }

    /// A unit without the dynamic tone-mapping stage. Common on hardware
    /// where only alternating units carry the tone-map block.
    pub fn without_tone_map() -> Self {
        Self::new(
            UnitStage::ALL
                .into_iter()
                .filter(|s| *s != UnitStage::ToneMap)
                .collect(),
        )
    }

    pub fn supports(&self, stage: UnitStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Capabilities of the display controller and its processing units.
#[derive(Debug, Clone)]
pub struct DisplayCapabilities {
    stages: Vec<DisplayStage>,
    units: Vec<UnitCapabilities>,
    /// Whether the scalar force-bit-depth control exists.
    pub force_bit_depth: bool,
    /// Hardware-reported length of the 1D degamma LUT.
    pub degamma_lut_len: usize,
    /// Hardware-reported length of each regamma LUT channel.
    pub regamma_lut_len: usize,
}

impl DisplayCapabilities {
    /// Default 1D LUT length on current hardware.
    pub const DEFAULT_LUT_LEN: usize = 65;

    pub fn new(
        stages: Vec<DisplayStage>,
        units: Vec<UnitCapabilities>,
        force_bit_depth: bool,
        degamma_lut_len: usize,
        regamma_lut_len: usize,
    ) -> Self {
        Self {
            stages,
            units,
            force_bit_depth,
            degamma_lut_len,
            regamma_lut_len,
        }
    }

    /// A fully-featured display with `unit_count` fully-featured units and
    /// default LUT lengths.
    pub fn full(unit_count: usize) -> Self {
        Self::new(
            DisplayStage::ALL.to_vec(),
            vec![UnitCapabilities::full(); unit_count],
            true,
            Self::DEFAULT_LUT_LEN,
            Self::DEFAULT_LUT_LEN,
        )
    }

    pub fn supports(&self, stage: DisplayStage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn unit(&self, index: usize) -> Option<&UnitCapabilities> {
        self.units.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_display_supports_every_stage() {
        let caps = DisplayCapabilities::full(2);
        for stage in DisplayStage::ALL {
            assert!(caps.supports(stage));
        }
        assert_eq!(caps.unit_count(), 2);
    }

    #[test]
    fn test_unit_without_tone_map() {
        let unit = UnitCapabilities::without_tone_map();
        assert!(unit.supports(UnitStage::EotfLut));
        assert!(!unit.supports(UnitStage::ToneMap));
    }
}
