//! LUT payloads for the transfer-function and gamut-conversion stages.
//!
//! Shapes mirror the hardware register files: the per-unit transfer LUTs use
//! programmable X/Y breakpoints, the per-display 1D LUTs are plain value
//! tables whose length is reported by the display capability descriptor, and
//! the CGC stage is a 17³ lattice serialized to 2457 registers per channel.

/// Electro-optical transfer LUT for one processing unit.
///
/// 129 programmable breakpoints; X positions are 16-bit input codes, Y values
/// are 32-bit linear-light outputs.
#[derive(Debug, Clone, Default)]
pub struct EotfLutConfig {
    pub posx: Vec<u16>,
    pub posy: Vec<u32>,
}

impl EotfLutConfig {
    pub const LUT_LEN: usize = 129;
}

/// Opto-electronic transfer LUT for one processing unit.
///
/// 33 breakpoints; X positions are 32-bit linear-light inputs, Y values are
/// 16-bit encoded outputs.
#[derive(Debug, Clone, Default)]
pub struct OetfLutConfig {
    pub posx: Vec<u32>,
    pub posy: Vec<u16>,
}

impl OetfLutConfig {
    pub const LUT_LEN: usize = 33;
}

/// Dynamic tone-mapping curve plus the RGB-to-luminance reduction used to
/// drive it.
///
/// Only meaningful for units whose capability descriptor reports tone-map
/// support.
#[derive(Debug, Clone, Default)]
pub struct ToneMapConfig {
    pub posx: Vec<u32>,
    pub posy: Vec<u32>,
    pub coeff_r: u16,
    pub coeff_g: u16,
    pub coeff_b: u16,
    pub rng_x_min: u16,
    pub rng_x_max: u16,
    pub rng_y_min: u16,
    pub rng_y_max: u16,
}

impl ToneMapConfig {
    pub const LUT_LEN: usize = 33;
}

/// 1D degamma LUT for the display controller (single shared channel).
///
/// The required length comes from the capability descriptor, not from a
/// compile-time constant; encoding validates against it.
#[derive(Debug, Clone, Default)]
pub struct DegammaLutConfig {
    pub values: Vec<u16>,
}

/// 3×1D regamma LUT for the display controller, one table per channel.
#[derive(Debug, Clone, Default)]
pub struct RegammaLutConfig {
    pub r_values: Vec<u16>,
    pub g_values: Vec<u16>,
    pub b_values: Vec<u16>,
}

/// 3D color-gamut-conversion LUT, serialized per channel to the register
/// layout.
#[derive(Debug, Clone, Default)]
pub struct CgcConfig {
    pub r_values: Vec<u32>,
    pub g_values: Vec<u32>,
    pub b_values: Vec<u32>,
}

impl CgcConfig {
    /// Registers per channel.
    pub const CHANNEL_LEN: usize = 2457;
    /// Nodes per axis of the underlying 3D lattice.
    pub const LATTICE_LEN: usize = 17;
}
