//! Stage payload encoding — validated, packed byte images for blob creation.
//!
//! Each function checks the payload against the register-file shape and
//! returns the little-endian byte image the commit transport turns into a
//! device resource. Multi-array payloads are packed in declaration order
//! with no padding.

use crate::error::EncodeError;
use crate::stage::control::DisplayControlConfig;
use crate::stage::lut::{
    CgcConfig, DegammaLutConfig, EotfLutConfig, OetfLutConfig, RegammaLutConfig, ToneMapConfig,
};
use crate::stage::matrix::MatrixConfig;

fn check_lut(posx: usize, posy: usize, expected: usize) -> Result<(), EncodeError> {
    if posx != posy {
        return Err(EncodeError::LutShape { posx, posy });
    }
    if posx != expected {
        return Err(EncodeError::LutLength {
            expected,
            got: posx,
        });
    }
    Ok(())
}

/// Encode the per-unit EOTF LUT.
pub fn eotf(config: &EotfLutConfig) -> Result<Vec<u8>, EncodeError> {
    check_lut(config.posx.len(), config.posy.len(), EotfLutConfig::LUT_LEN)?;

    let mut bytes = Vec::with_capacity(config.posx.len() * 2 + config.posy.len() * 4);
    bytes.extend_from_slice(bytemuck::cast_slice(&config.posx));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.posy));
    Ok(bytes)
}

/// Encode the per-unit OETF LUT.
pub fn oetf(config: &OetfLutConfig) -> Result<Vec<u8>, EncodeError> {
    check_lut(config.posx.len(), config.posy.len(), OetfLutConfig::LUT_LEN)?;

    let mut bytes = Vec::with_capacity(config.posx.len() * 4 + config.posy.len() * 2);
    bytes.extend_from_slice(bytemuck::cast_slice(&config.posx));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.posy));
    Ok(bytes)
}

/// Encode the per-unit dynamic tone-mapping stage (curve plus RGB-to-Y
/// reduction registers).
pub fn tone_map(config: &ToneMapConfig) -> Result<Vec<u8>, EncodeError> {
    check_lut(config.posx.len(), config.posy.len(), ToneMapConfig::LUT_LEN)?;

    let mut bytes = Vec::with_capacity(config.posx.len() * 8 + 14);
    bytes.extend_from_slice(bytemuck::cast_slice(&config.posx));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.posy));
    for reg in [
        config.coeff_r,
        config.coeff_g,
        config.coeff_b,
        config.rng_x_min,
        config.rng_x_max,
        config.rng_y_min,
        config.rng_y_max,
    ] {
        bytes.extend_from_slice(&reg.to_le_bytes());
    }
    Ok(bytes)
}

fn matrix_bytes<T: bytemuck::Pod>(config: &MatrixConfig<T>) -> Result<Vec<u8>, EncodeError> {
    let dim = MatrixConfig::<T>::DIMENSION;
    if config.coeffs.len() != dim * dim || config.offsets.len() != dim {
        return Err(EncodeError::MatrixShape {
            coeffs: config.coeffs.len(),
            offsets: config.offsets.len(),
        });
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(bytemuck::cast_slice(&config.coeffs));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.offsets));
    Ok(bytes)
}

/// Encode the per-unit gamut mapping matrix.
pub fn gamut_matrix(config: &MatrixConfig<u32>) -> Result<Vec<u8>, EncodeError> {
    matrix_bytes(config)
}

/// Encode a display-side matrix stage (gamma-space and linear-space matrices
/// share one register layout).
pub fn display_matrix(config: &MatrixConfig<u16>) -> Result<Vec<u8>, EncodeError> {
    matrix_bytes(config)
}

/// Encode the display degamma LUT. `lut_len` is the hardware-reported table
/// length from the capability descriptor.
pub fn degamma(lut_len: usize, config: &DegammaLutConfig) -> Result<Vec<u8>, EncodeError> {
    if config.values.len() != lut_len {
        return Err(EncodeError::LutLength {
            expected: lut_len,
            got: config.values.len(),
        });
    }
    Ok(bytemuck::cast_slice(&config.values).to_vec())
}

/// Encode the display regamma LUT. `lut_len` is the hardware-reported
/// per-channel table length from the capability descriptor.
pub fn regamma(lut_len: usize, config: &RegammaLutConfig) -> Result<Vec<u8>, EncodeError> {
    for channel in [&config.r_values, &config.g_values, &config.b_values] {
        if channel.len() != lut_len {
            return Err(EncodeError::LutLength {
                expected: lut_len,
                got: channel.len(),
            });
        }
    }

    let mut bytes = Vec::with_capacity(lut_len * 6);
    bytes.extend_from_slice(bytemuck::cast_slice(&config.r_values));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.g_values));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.b_values));
    Ok(bytes)
}

/// Encode the 3D color-gamut-conversion LUT.
pub fn cgc(config: &CgcConfig) -> Result<Vec<u8>, EncodeError> {
    let (r, g, b) = (
        config.r_values.len(),
        config.g_values.len(),
        config.b_values.len(),
    );
    if r != CgcConfig::CHANNEL_LEN || g != CgcConfig::CHANNEL_LEN || b != CgcConfig::CHANNEL_LEN {
        return Err(EncodeError::CgcChannels { r, g, b });
    }

    let mut bytes = Vec::with_capacity(CgcConfig::CHANNEL_LEN * 12);
    bytes.extend_from_slice(bytemuck::cast_slice(&config.r_values));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.g_values));
    bytes.extend_from_slice(bytemuck::cast_slice(&config.b_values));
    Ok(bytes)
}

/// Encode the CGC dither register, or `None` when the control payload does
/// not override the hardware default (no blob is committed in that case).
pub fn cgc_dither(config: &DisplayControlConfig) -> Option<Vec<u8>> {
    config
        .cgc_dither_override
        .then(|| u32::from(config.cgc_dither).to_le_bytes().to_vec())
}

/// Encode the display dither register, or `None` when the control payload
/// does not override the hardware default.
pub fn display_dither(config: &DisplayControlConfig) -> Option<Vec<u8>> {
    config
        .display_dither_override
        .then(|| u32::from(config.display_dither).to_le_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cgc_encodes_three_full_channels() {
        let config = CgcConfig {
            r_values: vec![1; CgcConfig::CHANNEL_LEN],
            g_values: vec![2; CgcConfig::CHANNEL_LEN],
            b_values: vec![3; CgcConfig::CHANNEL_LEN],
        };
        let bytes = cgc(&config).unwrap();
        assert_eq!(bytes.len(), CgcConfig::CHANNEL_LEN * 3 * 4);
    }

    #[test]
    fn test_cgc_rejects_short_channel() {
        let config = CgcConfig {
            r_values: vec![0; CgcConfig::CHANNEL_LEN],
            g_values: vec![0; 16],
            b_values: vec![0; CgcConfig::CHANNEL_LEN],
        };
        assert!(matches!(
            cgc(&config),
            Err(EncodeError::CgcChannels { g: 16, .. })
        ));
    }

    #[test]
    fn test_eotf_rejects_wrong_length() {
        let config = EotfLutConfig {
            posx: vec![0; 33],
            posy: vec![0; 33],
        };
        assert!(matches!(
            eotf(&config),
            Err(EncodeError::LutLength { expected: 129, .. })
        ));
    }

    #[test]
    fn test_eotf_packs_both_arrays() {
        let config = EotfLutConfig {
            posx: vec![0; EotfLutConfig::LUT_LEN],
            posy: vec![0; EotfLutConfig::LUT_LEN],
        };
        let bytes = eotf(&config).unwrap();
        assert_eq!(bytes.len(), EotfLutConfig::LUT_LEN * (2 + 4));
    }

    #[test]
    fn test_matrix_rejects_bad_shape() {
        let config = MatrixConfig::<u16> {
            coeffs: vec![0; 4],
            offsets: vec![0; 3],
        };
        assert!(matches!(
            display_matrix(&config),
            Err(EncodeError::MatrixShape { coeffs: 4, .. })
        ));
    }

    #[test]
    fn test_degamma_validates_against_reported_length() {
        let config = DegammaLutConfig {
            values: vec![0; 65],
        };
        assert!(degamma(65, &config).is_ok());
        assert!(degamma(33, &config).is_err());
    }

    #[test]
    fn test_dither_encoders_respect_override_flags() {
        let mut control = DisplayControlConfig::default();
        assert!(cgc_dither(&control).is_none());
        assert!(display_dither(&control).is_none());

        control.cgc_dither_override = true;
        control.cgc_dither = 0x1234;
        let bytes = cgc_dither(&control).unwrap();
        assert_eq!(bytes, 0x1234u32.to_le_bytes().to_vec());
    }
}
