//! Payload validation and encoding errors.

/// Errors raised while validating a stage payload and encoding it into a
/// device byte image.
///
/// Encoding failures abort the affected stage batch for the frame; the
/// previously committed resources stay valid and are retried on the next
/// frame.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("stage is enabled but carries no payload")]
    MissingPayload,

    #[error("lut length mismatch: expected {expected} entries, got {got}")]
    LutLength { expected: usize, got: usize },

    #[error("lut breakpoint arrays differ in length ({posx} x positions, {posy} y values)")]
    LutShape { posx: usize, posy: usize },

    #[error("matrix shape mismatch: {coeffs} coefficients, {offsets} offsets")]
    MatrixShape { coeffs: usize, offsets: usize },

    #[error("cgc channel lengths differ (r: {r}, g: {g}, b: {b})")]
    CgcChannels { r: usize, g: usize, b: usize },
}
