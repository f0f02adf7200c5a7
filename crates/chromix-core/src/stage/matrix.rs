//! Color matrix payloads shared by the per-unit and per-display matrix
//! stages.

/// Coefficients and offsets for a square color matrix stage.
///
/// `coeffs` holds the matrix in row-major order (`DIMENSION²` entries) and
/// `offsets` the per-row additive terms. The container width differs by
/// stage: the per-unit gamut matrix is 32-bit, the display-side gamma and
/// linear matrices are 16-bit.
#[derive(Debug, Clone, Default)]
pub struct MatrixConfig<T> {
    pub coeffs: Vec<T>,
    pub offsets: Vec<T>,
}

impl<T> MatrixConfig<T> {
    pub const DIMENSION: usize = 3;
}

impl<T: Copy + Default> MatrixConfig<T> {
    /// A matrix of the right shape with all entries zeroed.
    pub fn zeroed() -> Self {
        Self {
            coeffs: vec![T::default(); Self::DIMENSION * Self::DIMENSION],
            offsets: vec![T::default(); Self::DIMENSION],
        }
    }
}
