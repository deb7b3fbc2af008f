//! Numeric helpers shared by the ordering and scoring code.

use crate::util::{PatchBeamError, PatchBeamResult};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Expected RMS spread targeted for a noise-only sample of `count` members.
///
/// Scales the noise level by `1 / sqrt(count)`; an empty sample falls back to
/// the raw noise level.
pub(crate) fn compute_target_sigma(sigma: f32, count: usize) -> f32 {
    if count == 0 {
        return sigma;
    }
    sigma / (count as f32).sqrt()
}

/// Mean of the first `count` rows of `rows` (shape `(n, dim)`).
pub(crate) fn mean_rows(rows: ArrayView2<'_, f32>, count: usize) -> Array1<f32> {
    let dim = rows.ncols();
    let count = count.min(rows.nrows());
    let mut mean = Array1::<f32>::zeros(dim);
    if count == 0 {
        return mean;
    }
    for row in rows.outer_iter().take(count) {
        mean += &row;
    }
    mean /= count as f32;
    mean
}

/// Mean squared deviation of `a` from `b` over the feature axis.
#[inline]
pub(crate) fn mean_sq_dev(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let dim = a.len();
    if dim == 0 {
        return 0.0;
    }
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = x - y;
        sum += d * d;
    }
    sum / dim as f32
}

/// Fails with `ShapeMismatch` unless `got` equals `expected`.
pub(crate) fn ensure_shape(
    context: &'static str,
    expected: &[usize],
    got: &[usize],
) -> PatchBeamResult<()> {
    if expected != got {
        return Err(PatchBeamError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}
