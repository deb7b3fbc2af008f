//! Sobel edge strength of flattened patches.

use crate::value::params::PatchShape;
use ndarray::{ArrayView1, ArrayView2};

/// Mean Sobel gradient magnitude of one flattened patch.
///
/// The feature vector is read as `frames × channels × height × width`; each
/// `(height, width)` plane is filtered with clamped borders and the gradient
/// magnitudes are averaged over every pixel of every plane.
pub(crate) fn sobel_strength(features: ArrayView1<'_, f32>, shape: PatchShape) -> f32 {
    let plane_len = shape.height * shape.width;
    if plane_len == 0 || features.len() < shape.len() {
        return 0.0;
    }
    let planes = shape.frames * shape.channels;
    let (h, w) = (shape.height as isize, shape.width as isize);

    let mut total = 0.0f32;
    for plane in 0..planes {
        let base = plane * plane_len;
        let at = |y: isize, x: isize| -> f32 {
            let yy = y.clamp(0, h - 1) as usize;
            let xx = x.clamp(0, w - 1) as usize;
            features[base + yy * shape.width + xx]
        };
        for y in 0..h {
            for x in 0..w {
                let gx = (at(y - 1, x + 1) + 2.0 * at(y, x + 1) + at(y + 1, x + 1))
                    - (at(y - 1, x - 1) + 2.0 * at(y, x - 1) + at(y + 1, x - 1));
                let gy = (at(y + 1, x - 1) + 2.0 * at(y + 1, x) + at(y + 1, x + 1))
                    - (at(y - 1, x - 1) + 2.0 * at(y - 1, x) + at(y - 1, x + 1));
                total += (gx * gx + gy * gy).sqrt();
            }
        }
    }
    total / (planes * plane_len) as f32
}

/// Edge strength per row of `features` (`(n, dim)`).
pub fn apply_sobel_to_patches(features: ArrayView2<'_, f32>, shape: PatchShape) -> Vec<f32> {
    features
        .outer_iter()
        .map(|row| sobel_strength(row, shape))
        .collect()
}
