//! Scoring parameters and the learned-scorer seam.

use ndarray::ArrayView2;
use std::fmt;
use std::sync::Arc;

/// Spatial layout of a flattened patch: `frames × channels × height × width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchShape {
    pub frames: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl PatchShape {
    /// Single-frame, single-channel patch.
    pub fn gray(height: usize, width: usize) -> Self {
        Self {
            frames: 1,
            channels: 1,
            height,
            width,
        }
    }

    /// Flattened feature length.
    pub fn len(&self) -> usize {
        self.frames * self.channels * self.height * self.width
    }

    /// Returns `true` if the shape holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Square gray patch covering `dim` features, if `dim` is a perfect square.
    pub(crate) fn square_for(dim: usize) -> Option<Self> {
        let side = (dim as f64).sqrt().round() as usize;
        (side > 0 && side * side == dim).then(|| Self::gray(side, side))
    }
}

/// Opaque scorer plugged in for the `hdgnn` method.
///
/// Receives the `(count, dim)` members of one subset and returns its badness;
/// lower is better. Implementations must be deterministic.
pub trait SubsetScorer: Send + Sync + fmt::Debug {
    fn score_subset(&self, members: ArrayView2<'_, f32>, params: &ValueParams) -> f32;
}

/// Configuration bundle read by the value functions.
#[derive(Clone, Debug)]
pub struct ValueParams {
    /// Noise standard deviation of the candidate features.
    pub sigma: f32,
    /// Cap on how many selected vectors form the termination reference.
    pub max_mindex: Option<usize>,
    /// Weight of the edge bonus in `sample_var_blur`.
    pub edge_weight: f32,
    /// Patch layout for the Sobel filter; a square gray patch when unset.
    pub patch_shape: Option<PatchShape>,
    /// Feature subgroups used by `sample_needle`.
    pub needle_groups: usize,
    /// Scorer used by `hdgnn`.
    pub learned: Option<Arc<dyn SubsetScorer>>,
}

impl Default for ValueParams {
    fn default() -> Self {
        Self {
            sigma: 0.0,
            max_mindex: None,
            edge_weight: 0.0,
            patch_shape: None,
            needle_groups: 4,
            learned: None,
        }
    }
}

impl ValueParams {
    /// Parameters with only the noise level set.
    pub fn with_sigma(sigma: f32) -> Self {
        Self {
            sigma,
            ..Self::default()
        }
    }
}
