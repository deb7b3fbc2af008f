//! Beam state carried across search iterations.
//!
//! A `State` holds `W` particles for each of `B` independent search problems.
//! Each particle is an ordered subset of candidate indices into the pool
//! `data` of shape `(B, num, dim)`, together with the matching feature
//! vectors and a membership mask. Only the first `filled()` entries of a
//! particle are meaningful; the tail is placeholder space completed by
//! [`crate::terminate_early`].

pub(crate) mod update;

use crate::util::math::ensure_shape;
use crate::util::PatchBeamResult;
use ndarray::{Array2, Array3, Array4, Array5, ArrayView2, ArrayView3, ArrayView4};

/// Live beam for one batch of search problems.
#[derive(Clone, Debug)]
pub struct State {
    pub(crate) vals: Array2<f32>,
    pub(crate) inds: Array3<usize>,
    pub(crate) vecs: Array4<f32>,
    pub(crate) imask: Array3<bool>,
    pub(crate) order: Array2<usize>,
    pub(crate) remaining: Array2<usize>,
    pub(crate) filled: usize,
}

impl State {
    /// Creates an empty beam: nothing selected, mask all zero.
    ///
    /// `width` is the beam width `W`, `size` the target subset size `N`.
    pub fn new(batch: usize, width: usize, size: usize, num: usize, dim: usize) -> Self {
        let mut remaining = Array2::<usize>::zeros((batch, num));
        for mut row in remaining.outer_iter_mut() {
            for (idx, slot) in row.iter_mut().enumerate() {
                *slot = idx;
            }
        }
        Self {
            vals: Array2::zeros((batch, width)),
            inds: Array3::zeros((batch, width, size)),
            vecs: Array4::zeros((batch, width, size, dim)),
            imask: Array3::from_elem((batch, width, num), false),
            order: remaining.clone(),
            remaining,
            filled: 0,
        }
    }

    /// Creates an empty beam sized for the candidate pool `data`.
    pub fn for_data(data: ArrayView3<'_, f32>, width: usize, size: usize) -> Self {
        let (batch, num, dim) = data.dim();
        Self::new(batch, width, size, num, dim)
    }

    /// Number of independent search problems `B`.
    pub fn batch(&self) -> usize {
        self.vals.nrows()
    }

    /// Beam width `W`.
    pub fn width(&self) -> usize {
        self.vals.ncols()
    }

    /// Target subset size `N`.
    pub fn size(&self) -> usize {
        self.inds.dim().2
    }

    /// Number of candidates in the pool.
    pub fn num_candidates(&self) -> usize {
        self.imask.dim().2
    }

    /// Feature dimension of each candidate.
    pub fn dim(&self) -> usize {
        self.vecs.dim().3
    }

    /// Count of meaningful leading entries in every particle.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Particle scores `(B, W)`; lower is better.
    pub fn vals(&self) -> ArrayView2<'_, f32> {
        self.vals.view()
    }

    /// Selected candidate indices `(B, W, N)`.
    pub fn inds(&self) -> ArrayView3<'_, usize> {
        self.inds.view()
    }

    /// Selected feature vectors `(B, W, N, dim)`.
    pub fn vecs(&self) -> ArrayView4<'_, f32> {
        self.vecs.view()
    }

    /// Membership mask `(B, W, num)` of the filled prefix.
    pub fn imask(&self) -> ArrayView3<'_, bool> {
        self.imask.view()
    }

    /// Last computed candidate ranking `(B, num)`.
    pub fn order(&self) -> ArrayView2<'_, usize> {
        self.order.view()
    }

    /// Last computed ranking with the selected candidates removed.
    pub fn remaining(&self) -> ArrayView2<'_, usize> {
        self.remaining.view()
    }

    pub(crate) fn check_data(&self, data: ArrayView3<'_, f32>) -> PatchBeamResult<()> {
        ensure_shape(
            "data",
            &[self.batch(), self.num_candidates(), self.dim()],
            data.shape(),
        )
    }
}

/// Expansions offered for every particle: `S` proposals each.
///
/// Built by the expansion step, scored by
/// [`crate::compute_state_value`], consumed by [`crate::update_state`].
#[derive(Clone, Debug)]
pub struct ProposedState {
    /// Proposal scores `(B, W, S)`.
    pub vals: Array3<f32>,
    /// Proposal indices `(B, W, S, N)`.
    pub inds: Array4<usize>,
    /// Proposal vectors `(B, W, S, N, dim)`.
    pub vecs: Array5<f32>,
}

impl ProposedState {
    /// Allocates a zeroed proposal set.
    pub fn new(batch: usize, width: usize, proposals: usize, size: usize, dim: usize) -> Self {
        Self {
            vals: Array3::zeros((batch, width, proposals)),
            inds: Array4::zeros((batch, width, proposals, size)),
            vecs: Array5::zeros((batch, width, proposals, size, dim)),
        }
    }

    /// Number of proposals per particle `S`.
    pub fn proposals(&self) -> usize {
        self.vals.dim().2
    }
}
