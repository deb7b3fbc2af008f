//! Reference ordering of the candidate pool.
//!
//! Candidates are ranked by their mean squared deviation from a reference
//! vector, scaled by the combined variance of reference and observation
//! noise. The `remaining` list is the same ranking with a particle's selected
//! candidates removed.

use crate::candidate::topk::{sort_scored_asc, Scored};
use crate::state::State;
use crate::util::math::{ensure_shape, mean_sq_dev};
use crate::util::{PatchBeamError, PatchBeamResult};
use crate::value::ValueParams;
use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayView3};

/// Number of selected vectors averaged into the termination reference.
pub(crate) fn get_ref_num(cnum: usize, params: &ValueParams) -> usize {
    let filled = cnum + 1;
    params
        .max_mindex
        .map_or(filled, |cap| filled.min(cap))
        .max(1)
}

/// Variance of `reference - candidate` when the reference averages
/// `ref_num` noisy samples: `sigma^2 / ref_num + sigma^2`.
pub(crate) fn combined_variance(sigma: f32, ref_num: usize) -> f32 {
    let var = sigma * sigma;
    var / ref_num.max(1) as f32 + var
}

/// Ranks every row of `pool` (`(num, dim)`) by ascending distance to `reference`.
///
/// Ties keep ascending candidate order.
pub fn rank_candidates(
    reference: ArrayView1<'_, f32>,
    pool: ArrayView2<'_, f32>,
    variance: f32,
) -> Vec<usize> {
    let scale = if variance > 0.0 { variance } else { 1.0 };
    let mut scored: Vec<Scored> = pool
        .outer_iter()
        .enumerate()
        .map(|(index, row)| Scored {
            index,
            score: mean_sq_dev(row, reference) / scale,
        })
        .collect();
    sort_scored_asc(&mut scored);
    scored.into_iter().map(|item| item.index).collect()
}

/// `order` with the `selected` candidates removed.
///
/// Fails if `selected` repeats a candidate or points outside the pool.
pub(crate) fn exclude_selected(
    order: &[usize],
    selected: ArrayView1<'_, usize>,
    batch: usize,
    particle: usize,
) -> PatchBeamResult<Vec<usize>> {
    let num = order.len();
    let mut taken = vec![false; num];
    for &index in selected.iter() {
        let slot = taken.get_mut(index).ok_or(PatchBeamError::IndexOutOfBounds {
            index,
            len: num,
            context: "candidate",
        })?;
        if *slot {
            return Err(PatchBeamError::DuplicateSelection {
                batch,
                particle,
                index,
            });
        }
        *slot = true;
    }
    Ok(order.iter().copied().filter(|&c| !taken[c]).collect())
}

/// `order` and `remaining` for one particle across the batch.
pub(crate) struct ParticleOrdering {
    pub(crate) order: Array2<usize>,
    pub(crate) remaining: Array2<usize>,
}

pub(crate) fn order_particle(
    inds: ArrayView3<'_, usize>,
    reference: ArrayView2<'_, f32>,
    data: ArrayView3<'_, f32>,
    variance: f32,
    particle: usize,
    filled: usize,
) -> PatchBeamResult<ParticleOrdering> {
    let (batch, num, _) = data.dim();
    let kept = num.saturating_sub(filled);
    let mut order = Array2::<usize>::zeros((batch, num));
    let mut remaining = Array2::<usize>::zeros((batch, kept));
    for b in 0..batch {
        let ranked = rank_candidates(reference.row(b), data.slice(s![b, .., ..]), variance);
        let rest = exclude_selected(&ranked, inds.slice(s![b, particle, ..filled]), b, particle)?;
        for (slot, c) in order.row_mut(b).iter_mut().zip(ranked) {
            *slot = c;
        }
        for (slot, c) in remaining.row_mut(b).iter_mut().zip(rest) {
            *slot = c;
        }
    }
    Ok(ParticleOrdering { order, remaining })
}

/// Refreshes `state.order` and `state.remaining` for `particle`.
///
/// `reference` has shape `(B, dim)`; the particle's filled prefix is removed
/// from the ranking to form `remaining`.
pub fn compute_ordering(
    state: &mut State,
    reference: ArrayView2<'_, f32>,
    data: ArrayView3<'_, f32>,
    variance: f32,
    particle: usize,
) -> PatchBeamResult<()> {
    state.check_data(data)?;
    ensure_shape(
        "reference",
        &[state.batch(), state.dim()],
        reference.shape(),
    )?;
    if particle >= state.width() {
        return Err(PatchBeamError::IndexOutOfBounds {
            index: particle,
            len: state.width(),
            context: "particle",
        });
    }
    let ordering = order_particle(
        state.inds.view(),
        reference,
        data,
        variance,
        particle,
        state.filled,
    )?;
    state.order = ordering.order;
    state.remaining = ordering.remaining;
    Ok(())
}
