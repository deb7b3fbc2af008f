//! Early termination: complete every particle from the reference ordering.

use crate::search::ordering::{combined_variance, get_ref_num, order_particle, ParticleOrdering};
use crate::state::update::build_mask;
use crate::state::State;
use crate::trace::{trace_event, trace_span};
use crate::util::math::mean_rows;
use crate::util::{PatchBeamError, PatchBeamResult};
use crate::value::{ValueFunction, ValueParams};
use ndarray::{s, Array2, Array3, ArrayView3, Axis};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

struct Completion {
    ordering: ParticleOrdering,
    inds: Array2<usize>,
    vecs: Array3<f32>,
}

/// Fills every particle up to `target_size` members and rescores the beam.
///
/// For each particle the reference is the mean of its first `ref_num`
/// selected vectors; candidates are ranked against it under the variance
/// `sigma^2 / ref_num + sigma^2`. The filled prefix is re-sorted by that
/// ranking (vectors move with their indices), then the best unselected
/// candidates complete the subset. Afterwards `state.order` and
/// `state.remaining` hold the ranking of the last particle.
pub fn terminate_early(
    state: &mut State,
    data: ArrayView3<'_, f32>,
    sigma: f32,
    target_size: usize,
    cnum: usize,
    value_fn: &ValueFunction,
    params: &ValueParams,
) -> PatchBeamResult<()> {
    state.check_data(data)?;
    if target_size != state.size() {
        return Err(PatchBeamError::ShapeMismatch {
            context: "target subset size",
            expected: vec![state.size()],
            got: vec![target_size],
        });
    }
    if target_size > state.num_candidates() {
        return Err(PatchBeamError::InvalidParameter(
            "target subset size exceeds the candidate pool",
        ));
    }
    let filled = cnum + 1;
    if filled != state.filled() {
        return Err(PatchBeamError::InvalidParameter(
            "cnum does not match the filled prefix of the state",
        ));
    }

    let width = state.width();
    let ref_num = get_ref_num(cnum, params).min(filled);
    let variance = combined_variance(sigma, ref_num);
    let _span = trace_span!(
        "terminate_early",
        cnum = cnum,
        fill = target_size - filled,
        ref_num = ref_num
    )
    .entered();

    let snapshot: &State = state;
    let complete = |p: usize| complete_particle(snapshot, data, p, ref_num, variance);
    #[cfg(feature = "rayon")]
    let completions: Vec<Completion> = if value_fn.is_parallel() {
        (0..width)
            .into_par_iter()
            .map(complete)
            .collect::<PatchBeamResult<_>>()?
    } else {
        (0..width).map(complete).collect::<PatchBeamResult<_>>()?
    };
    #[cfg(not(feature = "rayon"))]
    let completions: Vec<Completion> = (0..width).map(complete).collect::<PatchBeamResult<_>>()?;

    let mut inds = state.inds.clone();
    let mut vecs = state.vecs.clone();
    let mut last = None;
    for (p, completion) in completions.into_iter().enumerate() {
        inds.slice_mut(s![.., p, ..]).assign(&completion.inds);
        vecs.slice_mut(s![.., p, .., ..]).assign(&completion.vecs);
        last = Some(completion.ordering);
    }
    let imask = build_mask(inds.view(), target_size, state.num_candidates())?;
    let mut vals = Array2::<f32>::zeros((state.batch(), width));
    value_fn.evaluate(
        vals.view_mut().insert_axis(Axis(2)),
        vecs.view().insert_axis(Axis(2)),
        target_size,
        params,
    )?;

    // commit only once rescoring has succeeded
    state.inds = inds;
    state.vecs = vecs;
    state.imask = imask;
    state.vals = vals;
    state.filled = target_size;
    if let Some(ordering) = last {
        state.order = ordering.order;
        state.remaining = ordering.remaining;
    }

    trace_event!(
        "terminated",
        best = state.vals.iter().copied().fold(f32::INFINITY, f32::min)
    );
    Ok(())
}

fn complete_particle(
    state: &State,
    data: ArrayView3<'_, f32>,
    particle: usize,
    ref_num: usize,
    variance: f32,
) -> PatchBeamResult<Completion> {
    let (batch, num, dim) = data.dim();
    let size = state.size();
    let filled = state.filled();
    let fnum = size - filled;

    let mut reference = Array2::<f32>::zeros((batch, dim));
    for b in 0..batch {
        let rows = state.vecs.slice(s![b, particle, .., ..]);
        reference.row_mut(b).assign(&mean_rows(rows, ref_num));
    }
    let ordering = order_particle(
        state.inds.view(),
        reference.view(),
        data,
        variance,
        particle,
        filled,
    )?;

    let mut inds = Array2::<usize>::zeros((batch, size));
    let mut vecs = Array3::<f32>::zeros((batch, size, dim));
    let mut rank = vec![0usize; num];
    for b in 0..batch {
        for (pos, &c) in ordering.order.row(b).iter().enumerate() {
            rank[c] = pos;
        }
        let mut prefix: Vec<usize> = (0..filled).collect();
        prefix.sort_by_key(|&n| rank[state.inds[[b, particle, n]]]);
        for (slot, &n) in prefix.iter().enumerate() {
            inds[[b, slot]] = state.inds[[b, particle, n]];
            vecs.slice_mut(s![b, slot, ..])
                .assign(&state.vecs.slice(s![b, particle, n, ..]));
        }
        for (k, &c) in ordering.remaining.row(b).iter().take(fnum).enumerate() {
            inds[[b, filled + k]] = c;
            vecs.slice_mut(s![b, filled + k, ..])
                .assign(&data.slice(s![b, c, ..]));
        }
    }

    Ok(Completion {
        ordering,
        inds,
        vecs,
    })
}
