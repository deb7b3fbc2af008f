//! State update and final selection.

use crate::candidate::topk::smallest_k;
use crate::state::{ProposedState, State};
use crate::trace::{trace_debug, trace_span};
use crate::util::math::ensure_shape;
use crate::util::{PatchBeamError, PatchBeamResult};
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView3, Axis};

/// Keeps the `W` best proposals per batch element.
///
/// Proposals are flattened over `(W, S)` in row-major order (flat index
/// `w * S + s`) and the `W` smallest scores are kept, ties resolved to the
/// lower flat index. Each kept proposal carries its full index sequence and
/// vectors. The membership mask is rebuilt from the first `cnum + 1` indices.
///
/// Kept proposals are checked for repeated or out-of-range indices before
/// `state` is touched; on error the state is left unchanged.
pub fn update_state(
    state: &mut State,
    pstate: &ProposedState,
    data: ArrayView3<'_, f32>,
    cnum: usize,
) -> PatchBeamResult<()> {
    state.check_data(data)?;
    let batch = state.batch();
    let width = state.width();
    let size = state.size();
    let dim = state.dim();
    let proposals = pstate.proposals();

    ensure_shape(
        "proposed vals",
        &[batch, width, proposals],
        pstate.vals.shape(),
    )?;
    ensure_shape(
        "proposed inds",
        &[batch, width, proposals, size],
        pstate.inds.shape(),
    )?;
    ensure_shape(
        "proposed vecs",
        &[batch, width, proposals, size, dim],
        pstate.vecs.shape(),
    )?;
    if width * proposals < width {
        return Err(PatchBeamError::ShapeMismatch {
            context: "proposal count",
            expected: vec![width],
            got: vec![width * proposals],
        });
    }
    let filled = cnum + 1;
    if filled > size {
        return Err(PatchBeamError::InvalidParameter(
            "cnum + 1 exceeds the target subset size",
        ));
    }

    let _span = trace_span!("update_state", cnum = cnum, proposals = proposals).entered();

    let mut vals = Array2::<f32>::zeros((batch, width));
    let mut inds = Array3::<usize>::zeros((batch, width, size));
    let mut vecs = Array4::<f32>::zeros((batch, width, size, dim));
    for b in 0..batch {
        let flat = pstate.vals.index_axis(Axis(0), b);
        let picked = smallest_k(flat.iter().copied(), width);
        for (slot, &pos) in picked.iter().enumerate() {
            let (w, p) = (pos / proposals, pos % proposals);
            vals[[b, slot]] = pstate.vals[[b, w, p]];
            inds.slice_mut(s![b, slot, ..])
                .assign(&pstate.inds.slice(s![b, w, p, ..]));
            vecs.slice_mut(s![b, slot, .., ..])
                .assign(&pstate.vecs.slice(s![b, w, p, .., ..]));
        }
    }

    let imask = build_mask(inds.view(), filled, state.num_candidates())?;

    trace_debug!(
        "beam_updated",
        cnum = cnum,
        best = vals.iter().copied().fold(f32::INFINITY, f32::min)
    );

    state.vals = vals;
    state.inds = inds;
    state.vecs = vecs;
    state.imask = imask;
    state.filled = filled;
    Ok(())
}

/// Builds the membership mask of the first `filled` indices of every particle.
pub(crate) fn build_mask(
    inds: ArrayView3<'_, usize>,
    filled: usize,
    num: usize,
) -> PatchBeamResult<Array3<bool>> {
    let (batch, width, _) = inds.dim();
    let mut imask = Array3::from_elem((batch, width, num), false);
    for b in 0..batch {
        for w in 0..width {
            for n in 0..filled {
                let index = inds[[b, w, n]];
                if index >= num {
                    return Err(PatchBeamError::IndexOutOfBounds {
                        index,
                        len: num,
                        context: "candidate",
                    });
                }
                if imask[[b, w, index]] {
                    return Err(PatchBeamError::DuplicateSelection {
                        batch: b,
                        particle: w,
                        index,
                    });
                }
                imask[[b, w, index]] = true;
            }
        }
    }
    Ok(imask)
}

/// Best particle per batch element.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalSelection {
    /// Winning score per batch element `(B,)`.
    pub vals: Array1<f32>,
    /// Winning index sets `(B, N)`.
    pub inds: Array2<usize>,
    /// Winning vectors `(B, N, dim)`.
    pub vecs: Array3<f32>,
}

/// Collapses the beam to the minimum-score particle, ties by lowest index.
pub fn select_final_state(state: &State) -> FinalSelection {
    let batch = state.batch();
    let size = state.size();
    let dim = state.dim();

    let mut vals = Array1::<f32>::zeros(batch);
    let mut inds = Array2::<usize>::zeros((batch, size));
    let mut vecs = Array3::<f32>::zeros((batch, size, dim));
    for (b, row) in state.vals.outer_iter().enumerate() {
        let Some(&best) = smallest_k(row.iter().copied(), 1).first() else {
            continue;
        };
        vals[b] = row[best];
        inds.row_mut(b).assign(&state.inds.slice(s![b, best, ..]));
        vecs.index_axis_mut(Axis(0), b)
            .assign(&state.vecs.slice(s![b, best, .., ..]));
    }

    FinalSelection { vals, inds, vecs }
}
