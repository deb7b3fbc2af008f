//! Proposal expansion for the beam driver.
//!
//! Each particle with `cnum` selected members offers its `S` nearest
//! unselected candidates as one-member extensions. Empty particles offer
//! candidates in index order, so the reference patch (candidate 0 by
//! convention) is tried first.

use crate::search::ordering::{combined_variance, exclude_selected, rank_candidates};
use crate::state::{ProposedState, State};
use crate::util::math::mean_rows;
use crate::util::{PatchBeamError, PatchBeamResult};
use crate::value::ValueParams;
use ndarray::{s, Array2, Array3, Array4, ArrayView3};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Proposals of one particle: indices `(B, S, N)` and vectors `(B, S, N, dim)`.
struct ParticleProposals {
    inds: Array3<usize>,
    vecs: Array4<f32>,
}

/// Builds the proposals that extend every particle by one candidate.
///
/// `cnum` is the number of members already selected; the returned state
/// holds `cnum + 1` meaningful entries per proposal and zero scores.
pub fn propose_expansions(
    state: &State,
    data: ArrayView3<'_, f32>,
    cnum: usize,
    proposals: usize,
    params: &ValueParams,
    parallel: bool,
) -> PatchBeamResult<ProposedState> {
    state.check_data(data)?;
    if cnum != state.filled() {
        return Err(PatchBeamError::InvalidParameter(
            "cnum does not match the filled prefix of the state",
        ));
    }
    if cnum >= state.size() {
        return Err(PatchBeamError::InvalidParameter(
            "state already holds the target subset size",
        ));
    }
    let (batch, num, dim) = data.dim();
    let width = state.width();
    let size = state.size();
    let count = proposals.min(num.saturating_sub(cnum));

    let expand = |w: usize| expand_particle(state, data, w, cnum, count, params);
    #[cfg(feature = "rayon")]
    let per_particle: Vec<ParticleProposals> = if parallel {
        (0..width)
            .into_par_iter()
            .map(expand)
            .collect::<PatchBeamResult<_>>()?
    } else {
        (0..width).map(expand).collect::<PatchBeamResult<_>>()?
    };
    #[cfg(not(feature = "rayon"))]
    let per_particle: Vec<ParticleProposals> = {
        let _ = parallel;
        (0..width).map(expand).collect::<PatchBeamResult<_>>()?
    };

    let mut pstate = ProposedState::new(batch, width, count, size, dim);
    for (w, particle) in per_particle.into_iter().enumerate() {
        pstate.inds.slice_mut(s![.., w, .., ..]).assign(&particle.inds);
        pstate
            .vecs
            .slice_mut(s![.., w, .., .., ..])
            .assign(&particle.vecs);
    }
    Ok(pstate)
}

fn expand_particle(
    state: &State,
    data: ArrayView3<'_, f32>,
    particle: usize,
    cnum: usize,
    count: usize,
    params: &ValueParams,
) -> PatchBeamResult<ParticleProposals> {
    let (batch, num, dim) = data.dim();
    let size = state.size();
    let ref_num = params.max_mindex.map_or(cnum, |cap| cnum.min(cap)).max(1);
    let variance = combined_variance(params.sigma, ref_num);

    let mut inds = Array3::<usize>::zeros((batch, count, size));
    let mut vecs = Array4::<f32>::zeros((batch, count, size, dim));
    for b in 0..batch {
        let prefix = state.inds.slice(s![b, particle, ..cnum]);
        let candidates = if cnum == 0 {
            (0..num).collect::<Vec<_>>()
        } else {
            let members = state.vecs.slice(s![b, particle, .., ..]);
            let reference = mean_rows(members, ref_num);
            let ranked = rank_candidates(reference.view(), data.slice(s![b, .., ..]), variance);
            exclude_selected(&ranked, prefix, b, particle)?
        };

        let prefix_vecs: Array2<f32> = state.vecs.slice(s![b, particle, ..cnum, ..]).to_owned();
        for (k, &c) in candidates.iter().take(count).enumerate() {
            inds.slice_mut(s![b, k, ..cnum]).assign(&prefix);
            inds[[b, k, cnum]] = c;
            vecs.slice_mut(s![b, k, ..cnum, ..]).assign(&prefix_vecs);
            vecs.slice_mut(s![b, k, cnum, ..])
                .assign(&data.slice(s![b, c, ..]));
        }
    }
    Ok(ParticleProposals { inds, vecs })
}
