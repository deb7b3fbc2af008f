//! State value functions.
//!
//! A value function scores every subset of a `(B, W, S, N, dim)` batch using
//! its first `count` members and writes one badness value per `(b, w, s)`
//! group. Lower scores are more consistent with the noise model.
//!
//! Methods form a closed set ([`ScoringMethod`]); the `hdgnn` method defers to
//! a [`SubsetScorer`] supplied through [`ValueParams::learned`].

pub mod params;
mod sample_var;
pub mod sobel;

pub use params::{PatchShape, SubsetScorer, ValueParams};

use crate::state::ProposedState;
use crate::trace::trace_span;
use crate::util::math::{ensure_shape, mean_rows};
use crate::util::{PatchBeamError, PatchBeamResult};
use ndarray::{s, ArrayView2, ArrayView5, ArrayViewMut3};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Registered scoring methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScoringMethod {
    /// Sample variance against the noise target plus drift from the first pair.
    #[default]
    SampleVar,
    /// `SampleVar` minus a Sobel edge bonus on the subset mean.
    SampleVarBlur,
    /// `SampleVar` over feature subgroups.
    SampleNeedle,
    /// External learned scorer.
    Hdgnn,
}

impl ScoringMethod {
    /// Canonical registry name.
    pub fn name(self) -> &'static str {
        match self {
            ScoringMethod::SampleVar => "svar",
            ScoringMethod::SampleVarBlur => "svar_blur",
            ScoringMethod::SampleNeedle => "svar_needle",
            ScoringMethod::Hdgnn => "hdgnn",
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScoringMethod {
    type Err = PatchBeamError;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        match method {
            "svar" | "sample_var" => Ok(ScoringMethod::SampleVar),
            "svar_blur" | "sample_var_blur" => Ok(ScoringMethod::SampleVarBlur),
            "svar_needle" | "sample_needle" => Ok(ScoringMethod::SampleNeedle),
            "hdgnn" => Ok(ScoringMethod::Hdgnn),
            _ => Err(PatchBeamError::InvalidConfiguration {
                method: method.to_owned(),
            }),
        }
    }
}

/// Looks up a value function by registry name.
pub fn get_state_value_function(method: &str) -> PatchBeamResult<ValueFunction> {
    Ok(ValueFunction::new(method.parse()?))
}

/// A resolved scoring method, ready to evaluate batches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValueFunction {
    method: ScoringMethod,
    parallel: bool,
}

impl ValueFunction {
    /// Wraps a scoring method with sequential evaluation.
    pub fn new(method: ScoringMethod) -> Self {
        Self {
            method,
            parallel: false,
        }
    }

    /// Enables parallel evaluation over subsets (requires the `rayon` feature).
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The wrapped scoring method.
    pub fn method(&self) -> ScoringMethod {
        self.method
    }

    /// Whether batches are scored in parallel.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Scores one subset `(count, dim)`.
    ///
    /// Fails when `params` cannot score vectors of this length (see
    /// [`ValueFunction::validate`]).
    pub fn score(
        &self,
        members: ArrayView2<'_, f32>,
        params: &ValueParams,
    ) -> PatchBeamResult<f32> {
        self.validate(members.ncols(), params)?;
        Ok(self.score_validated(members, params))
    }

    fn score_validated(&self, members: ArrayView2<'_, f32>, params: &ValueParams) -> f32 {
        match self.method {
            ScoringMethod::SampleVar => sample_var::sample_var(members, params.sigma),
            ScoringMethod::SampleVarBlur => {
                let base = sample_var::sample_var(members, params.sigma);
                let Some(shape) = params
                    .patch_shape
                    .or_else(|| PatchShape::square_for(members.ncols()))
                else {
                    return base;
                };
                let mean = mean_rows(members, members.nrows());
                let edges = sobel::sobel_strength(mean.view(), shape);
                base - params.edge_weight * edges.abs()
            }
            ScoringMethod::SampleNeedle => {
                sample_var::sample_needle(members, params.sigma, params.needle_groups)
            }
            ScoringMethod::Hdgnn => match params.learned.as_ref() {
                Some(scorer) => scorer.score_subset(members, params),
                None => f32::INFINITY,
            },
        }
    }

    /// Checks that `params` can score vectors of length `dim`.
    pub fn validate(&self, dim: usize, params: &ValueParams) -> PatchBeamResult<()> {
        match self.method {
            ScoringMethod::SampleVar => Ok(()),
            ScoringMethod::SampleVarBlur => {
                let shape = params
                    .patch_shape
                    .or_else(|| PatchShape::square_for(dim))
                    .ok_or(PatchBeamError::InvalidParameter(
                        "svar_blur needs a patch shape for non-square features",
                    ))?;
                ensure_shape("patch shape", &[dim], &[shape.len()])
            }
            ScoringMethod::SampleNeedle => {
                if params.needle_groups == 0 || dim % params.needle_groups != 0 {
                    return Err(PatchBeamError::InvalidParameter(
                        "needle_groups must divide the feature dimension",
                    ));
                }
                Ok(())
            }
            ScoringMethod::Hdgnn => {
                if params.learned.is_none() {
                    return Err(PatchBeamError::InvalidConfiguration {
                        method: "hdgnn (no learned scorer registered)".to_owned(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Writes the score of every `(b, w, s)` subset of `vecs` into `vals`.
    ///
    /// Only the first `count` members of each subset are scored.
    pub fn evaluate(
        &self,
        mut vals: ArrayViewMut3<'_, f32>,
        vecs: ArrayView5<'_, f32>,
        count: usize,
        params: &ValueParams,
    ) -> PatchBeamResult<()> {
        let (batch, width, proposals, size, dim) = vecs.dim();
        ensure_shape("value output", &[batch, width, proposals], vals.shape())?;
        if count == 0 || count > size {
            return Err(PatchBeamError::InvalidParameter(
                "value count must be within 1..=subset size",
            ));
        }
        self.validate(dim, params)?;

        let _span = trace_span!(
            "state_value",
            method = self.method.name(),
            count = count,
            groups = batch * width * proposals
        )
        .entered();

        let groups = batch * width * proposals;
        let score_at = |flat: usize| {
            let b = flat / (width * proposals);
            let w = (flat / proposals) % width;
            let p = flat % proposals;
            self.score_validated(vecs.slice(s![b, w, p, ..count, ..]), params)
        };

        #[cfg(feature = "rayon")]
        let scores: Vec<f32> = if self.parallel {
            (0..groups).into_par_iter().map(score_at).collect()
        } else {
            (0..groups).map(score_at).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let scores: Vec<f32> = (0..groups).map(score_at).collect();

        for (slot, score) in vals.iter_mut().zip(scores) {
            *slot = score;
        }
        Ok(())
    }
}

/// Scores every proposal in `pstate` with `cnum + 1` members.
pub fn compute_state_value(
    pstate: &mut ProposedState,
    cnum: usize,
    value_fn: &ValueFunction,
    params: &ValueParams,
) -> PatchBeamResult<()> {
    value_fn.evaluate(pstate.vals.view_mut(), pstate.vecs.view(), cnum + 1, params)
}
