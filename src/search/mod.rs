//! Beam search driver.
//!
//! The driver grows every particle one candidate at a time for
//! `search_steps` iterations (expand, score, prune), then completes the
//! particles from the reference ordering and returns the best one per batch
//! element.

pub(crate) mod expand;
pub(crate) mod ordering;
pub(crate) mod terminate;

use crate::search::expand::propose_expansions;
use crate::search::terminate::terminate_early;
use crate::state::update::{select_final_state, update_state, FinalSelection};
use crate::state::State;
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::{PatchBeamError, PatchBeamResult};
use crate::value::{compute_state_value, ScoringMethod, ValueFunction, ValueParams};
use ndarray::ArrayView3;

/// Configuration for the beam search driver.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Particles kept per batch element after each update.
    pub beam_width: usize,
    /// Expansions proposed per particle per step.
    pub proposals: usize,
    /// Final subset size.
    pub target_size: usize,
    /// Beam iterations before the remaining slots are filled from the ordering.
    pub search_steps: usize,
    /// Scoring method used for every step and the final rescoring.
    pub method: ScoringMethod,
    /// Enable rayon parallelism over particles (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            beam_width: 4,
            proposals: 8,
            target_size: 10,
            search_steps: 4,
            method: ScoringMethod::SampleVar,
            parallel: false,
        }
    }
}

impl SearchConfig {
    fn validate(&self, num: usize) -> PatchBeamResult<()> {
        if self.beam_width == 0 {
            return Err(PatchBeamError::InvalidParameter("beam_width must be >= 1"));
        }
        if self.proposals == 0 {
            return Err(PatchBeamError::InvalidParameter("proposals must be >= 1"));
        }
        if self.search_steps == 0 {
            return Err(PatchBeamError::InvalidParameter("search_steps must be >= 1"));
        }
        if self.target_size == 0 || self.target_size > num {
            return Err(PatchBeamError::InvalidParameter(
                "target_size must be within 1..=number of candidates",
            ));
        }
        Ok(())
    }
}

/// Beam search over candidate subsets.
pub struct BeamSearch {
    cfg: SearchConfig,
    params: ValueParams,
}

impl BeamSearch {
    /// Creates a search with default scoring parameters.
    pub fn new(cfg: SearchConfig) -> Self {
        Self {
            cfg,
            params: ValueParams::default(),
        }
    }

    /// Overrides the scoring parameters.
    pub fn with_params(mut self, params: ValueParams) -> Self {
        self.params = params;
        self
    }

    /// Returns the driver configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    /// Returns the scoring parameters.
    pub fn params(&self) -> &ValueParams {
        &self.params
    }

    /// Runs the search on `data` (`(B, num, dim)`) and returns the best subset
    /// per batch element. The noise level is `params.sigma`.
    pub fn run(&self, data: ArrayView3<'_, f32>) -> PatchBeamResult<FinalSelection> {
        let state = self.run_state(data)?;
        Ok(select_final_state(&state))
    }

    /// Runs the search and returns the completed beam instead of the winner.
    pub fn run_state(&self, data: ArrayView3<'_, f32>) -> PatchBeamResult<State> {
        let (_, num, dim) = data.dim();
        self.cfg.validate(num)?;
        let value_fn = ValueFunction::new(self.cfg.method).with_parallel(self.cfg.parallel);
        value_fn.validate(dim, &self.params)?;

        let steps = self.cfg.search_steps.min(self.cfg.target_size);
        let _span = trace_span!(
            "beam_search",
            batch = data.dim().0,
            candidates = num,
            method = self.cfg.method.name(),
            steps = steps
        )
        .entered();

        let mut state = State::for_data(data, self.cfg.beam_width, self.cfg.target_size);
        for cnum in 0..steps {
            let mut pstate = propose_expansions(
                &state,
                data,
                cnum,
                self.cfg.proposals,
                &self.params,
                self.cfg.parallel,
            )?;
            compute_state_value(&mut pstate, cnum, &value_fn, &self.params)?;
            update_state(&mut state, &pstate, data, cnum)?;
            trace_debug!("beam_step", cnum = cnum, proposals = pstate.proposals());
        }

        terminate_early(
            &mut state,
            data,
            self.params.sigma,
            self.cfg.target_size,
            steps - 1,
            &value_fn,
            &self.params,
        )?;
        trace_event!("beam_search_done", filled = state.filled());
        Ok(state)
    }
}
