//! patchbeam is a particle beam search over subsets of candidate patches.
//!
//! Given a pool of candidate patches per search problem and an additive noise
//! level, the search picks the subset whose members best fit the noise model.
//! A denoiser can then aggregate exactly those patches. Parallelism across
//! particles is available through the optional `rayon` feature.

mod candidate;
pub mod search;
pub mod state;
mod trace;
pub mod util;
pub mod value;

pub use search::expand::propose_expansions;
pub use search::ordering::{compute_ordering, rank_candidates};
pub use search::terminate::terminate_early;
pub use search::{BeamSearch, SearchConfig};
pub use state::update::{select_final_state, update_state, FinalSelection};
pub use state::{ProposedState, State};
pub use util::{PatchBeamError, PatchBeamResult};
pub use value::sobel::apply_sobel_to_patches;
pub use value::{
    compute_state_value, get_state_value_function, PatchShape, ScoringMethod, SubsetScorer,
    ValueFunction, ValueParams,
};
