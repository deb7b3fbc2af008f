//! Candidate ranking utilities.
//!
//! Stable ascending Top-K used to prune beam proposals and pick the final
//! particle.

pub(crate) mod topk;
