//! Sample-variance scorers.
//!
//! Both scorers compare the spread of a subset against the spread expected
//! from pure noise at level `sigma`, and penalize drift away from the mean
//! of the first two members.

use crate::util::math::{compute_target_sigma, mean_rows, mean_sq_dev};
use ndarray::{s, ArrayView2};

/// Scores one subset `(count, dim)` with the sample-variance criterion.
///
/// `mean_n (rms_n - target)^2 + mean_{n,d} (x_nd - ref2_d)^2` where `rms_n` is
/// the RMS deviation of member `n` from the subset mean and `ref2` is the mean
/// of the first two members.
pub(crate) fn sample_var(members: ArrayView2<'_, f32>, sigma: f32) -> f32 {
    let count = members.nrows();
    if count == 0 {
        return 0.0;
    }
    let target = compute_target_sigma(sigma, count);
    let mean = mean_rows(members, count);
    let ref2 = mean_rows(members, 2);

    let mut spread = 0.0f32;
    let mut drift = 0.0f32;
    for row in members.outer_iter() {
        let rms = mean_sq_dev(row, mean.view()).sqrt();
        spread += (rms - target) * (rms - target);
        drift += mean_sq_dev(row, ref2.view());
    }
    (spread + drift) / count as f32
}

/// Scores one subset with the feature axis split into `groups` subgroups.
///
/// The spread term uses subgroup 0 only; the drift term is taken over
/// subgroups `1..groups`. The caller guarantees `dim % groups == 0`.
pub(crate) fn sample_needle(members: ArrayView2<'_, f32>, sigma: f32, groups: usize) -> f32 {
    let (count, dim) = members.dim();
    if count == 0 || groups == 0 {
        return 0.0;
    }
    let sub = dim / groups;
    let target = compute_target_sigma(sigma, count);

    let lead = members.slice(s![.., ..sub]);
    let mean = mean_rows(lead, count);
    let mut spread = 0.0f32;
    for row in lead.outer_iter() {
        let rms = mean_sq_dev(row, mean.view()).sqrt();
        spread += (rms - target) * (rms - target);
    }
    spread /= count as f32;

    if groups < 2 || sub == 0 {
        return spread;
    }
    let mut drift = 0.0f32;
    for g in 1..groups {
        let plane = members.slice(s![.., g * sub..(g + 1) * sub]);
        let ref2 = mean_rows(plane, 2);
        for row in plane.outer_iter() {
            drift += mean_sq_dev(row, ref2.view());
        }
    }
    drift /= (count * (groups - 1)) as f32;

    spread + drift
}
