//! End-to-end runs of the beam search driver.

use ndarray::{s, Array3};
use patchbeam::{
    compute_state_value, get_state_value_function, select_final_state, terminate_early,
    update_state, BeamSearch, ProposedState, ScoringMethod, SearchConfig, State, ValueParams,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn two_zero_candidates_win_over_mixed_pair() {
    let data = Array3::from_shape_vec((1, 5, 1), vec![0.0f32, 0.0, 0.0, 5.0, 5.0]).unwrap();
    let vf = get_state_value_function("svar").unwrap();
    let params = ValueParams::default();

    // both particles propose all five singletons
    let mut state = State::for_data(data.view(), 2, 2);
    let mut pstate = ProposedState::new(1, 2, 5, 2, 1);
    for w in 0..2 {
        for c in 0..5 {
            pstate.inds[[0, w, c, 0]] = c;
            pstate.vecs[[0, w, c, 0, 0]] = data[[0, c, 0]];
        }
    }
    compute_state_value(&mut pstate, 0, &vf, &params).unwrap();
    update_state(&mut state, &pstate, data.view(), 0).unwrap();
    terminate_early(&mut state, data.view(), 0.0, 2, 0, &vf, &params).unwrap();

    let selection = select_final_state(&state);
    let chosen = selection.inds.row(0).to_vec();
    assert!(chosen.iter().all(|c| *c < 3), "mixed pair chosen: {chosen:?}");
    assert_ne!(chosen[0], chosen[1]);
    assert_eq!(selection.vals[0], 0.0);
}

#[test]
fn driver_recovers_the_matching_cluster() {
    let mut rng = StdRng::seed_from_u64(41);
    let (num, dim, sigma) = (30usize, 16usize, 0.1f32);
    // candidates 0..10 share the reference patch, the rest are a shifted patch
    let data = Array3::from_shape_fn((2, num, dim), |(b, c, d)| {
        let base = ((d + b) % 4) as f32 * 0.25;
        let shift = if c < 10 { 0.0 } else { 1.5 };
        base + shift + rng.random_range(-sigma..sigma)
    });

    let search = BeamSearch::new(SearchConfig {
        beam_width: 3,
        proposals: 6,
        target_size: 8,
        search_steps: 3,
        method: ScoringMethod::SampleVar,
        parallel: false,
    })
    .with_params(ValueParams::with_sigma(sigma));
    let selection = search.run(data.view()).unwrap();

    for b in 0..2 {
        let chosen = selection.inds.row(b).to_vec();
        assert_eq!(chosen.len(), 8);
        assert!(chosen.iter().all(|c| *c < 10), "batch {b}: {chosen:?}");
        assert_eq!(
            selection.vecs.slice(s![b, 0, ..]),
            data.slice(s![b, chosen[0], ..])
        );
    }
}

#[test]
fn every_method_runs_through_the_driver() {
    let mut rng = StdRng::seed_from_u64(42);
    let data = Array3::from_shape_fn((1, 12, 16), |_| rng.random_range(0.0f32..1.0));
    for method in [
        ScoringMethod::SampleVar,
        ScoringMethod::SampleVarBlur,
        ScoringMethod::SampleNeedle,
    ] {
        let search = BeamSearch::new(SearchConfig {
            beam_width: 2,
            proposals: 3,
            target_size: 5,
            search_steps: 2,
            method,
            parallel: false,
        })
        .with_params(ValueParams {
            sigma: 0.2,
            edge_weight: 0.1,
            ..ValueParams::default()
        });
        let state = search.run_state(data.view()).unwrap();
        assert_eq!(state.filled(), 5);
        assert!(state.vals().iter().all(|v| v.is_finite()), "{method}");
    }
}

#[test]
fn hdgnn_without_scorer_is_a_configuration_error() {
    let data = Array3::<f32>::zeros((1, 6, 4));
    let search = BeamSearch::new(SearchConfig {
        target_size: 3,
        method: ScoringMethod::Hdgnn,
        ..SearchConfig::default()
    });
    let err = search.run(data.view()).unwrap_err();
    assert!(matches!(
        err,
        patchbeam::PatchBeamError::InvalidConfiguration { .. }
    ));
}
