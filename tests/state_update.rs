//! Property tests for `update_state` on randomized proposals.

use ndarray::{s, Array3};
use patchbeam::{update_state, PatchBeamError, ProposedState, State};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const BATCH: usize = 3;
const NUM: usize = 12;
const DIM: usize = 5;
const SIZE: usize = 6;

fn make_pool(rng: &mut StdRng) -> Array3<f32> {
    Array3::from_shape_fn((BATCH, NUM, DIM), |_| rng.random_range(-1.0f32..1.0))
}

/// Random duplicate-free proposals with `filled` meaningful entries each.
fn random_proposals(
    rng: &mut StdRng,
    data: &Array3<f32>,
    width: usize,
    proposals: usize,
    filled: usize,
) -> ProposedState {
    let mut pstate = ProposedState::new(BATCH, width, proposals, SIZE, DIM);
    let mut pool: Vec<usize> = (0..NUM).collect();
    for b in 0..BATCH {
        for w in 0..width {
            for p in 0..proposals {
                pool.shuffle(rng);
                pstate.vals[[b, w, p]] = rng.random_range(0.0f32..10.0);
                for (n, &c) in pool.iter().take(filled).enumerate() {
                    pstate.inds[[b, w, p, n]] = c;
                    pstate
                        .vecs
                        .slice_mut(s![b, w, p, n, ..])
                        .assign(&data.slice(s![b, c, ..]));
                }
            }
        }
    }
    pstate
}

fn sorted(mut values: Vec<f32>) -> Vec<f32> {
    values.sort_by(f32::total_cmp);
    values
}

#[test]
fn keeps_exactly_the_smallest_scores() {
    let mut rng = StdRng::seed_from_u64(11);
    let data = make_pool(&mut rng);
    for (width, proposals) in [(1, 1), (1, 7), (3, 4), (4, 2)] {
        let mut state = State::for_data(data.view(), width, SIZE);
        let pstate = random_proposals(&mut rng, &data, width, proposals, 3);
        update_state(&mut state, &pstate, data.view(), 2).unwrap();

        for b in 0..BATCH {
            let kept = sorted(state.vals().row(b).to_vec());
            let flat: Vec<f32> = pstate.vals.slice(s![b, .., ..]).iter().copied().collect();
            let expected: Vec<f32> = sorted(flat).into_iter().take(width).collect();
            assert_eq!(kept, expected);
        }
    }
}

#[test]
fn mask_matches_prefix_and_has_no_duplicates() {
    let mut rng = StdRng::seed_from_u64(12);
    let data = make_pool(&mut rng);
    let mut state = State::for_data(data.view(), 3, SIZE);
    let pstate = random_proposals(&mut rng, &data, 3, 5, 4);
    update_state(&mut state, &pstate, data.view(), 3).unwrap();

    for b in 0..BATCH {
        for w in 0..3 {
            let prefix: Vec<usize> = state.inds().slice(s![b, w, ..4]).to_vec();
            let mut unique = prefix.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), prefix.len());
            for c in 0..NUM {
                assert_eq!(state.imask()[[b, w, c]], prefix.contains(&c));
            }
        }
    }
}

#[test]
fn kept_vectors_match_pool_rows() {
    let mut rng = StdRng::seed_from_u64(13);
    let data = make_pool(&mut rng);
    let mut state = State::for_data(data.view(), 4, SIZE);
    let pstate = random_proposals(&mut rng, &data, 4, 3, 5);
    update_state(&mut state, &pstate, data.view(), 4).unwrap();

    for b in 0..BATCH {
        for w in 0..4 {
            for n in 0..5 {
                let c = state.inds()[[b, w, n]];
                assert_eq!(
                    state.vecs().slice(s![b, w, n, ..]),
                    data.slice(s![b, c, ..])
                );
            }
        }
    }
}

#[test]
fn single_particle_is_plain_top1() {
    let mut rng = StdRng::seed_from_u64(14);
    let data = make_pool(&mut rng);
    let mut state = State::for_data(data.view(), 1, SIZE);
    let pstate = random_proposals(&mut rng, &data, 1, 6, 2);
    update_state(&mut state, &pstate, data.view(), 1).unwrap();

    for b in 0..BATCH {
        let row = pstate.vals.slice(s![b, 0, ..]);
        let (best, _) = row
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(state.vals()[[b, 0]], row[best]);
        assert_eq!(
            state.inds().slice(s![b, 0, ..]),
            pstate.inds.slice(s![b, 0, best, ..])
        );
    }
}

#[test]
fn duplicates_in_kept_proposal_are_reported() {
    let mut rng = StdRng::seed_from_u64(15);
    let data = make_pool(&mut rng);
    let mut state = State::for_data(data.view(), 1, SIZE);
    let mut pstate = random_proposals(&mut rng, &data, 1, 1, 2);
    let first = pstate.inds[[1, 0, 0, 0]];
    pstate.inds[[1, 0, 0, 1]] = first;

    let err = update_state(&mut state, &pstate, data.view(), 1).unwrap_err();
    assert_eq!(
        err,
        PatchBeamError::DuplicateSelection {
            batch: 1,
            particle: 0,
            index: first,
        }
    );
    assert_eq!(state.filled(), 0);
}

#[test]
fn mismatched_data_is_rejected() {
    let mut rng = StdRng::seed_from_u64(16);
    let data = make_pool(&mut rng);
    let mut state = State::for_data(data.view(), 2, SIZE);
    let pstate = random_proposals(&mut rng, &data, 2, 2, 1);
    let other = Array3::<f32>::zeros((BATCH, NUM, DIM + 1));
    let err = update_state(&mut state, &pstate, other.view(), 0).unwrap_err();
    assert!(matches!(err, PatchBeamError::ShapeMismatch { context: "data", .. }));
}
