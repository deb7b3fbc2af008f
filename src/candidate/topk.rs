//! Top-K tracking of the lowest-scoring entries.

use std::cmp::Ordering;

/// A score paired with its position in the flattened source axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scored {
    /// Position in the source axis.
    pub index: usize,
    /// Badness score; lower is better.
    pub score: f32,
}

fn scored_cmp_asc(a: &Scored, b: &Scored) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then_with(|| a.index.cmp(&b.index))
}

/// Sorts entries by ascending score, ties by ascending index.
pub(crate) fn sort_scored_asc(items: &mut [Scored]) {
    items.sort_by(scored_cmp_asc);
}

/// Top-K container keeping the `k` smallest scores with O(k) insertion cost.
pub struct TopK {
    k: usize,
    items: Vec<Scored>,
}

impl TopK {
    /// Creates a new Top-K collector.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k),
        }
    }

    /// Pushes an entry, evicting the worst one if at capacity.
    pub fn push(&mut self, item: Scored) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(item);
            return;
        }

        let mut worst_idx = 0usize;
        for (idx, kept) in self.items.iter().enumerate().skip(1) {
            if scored_cmp_asc(kept, &self.items[worst_idx]) == Ordering::Greater {
                worst_idx = idx;
            }
        }

        if scored_cmp_asc(&item, &self.items[worst_idx]) == Ordering::Less {
            self.items[worst_idx] = item;
        }
    }

    /// Returns the kept entries by ascending score.
    pub fn into_sorted_asc(mut self) -> Vec<Scored> {
        sort_scored_asc(&mut self.items);
        self.items
    }
}

/// Positions of the `k` smallest values, ascending by score then position.
pub(crate) fn smallest_k<I>(values: I, k: usize) -> Vec<usize>
where
    I: IntoIterator<Item = f32>,
{
    let mut topk = TopK::new(k);
    for (index, score) in values.into_iter().enumerate() {
        topk.push(Scored { index, score });
    }
    topk.into_sorted_asc()
        .into_iter()
        .map(|item| item.index)
        .collect()
}
