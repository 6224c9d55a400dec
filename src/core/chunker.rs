//! Seeded shuffle and contiguous split of leaf work items

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Splits leaves into per-worker chunks
///
/// Leaves are shuffled first so that heavy subtrees sharing a name prefix
/// do not all land on the same worker. A fixed seed gives a fixed
/// assignment.
#[derive(Debug, Clone)]
pub struct Chunker {
    rng: StdRng,
}

impl Chunker {
    /// Create a chunker seeded with `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Shuffle `items` in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Shuffle `items` and split them into exactly `n` chunks
    pub fn chunk<T>(&mut self, mut items: Vec<T>, n: usize) -> Vec<Vec<T>> {
        self.shuffle(&mut items);
        split_even(items, n)
    }
}

/// Split `items` into exactly `n` contiguous chunks whose lengths differ by
/// at most one. Chunk `i` spans `[i*L/N, (i+1)*L/N)`.
pub fn split_even<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    if n == 0 {
        return Vec::new();
    }

    let len = items.len();
    let mut chunks = Vec::with_capacity(n);
    let mut iter = items.into_iter();
    let mut start = 0;

    for i in 1..=n {
        let end = i * len / n;
        chunks.push(iter.by_ref().take(end - start).collect());
        start = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_even_boundaries() {
        let chunks = split_even((0..10).collect(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8, 9]]);
    }

    #[test]
    fn test_fewer_items_than_workers() {
        let chunks = split_even(vec!["a", "b"], 4);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.iter().filter(|c| c.is_empty()).count(), 2);
        assert_eq!(chunks.concat(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_and_zero() {
        let chunks: Vec<Vec<u32>> = split_even(Vec::new(), 3);
        assert_eq!(chunks, vec![Vec::<u32>::new(); 3]);
        assert!(split_even(vec![1, 2], 0).is_empty());
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let items: Vec<u32> = (0..100).collect();
        let a = Chunker::new(42).chunk(items.clone(), 7);
        let b = Chunker::new(42).chunk(items.clone(), 7);
        let c = Chunker::new(43).chunk(items, 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn prop_chunks_partition_exactly(len in 0usize..500, n in 1usize..64, seed: u64) {
            let items: Vec<usize> = (0..len).collect();
            let chunks = Chunker::new(seed).chunk(items, n);

            prop_assert_eq!(chunks.len(), n);

            let (lo, hi) = (len / n, (len + n - 1) / n);
            for chunk in &chunks {
                prop_assert!(chunk.len() == lo || chunk.len() == hi);
            }

            let mut all: Vec<usize> = chunks.concat();
            all.sort_unstable();
            prop_assert_eq!(all, (0..len).collect::<Vec<_>>());
        }
    }
}
