//! Slice shuffling.

use rand::Rng;

/// Shuffles a slice in place with the Fisher–Yates algorithm.
pub fn fisher_yates<T>(items: &mut [T]) {
    let mut rng = rand::rng();
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_keeps_all_elements() {
        let mut items: Vec<u32> = (0..20).collect();
        fisher_yates(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_usually_changes_order() {
        // Statistical: across 100 shuffles of 10 elements, the identity
        // permutation (probability 1/10!) should essentially never
        // dominate.
        let original: Vec<u32> = (0..10).collect();
        let mut changed = 0;
        for _ in 0..100 {
            let mut items = original.clone();
            fisher_yates(&mut items);
            if items != original {
                changed += 1;
            }
        }
        assert!(changed > 80);
    }

    #[test]
    fn test_shuffle_handles_trivial_slices() {
        let mut empty: Vec<u32> = vec![];
        fisher_yates(&mut empty);
        let mut single = vec![1];
        fisher_yates(&mut single);
        assert_eq!(single, vec![1]);
    }
}
