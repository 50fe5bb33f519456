//! Fixed-order round-robin fan-in over ranked batches.

/// Interleave `batches` by taking one element from each batch per round, in
/// fixed batch order, until `cap` elements are taken or every batch is
/// exhausted. Exhausted batches are removed from the rotation permanently.
///
/// One round trip through every batch picks up each seed's next-best
/// relationship before any seed gets its second, so no single seed
/// dominates a capped result.
pub fn round_robin<T>(batches: Vec<Vec<T>>, cap: usize) -> Vec<T> {
    let mut sources: Vec<std::vec::IntoIter<T>> =
        batches.into_iter().map(Vec::into_iter).collect();
    let mut merged = Vec::new();

    while !sources.is_empty() && merged.len() < cap {
        let mut survivors = Vec::with_capacity(sources.len());
        for mut source in sources {
            if merged.len() >= cap {
                break;
            }
            if let Some(item) = source.next() {
                merged.push(item);
                survivors.push(source);
            }
        }
        sources = survivors;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_interleaves_in_batch_order() {
        let merged = round_robin(
            vec![vec!["a1", "a2"], vec!["b1", "b2"], vec!["c1", "c2"]],
            usize::MAX,
        );
        assert_eq!(merged, vec!["a1", "b1", "c1", "a2", "b2", "c2"]);
    }

    #[test]
    fn test_round_robin_skips_exhausted_batches() {
        let merged = round_robin(
            vec![vec![1, 4, 6], vec![2], vec![3, 5, 7]],
            usize::MAX,
        );
        assert_eq!(merged, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_round_robin_small_batch_survives_the_cap() {
        // Batches of 10, 2 and 5 under a cap of 12: the rotation reaches
        // both elements of the smallest batch before the larger batches
        // use up the cap.
        let a: Vec<String> = (1..=10).map(|i| format!("a{}", i)).collect();
        let b: Vec<String> = (1..=2).map(|i| format!("b{}", i)).collect();
        let c: Vec<String> = (1..=5).map(|i| format!("c{}", i)).collect();

        let merged = round_robin(vec![a, b, c], 12);

        assert_eq!(merged.len(), 12);
        assert!(merged.contains(&"b1".to_string()));
        assert!(merged.contains(&"b2".to_string()));
        assert_eq!(
            merged,
            vec!["a1", "b1", "c1", "a2", "b2", "c2", "a3", "c3", "a4", "c4", "a5", "c5"]
        );
    }

    #[test]
    fn test_round_robin_cap_zero() {
        let merged = round_robin(vec![vec![1, 2], vec![3]], 0);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_round_robin_cap_mid_round() {
        let merged = round_robin(vec![vec![1, 2], vec![3, 4], vec![5, 6]], 4);
        assert_eq!(merged, vec![1, 3, 5, 2]);
    }

    #[test]
    fn test_round_robin_empty_and_no_batches() {
        let merged: Vec<i32> = round_robin(vec![], 10);
        assert!(merged.is_empty());

        let merged = round_robin(vec![vec![], vec![1], vec![]], 10);
        assert_eq!(merged, vec![1]);
    }

    #[test]
    fn test_round_robin_single_batch_is_a_prefix() {
        let merged = round_robin(vec![vec![1, 2, 3, 4]], 3);
        assert_eq!(merged, vec![1, 2, 3]);
    }
}
