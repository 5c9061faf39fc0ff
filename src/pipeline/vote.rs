use std::collections::HashMap;

use super::error::PipelineError;

/// Reduces a batch of per-string waypoint predictions to a single answer.
///
/// Returns the waypoint ID with the highest occurrence count. Ties are
/// broken deterministically in favor of the smallest waypoint ID, so the
/// result never depends on hash-map iteration order. The returned value is
/// always an element of the input batch.
///
/// # Errors
/// - `EmptyBatch` if `predictions` is empty
///
/// # Example
/// ```rust
/// use waypointer::pipeline::majority_vote;
///
/// let waypoint = majority_vote(&[42, 17, 42]).unwrap();
/// assert_eq!(waypoint, 42);
/// ```
pub fn majority_vote(predictions: &[i64]) -> Result<i64, PipelineError> {
    if predictions.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for &label in predictions {
        *counts.entry(label).or_insert(0) += 1;
    }

    // Highest count wins, smallest ID on ties.
    let (winner, _) = counts
        .into_iter()
        .max_by(|(label_a, count_a), (label_b, count_b)| {
            count_a.cmp(count_b).then_with(|| label_b.cmp(label_a))
        })
        .ok_or(PipelineError::EmptyBatch)?;

    Ok(winner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_majority_wins() {
        assert_eq!(majority_vote(&[42, 17, 42, 42, 17]).unwrap(), 42);
    }

    #[test]
    fn test_singleton_batch_returns_its_element() {
        assert_eq!(majority_vote(&[7]).unwrap(), 7);
    }

    #[test]
    fn test_result_is_element_of_batch() {
        let batch = vec![3, 9, 3, 12, 9, 9];
        let winner = majority_vote(&batch).unwrap();
        assert!(batch.contains(&winner));
    }

    #[test]
    fn test_tie_breaks_to_smallest_id() {
        assert_eq!(majority_vote(&[9, 3, 9, 3]).unwrap(), 3);
        assert_eq!(majority_vote(&[100, 1]).unwrap(), 1);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        match majority_vote(&[]) {
            Err(PipelineError::EmptyBatch) => {}
            other => panic!("expected EmptyBatch, got {:?}", other),
        }
    }
}
