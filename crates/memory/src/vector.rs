//! Vector similarity and ranking utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Top-k selection above a score threshold

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Keep the `limit` best items scoring at least `min_score`, best first.
///
/// Ties keep their input order.
pub fn top_k<T>(scored: impl IntoIterator<Item = (f32, T)>, limit: usize, min_score: f32) -> Vec<(f32, T)> {
    let mut kept: Vec<(f32, T)> = scored
        .into_iter()
        .filter(|(score, _)| *score >= min_score)
        .collect();

    kept.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    kept.truncate(limit);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,2,3]·[4,5,6] = 32, |a| = √14, |b| = √77
        let expected = 32.0 / (14.0f32.sqrt() * 77.0f32.sqrt());
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((sim - expected).abs() < 1e-5);
    }

    #[test]
    fn top_k_ranks_and_filters() {
        let ranked = top_k(vec![(0.2, "low"), (0.9, "best"), (0.5, "mid"), (0.31, "edge")], 3, 0.3);
        let names: Vec<_> = ranked.iter().map(|(_, n)| *n).collect();
        assert_eq!(names, vec!["best", "mid", "edge"]);
    }

    #[test]
    fn top_k_respects_limit_and_keeps_tie_order() {
        let ranked = top_k(vec![(0.5, 'a'), (0.5, 'b'), (0.5, 'c')], 2, 0.0);
        assert_eq!(ranked, vec![(0.5, 'a'), (0.5, 'b')]);
    }

    #[test]
    fn top_k_threshold_is_inclusive() {
        assert_eq!(top_k(vec![(0.3, ())], 3, 0.3).len(), 1);
    }
}
