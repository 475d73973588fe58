use serde_json::Value;

/// Cosine similarity `(a·b) / (‖a‖·‖b‖)`.
///
/// Contract: a zero-norm vector on either side yields exactly `0.0`, never
/// NaN and never an error. Callers are expected to test this edge.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Parse a stored embedding column into a numeric vector.
///
/// Hosted stores hand the column back either as a JSON array of numbers or
/// as a string holding a bracketed list. Anything else is `None`, and the
/// caller excludes the row from ranking rather than failing the query.
pub fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => {
            let mut vector = Vec::with_capacity(items.len());
            for item in items {
                vector.push(item.as_f64()? as f32);
            }
            Some(vector)
        }
        Value::String(raw) => serde_json::from_str::<Vec<f32>>(raw.trim()).ok(),
        _ => None,
    }
}

/// Score every candidate against `query` and return the top `top_k`
/// payloads by descending similarity. The sort is stable, so ties keep
/// their original retrieval order. Candidates whose vector length differs
/// from the query's are skipped (vectors from a different provider
/// configuration are isolated, not compared).
///
/// Full linear scan, O(n) in candidate count. Fine at this scale; an ANN
/// index is a different design.
pub fn rank_top_k<T>(query: &[f32], candidates: Vec<(Vec<f32>, T)>, top_k: usize) -> Vec<(f64, T)> {
    let mut scored: Vec<(f64, T)> = candidates
        .into_iter()
        .filter(|(vector, _)| vector.len() == query.len())
        .map(|(vector, payload)| (cosine_similarity(query, &vector), payload))
        .collect();

    scored.sort_by(|left, right| right.0.total_cmp(&left.0));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn self_similarity_is_one() {
        let v = vec![0.3_f32, -1.2, 4.5];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_vector_similarity_is_exactly_zero() {
        let zero = vec![0.0_f32; 4];
        let other = vec![1.0_f32, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&other, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![-1.0_f32, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn parse_accepts_json_arrays_and_bracketed_strings() {
        assert_eq!(
            parse_embedding(&json!([1.0, 2.5, -3.0])),
            Some(vec![1.0, 2.5, -3.0])
        );
        assert_eq!(
            parse_embedding(&json!("[1.0, 2.5, -3.0]")),
            Some(vec![1.0, 2.5, -3.0])
        );
    }

    #[test]
    fn parse_rejects_non_numeric_payloads() {
        assert_eq!(parse_embedding(&json!("not a vector")), None);
        assert_eq!(parse_embedding(&json!([1.0, "two", 3.0])), None);
        assert_eq!(parse_embedding(&json!(null)), None);
        assert_eq!(parse_embedding(&json!({"dim": 2})), None);
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let query = vec![1.0_f32, 0.0];
        // A and B are identical vectors (same similarity); C is orthogonal.
        let candidates = vec![
            (vec![2.0_f32, 0.0], "A"),
            (vec![2.0_f32, 0.0], "B"),
            (vec![0.0_f32, 1.0], "C"),
        ];

        let top = rank_top_k(&query, candidates, 2);
        let labels: Vec<_> = top.iter().map(|(_, label)| *label).collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[test]
    fn fewer_candidates_than_top_k_returns_all() {
        let query = vec![1.0_f32];
        let candidates = vec![
            (vec![1.0_f32], 1),
            (vec![2.0_f32], 2),
            (vec![3.0_f32], 3),
        ];
        assert_eq!(rank_top_k(&query, candidates, 5).len(), 3);
    }

    #[test]
    fn mismatched_dimensions_are_isolated() {
        let query = vec![1.0_f32, 0.0];
        let candidates = vec![
            (vec![1.0_f32, 0.0], "same"),
            (vec![1.0_f32, 0.0, 0.0], "wider"),
        ];

        let top = rank_top_k(&query, candidates, 5);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].1, "same");
    }
}
