/// Cosine similarity between two vectors.
///
/// Returns 0.0 for empty, mismatched or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Highest similarity of `query` against any candidate.
pub fn max_similarity<'a, I>(query: &[f32], candidates: I) -> f32
where
    I: IntoIterator<Item = &'a [f32]>,
{
    candidates
        .into_iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .fold(0.0, f32::max)
}
