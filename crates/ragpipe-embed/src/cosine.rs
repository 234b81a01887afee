/// Cosine similarity clamped to `[0, 1]`.
///
/// Zero-norm inputs score `0.0`. Accumulates in f64 so that `cosine(x, x)`
/// is exactly `1.0`.
#[allow(clippy::cast_possible_truncation)]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 { return 0.0; }
    (dot / (norm_a * norm_b).sqrt()).clamp(0.0, 1.0) as f32
}
