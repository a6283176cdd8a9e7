//! Result comparison for the correctness harness.

/// Per-element tolerance for network backends.
pub const EPSILON: f32 = 1e-4;

/// Tolerance on the difference of whole-vector sums for the vendor backend,
/// whose reduction order differs from the baseline.
pub const VENDOR_SUM_THRESHOLD: f64 = 1e-5;

/// Whether `actual` matches `expected` element-wise within `eps`. A length
/// difference is a mismatch.
pub fn check_vector(expected: &[f32], actual: &[f32], eps: f32) -> bool {
    first_mismatch(expected, actual, eps).is_none()
}

/// Index of the first element differing by more than `eps`, or the shorter
/// length if the lengths differ.
pub fn first_mismatch(expected: &[f32], actual: &[f32], eps: f32) -> Option<usize> {
    // Written as "not within" so that NaN counts as a mismatch.
    let within = |e: f32, a: f32| (e - a).abs() <= eps;
    expected
        .iter()
        .zip(actual)
        .position(|(&e, &a)| !within(e, a))
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}

/// Whether the sums of `expected` and `actual` agree within `threshold`.
/// Sums are accumulated in `f64`.
pub fn check_sum(expected: &[f32], actual: &[f32], threshold: f64) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    let sum = |v: &[f32]| v.iter().map(|&x| f64::from(x)).sum::<f64>();
    (sum(expected) - sum(actual)).abs() <= threshold
}
