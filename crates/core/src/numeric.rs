//! Shared numeric rules: rounding and quantiles.

/// Round to `dp` decimal places, half away from zero.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let scale = 10_f64.powi(dp as i32);
    (value * scale).round() / scale
}

/// Round to the 2 decimal places every persisted numeric field carries.
pub fn round2(value: f64) -> f64 {
    round_dp(value, 2)
}

/// Linear-interpolation quantile over an ascending-sorted slice.
///
/// Matches the convention the offline bounds were computed with. The slice
/// must be non-empty and sorted; `q` must be in `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!((0.0..=1.0).contains(&q));

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}
