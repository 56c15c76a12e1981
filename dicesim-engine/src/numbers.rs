//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Round a f64 to `places` decimal digits, returning 0.0 for non-finite values.
#[must_use]
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let exponent = cast::<u32, i32>(places).unwrap_or(i32::MAX);
    let factor = 10_f64.powi(exponent);
    if !factor.is_finite() {
        return value;
    }
    (value * factor).round() / factor
}

/// Split `total` into `parts` near-equal shares; the remainder goes to the leading shares.
#[must_use]
pub fn split_evenly(total: u64, parts: usize) -> Vec<u64> {
    let parts = parts.max(1);
    let divisor = cast::<usize, u64>(parts).unwrap_or(1);
    let base = total / divisor;
    let remainder = total % divisor;
    (0..divisor)
        .map(|idx| if idx < remainder { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_handles_precision_and_non_finite() {
        assert!((round_to(1.234_567_89, 6) - 1.234_568).abs() < 1e-12);
        assert!((round_to(0.049_9, 1) - 0.0).abs() < f64::EPSILON);
        assert!((round_to(0.05, 1) - 0.1).abs() < f64::EPSILON);
        assert!((round_to(f64::NAN, 3) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn conversions_are_exact_for_small_values() {
        assert!((u64_to_f64(60_000) - 60_000.0).abs() < f64::EPSILON);
        assert!((usize_to_f64(3) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn split_evenly_preserves_total() {
        let shares = split_evenly(10, 3);
        assert_eq!(shares, vec![4, 3, 3]);
        assert_eq!(shares.iter().sum::<u64>(), 10);
        assert_eq!(split_evenly(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_evenly(7, 0), vec![7]);
    }
}
