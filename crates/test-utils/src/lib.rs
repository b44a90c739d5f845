//! Shared test utilities for the green-condor workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Approximate floating-point assertions
//! - Synthetic weather-field generators
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, uniform_fields};
//! ```

pub mod generators;

// Re-export commonly used items at the crate root
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Asserts that every value of a float slice is NaN.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_all_nan;
///
/// assert_all_nan!(&[f32::NAN, f32::NAN]);
/// ```
#[macro_export]
macro_rules! assert_all_nan {
    ($values:expr) => {{
        for (i, value) in $values.iter().enumerate() {
            if !value.is_nan() {
                panic!(
                    "assertion failed: value at index {} is `{:?}`, expected NaN",
                    i, value
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_all_nan_passes() {
        assert_all_nan!(vec![f32::NAN, f32::NAN]);
        assert_all_nan!(Vec::<f64>::new());
    }

    #[test]
    #[should_panic(expected = "expected NaN")]
    fn test_assert_all_nan_fails() {
        assert_all_nan!([f32::NAN, 0.0]);
    }
}
