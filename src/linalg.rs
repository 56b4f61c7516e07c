//! Dense linear algebra kernels shared by the backends.

use tracing::trace;

use crate::error::{Error, Result};

/// Inverts the `n x n` row-major matrix `matrix` using Gauss-Jordan
/// elimination with partial pivoting.
///
/// A pivot is treated as zero when it is within `n * f64::EPSILON` of the
/// largest entry in magnitude. An inverse that overflows `f32` is rejected
/// as well, so the result is always finite.
///
/// Returns the inverse in row-major order.
pub(crate) fn invert(matrix: &[f32], n: usize) -> Result<Vec<f32>> {
    if matrix.len() != n * n {
        return Err(Error::ShapeMismatch {
            op: "inv",
            expected: vec![n, n],
            got: vec![matrix.len()],
        });
    }

    // Eliminate in f64.
    let mut a: Vec<f64> = matrix.iter().map(|&v| f64::from(v)).collect();
    let max_abs = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    #[allow(clippy::cast_precision_loss)]
    let tolerance = n as f64 * f64::EPSILON * max_abs;
    let mut inv = vec![0.0_f64; n * n];
    for i in 0..n {
        inv[i * n + i] = 1.0;
    }

    for col in 0..n {
        let magnitude = |r: usize| a[r * n + col].abs();
        let pivot_row = (col..n)
            .max_by(|&r, &s| magnitude(r).total_cmp(&magnitude(s)))
            .unwrap_or(col);
        let pivot = a[pivot_row * n + col];
        if pivot.abs() <= tolerance {
            trace!(col, pivot, tolerance, "singular pivot");
            return Err(Error::SingularMatrix);
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap(pivot_row * n + k, col * n + k);
                inv.swap(pivot_row * n + k, col * n + k);
            }
        }

        let scale = 1.0 / pivot;
        for k in 0..n {
            a[col * n + k] *= scale;
            inv[col * n + k] *= scale;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[row * n + k] -= factor * a[col * n + k];
                inv[row * n + k] -= factor * inv[col * n + k];
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let inv: Vec<f32> = inv.into_iter().map(|v| v as f32).collect();
    if inv.iter().any(|v| !v.is_finite()) {
        trace!(n, "inverse is not representable as f32");
        return Err(Error::SingularMatrix);
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use crate::{error::Error, linalg};

    #[test]
    fn invert_identity_is_identity() {
        let eye = vec![1.0, 0.0, 0.0, 1.0];

        assert_eq!(linalg::invert(&eye, 2).unwrap(), eye);
    }

    #[test]
    fn invert_two_by_two() {
        let m = vec![4.0, 7.0, 2.0, 6.0];
        let expected = [0.6, -0.7, -0.2, 0.4];

        let inv = linalg::invert(&m, 2).unwrap();

        for (got, want) in inv.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{got} != {want}");
        }
    }

    #[test]
    fn invert_needs_row_swap() {
        let m = vec![0.0, 1.0, 1.0, 0.0];

        assert_eq!(linalg::invert(&m, 2).unwrap(), m);
    }

    #[test]
    fn invert_singular_fails() {
        let m = vec![1.0, 2.0, 2.0, 4.0];

        assert!(matches!(
            linalg::invert(&m, 2),
            Err(Error::SingularMatrix)
        ));
    }

    #[test]
    fn invert_zero_matrix_fails() {
        assert!(matches!(
            linalg::invert(&[0.0; 4], 2),
            Err(Error::SingularMatrix)
        ));
    }

    #[test]
    fn invert_scales_tolerance_with_entries() {
        let m = vec![1e-13, 0.0, 0.0, 1e-13];

        let inv = linalg::invert(&m, 2).unwrap();

        assert!((inv[0] - 1e13).abs() <= 1e13 * 1e-6, "{}", inv[0]);
        assert!((inv[3] - 1e13).abs() <= 1e13 * 1e-6, "{}", inv[3]);
        assert_eq!((inv[1], inv[2]), (0.0, 0.0));
    }

    #[test]
    fn invert_rejects_inverse_overflowing_f32() {
        // Upper bidiagonal: the top right entry of the inverse is -1e44.
        let d = 1e-11_f32;
        let m = vec![
            d, 1.0, 0.0, 0.0, //
            0.0, d, 1.0, 0.0, //
            0.0, 0.0, d, 1.0, //
            0.0, 0.0, 0.0, d,
        ];

        assert!(matches!(
            linalg::invert(&m, 4),
            Err(Error::SingularMatrix)
        ));
    }

    #[test]
    fn invert_rejects_wrong_length() {
        assert!(matches!(
            linalg::invert(&[1.0, 2.0, 3.0], 2),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
