//! Shape arithmetic shared by the backends.

use crate::error::{Error, Result};

/// Number of elements in a tensor of the given shape.
#[inline]
#[must_use]
pub fn size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides, in elements.
#[must_use]
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Fails unless `axis < ndim`.
#[inline]
pub fn check_axis(axis: usize, ndim: usize) -> Result<()> {
    if axis < ndim {
        Ok(())
    } else {
        Err(Error::InvalidAxis { axis, ndim })
    }
}

/// Fails unless the tensor has exactly `ndim` dimensions.
#[inline]
pub fn check_rank(
    op: &'static str,
    shape: &[usize],
    ndim: usize,
) -> Result<()> {
    if shape.len() == ndim {
        Ok(())
    } else {
        Err(Error::InvalidRank {
            op,
            ndim: shape.len(),
        })
    }
}

/// Shape of the result of broadcasting `lhs` against `rhs`.
///
/// Shapes are aligned on their trailing axes; a pair of axes is compatible
/// when the lengths are equal or one of them is 1.
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let l = axis_from_end(lhs, ndim - 1 - i);
        let r = axis_from_end(rhs, ndim - 1 - i);
        out[i] = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => {
                return Err(Error::Broadcast {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                });
            }
        };
    }
    Ok(out)
}

fn axis_from_end(shape: &[usize], from_end: usize) -> usize {
    if from_end < shape.len() {
        shape[shape.len() - 1 - from_end]
    } else {
        1
    }
}

/// Fails unless `other` has the rank of `first` and agrees with it on
/// every axis but `axis`, so the two can be joined along `axis`.
pub fn check_concat(
    op: &'static str,
    first: &[usize],
    other: &[usize],
    axis: usize,
) -> Result<()> {
    let compatible = first.len() == other.len()
        && first
            .iter()
            .zip(other)
            .enumerate()
            .all(|(k, (a, b))| k == axis || a == b);
    if compatible {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            op,
            expected: first.to_vec(),
            got: other.to_vec(),
        })
    }
}

/// Shape with `axis` set to length 1.
#[must_use]
pub fn keep_axis(shape: &[usize], axis: usize) -> Vec<usize> {
    let mut out = shape.to_vec();
    out[axis] = 1;
    out
}

/// Shape with `axis` removed.
#[must_use]
pub fn remove_axis(shape: &[usize], axis: usize) -> Vec<usize> {
    let mut out = shape.to_vec();
    let _ = out.remove(axis);
    out
}

#[cfg(test)]
mod tests {
    use crate::{error::Error, shape};

    #[test]
    fn strides_are_row_major() {
        assert_eq!(shape::strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(shape::strides(&[5]), vec![1]);
        assert!(shape::strides(&[]).is_empty());
    }

    #[test]
    fn broadcast_equal_shapes_is_identity() {
        let out = shape::broadcast_shapes(&[2, 3], &[2, 3]).unwrap();

        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn broadcast_row_vector_against_matrix() {
        let out = shape::broadcast_shapes(&[4, 3], &[3]).unwrap();

        assert_eq!(out, vec![4, 3]);
    }

    #[test]
    fn broadcast_expands_unit_axes_on_both_sides() {
        let out = shape::broadcast_shapes(&[4, 1], &[1, 5]).unwrap();

        assert_eq!(out, vec![4, 5]);
    }

    #[test]
    fn broadcast_rejects_incompatible_axes() {
        let err = shape::broadcast_shapes(&[4, 3], &[4]).unwrap_err();

        assert!(matches!(err, Error::Broadcast { .. }));
    }

    #[test]
    fn check_axis_rejects_out_of_range() {
        assert!(shape::check_axis(1, 2).is_ok());
        assert!(matches!(
            shape::check_axis(2, 2),
            Err(Error::InvalidAxis { axis: 2, ndim: 2 })
        ));
    }

    #[test]
    fn check_concat_ignores_join_axis() {
        assert!(shape::check_concat("hstack", &[2, 3], &[2, 5], 1).is_ok());
        assert!(matches!(
            shape::check_concat("hstack", &[2, 3], &[4, 3], 1),
            Err(Error::ShapeMismatch { op: "hstack", .. })
        ));
        assert!(shape::check_concat("vstack", &[2, 3], &[3], 0).is_err());
    }

    #[test]
    fn keep_and_remove_axis() {
        assert_eq!(shape::keep_axis(&[2, 3, 4], 1), vec![2, 1, 4]);
        assert_eq!(shape::remove_axis(&[2, 3, 4], 1), vec![2, 4]);
    }
}
