//! The contiguous tensor used by the dense backend and the parallel kernels
//! that walk it.

use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    shape,
};

/// Element count above which kernels are spread over the rayon pool.
pub(crate) const PAR_THRESHOLD: usize = 8192;

/// A row-major, contiguous, dynamically shaped tensor.
///
/// The element count always equals the product of the shape.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseTensor<T> {
    data: Vec<T>,
    shape: Vec<usize>,
}

impl<T> DenseTensor<T> {
    /// Wraps row-major `data` with the given shape.
    pub fn new(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        if data.len() != shape::size(shape) {
            return Err(Error::ShapeMismatch {
                op: "from_vec",
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Caller guarantees `data.len() == shape::size(&shape)`.
    #[inline]
    pub(crate) fn from_parts(data: Vec<T>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape::size(&shape));
        Self { data, shape }
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The elements in row-major order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Same data under a new shape of equal size.
    pub(crate) fn with_shape(self, shape: Vec<usize>) -> Result<Self> {
        if shape::size(&shape) != self.data.len() {
            return Err(Error::ShapeMismatch {
                op: "reshape",
                expected: self.shape,
                got: shape,
            });
        }
        Ok(Self::from_parts(self.data, shape))
    }
}

impl<T: Clone> DenseTensor<T> {
    /// A tensor of the given shape with every element set to `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: T) -> Self {
        Self::from_parts(vec![value; shape::size(shape)], shape.to_vec())
    }

    /// Copies the tensor into an [`ArrayD`].
    #[must_use]
    pub fn to_array(&self) -> ArrayD<T> {
        // SAFETY: The element count always equals the product of the shape
        // and the data is row-major, which is the layout ndarray expects.
        unsafe {
            ArrayD::from_shape_vec_unchecked(
                IxDyn(&self.shape),
                self.data.clone(),
            )
        }
    }
}

/// Provides interoperability with the `ndarray` crate.
impl<T: Clone> From<ArrayD<T>> for DenseTensor<T> {
    #[inline]
    fn from(value: ArrayD<T>) -> Self {
        let shape = value.shape().to_vec();
        let data = value.iter().cloned().collect();
        Self::from_parts(data, shape)
    }
}

/// Offsets into a source of shape `src` for every axis of a broadcast
/// result with `ndim` axes. Broadcast axes get stride 0.
fn broadcast_strides(src: &[usize], out: &[usize]) -> Vec<usize> {
    let src_strides = shape::strides(src);
    let lead = out.len() - src.len();
    (0..out.len())
        .map(|k| {
            if k < lead || (src[k - lead] == 1 && out[k] != 1) {
                0
            } else {
                src_strides[k - lead]
            }
        })
        .collect()
}

/// Source offset of the `flat`-th element of a tensor of shape `out`.
#[inline]
fn offset(mut flat: usize, out: &[usize], strides: &[usize]) -> usize {
    let mut offset = 0;
    for k in (0..out.len()).rev() {
        let dim = out[k];
        offset += (flat % dim) * strides[k];
        flat /= dim;
    }
    offset
}

/// Builds a vector of `len` elements with `f(i)`, in parallel when large.
fn build<R, F>(len: usize, work: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Sync + Send,
{
    if work >= PAR_THRESHOLD {
        (0..len).into_par_iter().map(f).collect()
    } else {
        (0..len).map(f).collect()
    }
}

impl<T> DenseTensor<T>
where
    T: Copy + Send + Sync,
{
    /// Applies `f` to every element.
    pub(crate) fn map<R, F>(&self, f: F) -> DenseTensor<R>
    where
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        let data = if self.data.len() >= PAR_THRESHOLD {
            self.data.par_iter().map(|&v| f(v)).collect()
        } else {
            self.data.iter().map(|&v| f(v)).collect()
        };
        DenseTensor::from_parts(data, self.shape.clone())
    }

    /// Applies `f` to every element in place.
    pub(crate) fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(T) -> T + Sync + Send,
    {
        if self.data.len() >= PAR_THRESHOLD {
            self.data.par_iter_mut().for_each(|v| *v = f(*v));
        } else {
            self.data.iter_mut().for_each(|v| *v = f(*v));
        }
    }

    /// Broadcasts `self` against `other` and combines element pairs with `f`.
    pub(crate) fn zip_with<U, R, F>(
        &self,
        other: &DenseTensor<U>,
        f: F,
    ) -> Result<DenseTensor<R>>
    where
        U: Copy + Send + Sync,
        R: Send,
        F: Fn(T, U) -> R + Sync + Send,
    {
        if self.shape == other.shape {
            let (xs, ys) = (&self.data, &other.data);
            let data = build(xs.len(), xs.len(), |i| f(xs[i], ys[i]));
            return Ok(DenseTensor::from_parts(data, self.shape.clone()));
        }

        let out = shape::broadcast_shapes(&self.shape, &other.shape)?;
        let xs_strides = broadcast_strides(&self.shape, &out);
        let ys_strides = broadcast_strides(&other.shape, &out);
        let len = shape::size(&out);
        let data = build(len, len, |i| {
            f(
                self.data[offset(i, &out, &xs_strides)],
                other.data[offset(i, &out, &ys_strides)],
            )
        });
        Ok(DenseTensor::from_parts(data, out))
    }

    /// `self` materialised with shape `out`.
    pub(crate) fn broadcast_to(&self, out: &[usize]) -> Result<Self> {
        if shape::broadcast_shapes(&self.shape, out)? != out {
            return Err(Error::Broadcast {
                lhs: self.shape.clone(),
                rhs: out.to_vec(),
            });
        }
        let strides = broadcast_strides(&self.shape, out);
        let len = shape::size(out);
        let data = build(len, len, |i| self.data[offset(i, out, &strides)]);
        Ok(Self::from_parts(data, out.to_vec()))
    }

    /// Applies `f` to every lane along `axis`, or to all elements, keeping
    /// the reduced axis with length 1.
    pub(crate) fn reduce<R, F>(
        &self,
        axis: Option<usize>,
        f: F,
    ) -> Result<DenseTensor<R>>
    where
        R: Send,
        F: Fn(&[T]) -> R + Sync + Send,
    {
        let Some(axis) = axis else {
            let value = f(&self.data);
            let shape = vec![1; self.ndim()];
            return Ok(DenseTensor::from_parts(vec![value], shape));
        };
        shape::check_axis(axis, self.ndim())?;

        let len = self.shape[axis];
        let inner: usize = self.shape[axis + 1..].iter().product();
        let outer: usize = self.shape[..axis].iter().product();
        let data = build(outer * inner, self.data.len(), |o| {
            let (oi, ii) = (o / inner, o % inner);
            let base = oi * len * inner + ii;
            if inner == 1 {
                f(&self.data[base..base + len])
            } else {
                let lane: Vec<T> =
                    (0..len).map(|k| self.data[base + k * inner]).collect();
                f(&lane)
            }
        });
        Ok(DenseTensor::from_parts(data, shape::keep_axis(&self.shape, axis)))
    }

    /// Reorders the axes so output axis `k` is input axis `axes[k]`.
    pub(crate) fn permute(&self, axes: &[usize]) -> Self {
        let out: Vec<usize> = axes.iter().map(|&a| self.shape[a]).collect();
        let src = shape::strides(&self.shape);
        let strides: Vec<usize> = axes.iter().map(|&a| src[a]).collect();
        let data = build(self.data.len(), self.data.len(), |i| {
            self.data[offset(i, &out, &strides)]
        });
        Self::from_parts(data, out)
    }
}
