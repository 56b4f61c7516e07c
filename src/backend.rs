//! The generic computational backend.
//!
//! This module provides the [`Backend`] trait which defines the complete
//! contract for tensor creation, elementwise math, reductions and the linear
//! algebra used while training restricted Boltzmann machines.
//!
//! Two backends ship with the crate: [`ndarray`] (the default) and
//! [`dense`]. The one used by [`SelectedBackend`] is picked with crate
//! feature flags.

pub mod dense;
pub mod ndarray;

use ::ndarray::ArrayD;
use num_traits::ToPrimitive;
use rand::Rng;
use tracing::debug;

use crate::{
    distance::{self, Rows},
    error::{Error, Result},
    shape,
};

/// Machine epsilon of `f32`, used to keep divisions away from zero.
pub const EPSILON: f32 = f32::EPSILON;

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DType {
    /// 32-bit IEEE float.
    F32,
}

/// A trait that defines the contract for tensor operations that every
/// backend must fulfill.
///
/// The `Backend` trait is the core abstraction of the crate. Every training
/// routine is written against it so the underlying engine can be swapped
/// through feature flags without touching the caller. All functions are
/// associated functions and pure unless their name ends in `_inplace` or
/// they take `&mut`.
///
/// Conventions every implementation follows:
///
/// - Tensors hold `f32`; logical element order is row-major.
/// - Binary elementwise operations broadcast their operands the way NumPy
///   does.
/// - Reductions taking an `axis` keep the reduced axis with length 1. With
///   `None` every axis is reduced and kept.
/// - `argmax` and `argmin` drop the reduced axis.
pub trait Backend {
    /// The float tensor.
    type Tensor: Clone;

    /// The boolean tensor produced by comparisons.
    type Mask: Clone;

    /// The index tensor produced by `argmax` and `argmin`.
    type Indices: Clone;

    /// Short name of the backend, used in diagnostics.
    const NAME: &'static str;

    // ----- Tensors ----- //

    /// Copies the tensor into an [`ArrayD`].
    fn to_array(tensor: &Self::Tensor) -> ArrayD<f32>;

    /// Copies a mask into an [`ArrayD`].
    fn mask_to_array(mask: &Self::Mask) -> ArrayD<bool>;

    /// Copies an index tensor into an [`ArrayD`].
    fn indices_to_array(indices: &Self::Indices) -> ArrayD<usize>;

    /// Converts a primitive number to `f32`.
    #[inline]
    fn float_scalar<S: ToPrimitive>(scalar: S) -> Result<f32> {
        scalar.to_f32().ok_or(Error::ScalarConversion)
    }

    /// Builds a tensor from an [`ArrayD`].
    fn float_tensor(array: ArrayD<f32>) -> Self::Tensor;

    /// Builds a tensor from row-major `data`.
    fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self::Tensor>;

    /// Builds a mask from row-major `data`.
    fn mask_from_vec(data: Vec<bool>, shape: &[usize]) -> Result<Self::Mask>;

    /// Returns the shape of the tensor as a slice of dimensions.
    fn shape(tensor: &Self::Tensor) -> &[usize];

    /// Returns the number of dimensions of the tensor.
    fn ndim(tensor: &Self::Tensor) -> usize;

    /// Reverses the order of the axes.
    fn transpose(tensor: &Self::Tensor) -> Self::Tensor;

    /// Creates a tensor with all elements set to zero, with the given shape.
    fn zeros(shape: &[usize]) -> Self::Tensor;

    /// Creates a zero tensor with the shape of `tensor`.
    #[inline]
    fn zeros_like(tensor: &Self::Tensor) -> Self::Tensor {
        Self::zeros(Self::shape(tensor))
    }

    /// Creates a tensor with all elements set to one, with the given shape.
    fn ones(shape: &[usize]) -> Self::Tensor;

    /// Creates a tensor of ones with the shape of `tensor`.
    #[inline]
    fn ones_like(tensor: &Self::Tensor) -> Self::Tensor {
        Self::ones(Self::shape(tensor))
    }

    /// Returns the main diagonal of a matrix as a vector.
    fn diag(mat: &Self::Tensor) -> Result<Self::Tensor>;

    /// Builds a square matrix with `vec` on its diagonal.
    fn diagonal_matrix(vec: &Self::Tensor) -> Result<Self::Tensor>;

    /// The `n x n` identity matrix.
    fn identity(n: usize) -> Self::Tensor;

    /// Overwrites the main diagonal of `mat` with `value`.
    fn fill_diagonal(mat: &mut Self::Tensor, value: f32) -> Result<()>;

    /// Elementwise sign: -1, 0 or 1.
    fn sign(tensor: &Self::Tensor) -> Self::Tensor;

    /// Clamps every element into `[min, max]`; a missing bound is open.
    fn clip(
        tensor: &Self::Tensor,
        min: Option<f32>,
        max: Option<f32>,
    ) -> Self::Tensor;

    /// In-place [`Backend::clip`].
    fn clip_inplace(
        tensor: &mut Self::Tensor,
        min: Option<f32>,
        max: Option<f32>,
    );

    /// Rounds to the nearest integer, ties to even.
    fn tround(tensor: &Self::Tensor) -> Self::Tensor;

    /// Copies the tensor into one dimension, row-major.
    fn flatten(tensor: &Self::Tensor) -> Self::Tensor;

    /// Gives the tensor a new shape with the same number of elements.
    fn reshape(tensor: &Self::Tensor, shape: &[usize]) -> Result<Self::Tensor>;

    /// The element type.
    #[inline]
    fn dtype(_tensor: &Self::Tensor) -> DType {
        DType::F32
    }

    /// Repeats the vector `vec` once for every row of `mat`.
    fn broadcast(
        vec: &Self::Tensor,
        mat: &Self::Tensor,
    ) -> Result<Self::Tensor>;

    // ----- Matrix routines ----- //

    /// Running average: `x <- w * x + (1 - w) * y`.
    fn mix_inplace(
        w: f32,
        x: &mut Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()>;

    /// Running average of squares: `x <- w * x + (1 - w) * y * y`.
    fn square_mix_inplace(
        w: f32,
        x: &mut Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()>;

    /// Elementwise `x / sqrt(EPSILON + y)`.
    fn sqrt_div(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor>;

    /// Divides `x` by the sum of `EPSILON + x`.
    fn normalize(x: &Self::Tensor) -> Self::Tensor;

    /// The L2 norm of all elements.
    fn norm(x: &Self::Tensor) -> f32;

    /// Maximum along `axis`, or of everything.
    fn tmax(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Minimum along `axis`, or of everything.
    fn tmin(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Arithmetic mean along `axis`, or of everything.
    fn mean(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Population variance along `axis`, or of everything.
    fn var(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Population standard deviation along `axis`, or of everything.
    fn std(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Sum along `axis`, or of everything.
    fn tsum(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Product along `axis`, or of everything.
    fn tprod(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor>;

    /// Whether any element along `axis`, or of everything, is set.
    fn tany(x: &Self::Mask, axis: Option<usize>) -> Result<Self::Mask>;

    /// Whether every element along `axis`, or of everything, is set.
    fn tall(x: &Self::Mask, axis: Option<usize>) -> Result<Self::Mask>;

    /// Elementwise `x == y`.
    fn equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask>;

    /// Elementwise `x != y`.
    fn not_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask>;

    /// Elementwise `x > y`.
    fn greater(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask>;

    /// Elementwise `x >= y`.
    fn greater_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask>;

    /// Elementwise `x < y`.
    fn lesser(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask>;

    /// Elementwise `x <= y`.
    fn lesser_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask>;

    /// Whether `|x - y| <= 1e-8 + 1e-5 * |y|` holds everywhere.
    fn allclose(x: &Self::Tensor, y: &Self::Tensor) -> Result<bool>;

    /// Elementwise maximum.
    fn maximum(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor>;

    /// Elementwise minimum.
    fn minimum(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor>;

    /// Index of the first maximum along `axis`; `None` gives the flat index.
    fn argmax(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Indices>;

    /// Index of the first minimum along `axis`; `None` gives the flat index.
    fn argmin(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Indices>;

    /// Inner product of vectors, matrix-vector or matrix-matrix product.
    fn dot(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Outer product of two vectors.
    fn outer(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor>;

    /// `a + W b`.
    fn affine(
        a: &Self::Tensor,
        b: &Self::Tensor,
        w: &Self::Tensor,
    ) -> Result<Self::Tensor>;

    /// `a W b`.
    fn quadratic(
        a: &Self::Tensor,
        b: &Self::Tensor,
        w: &Self::Tensor,
    ) -> Result<Self::Tensor> {
        Self::dot(a, &Self::dot(w, b)?)
    }

    /// Inverse of a square matrix.
    fn inv(mat: &Self::Tensor) -> Result<Self::Tensor>;

    /// `(vis W) * hid` summed over `axis`, i.e. `v_i^T W h_i` per row pair.
    ///
    /// With `vis: L x N`, `w: N x M` and `hid: L x M`, `axis` 1 yields one
    /// value per row.
    fn batch_dot(
        vis: &Self::Tensor,
        w: &Self::Tensor,
        hid: &Self::Tensor,
        axis: usize,
    ) -> Result<Self::Tensor>;

    /// `sum_i v_i h_i^T`, i.e. `vis^T hid`.
    fn batch_outer(
        vis: &Self::Tensor,
        hid: &Self::Tensor,
    ) -> Result<Self::Tensor> {
        Self::dot(&Self::transpose(vis), hid)
    }

    /// Repeats every slice along `axis` `n` times.
    fn repeat(
        tensor: &Self::Tensor,
        n: usize,
        axis: usize,
    ) -> Result<Self::Tensor>;

    /// Joins equally shaped tensors along a new `axis`.
    fn stack(tensors: &[&Self::Tensor], axis: usize) -> Result<Self::Tensor>;

    /// Joins tensors column-wise (along axis 0 for vectors).
    fn hstack(tensors: &[&Self::Tensor]) -> Result<Self::Tensor>;

    /// Joins tensors row-wise, treating vectors as single rows.
    fn vstack(tensors: &[&Self::Tensor]) -> Result<Self::Tensor>;

    /// Evenly spaced values in `[start, end)`.
    fn trange(start: f32, end: f32, step: f32) -> Result<Self::Tensor> {
        let data = arange(start, end, step)?;
        let len = data.len();
        Self::from_vec(data, &[len])
    }

    // ----- Specialized matrix functions ----- //

    /// Squared euclidean distance between two vectors.
    fn squared_euclidean_distance(
        a: &Self::Tensor,
        b: &Self::Tensor,
    ) -> Result<f32> {
        vector_pair::<Self>("squared_euclidean_distance", a, b)?;
        distance::squared_euclidean(
            &row_major(&Self::to_array(a)),
            &row_major(&Self::to_array(b)),
        )
    }

    /// Euclidean distance between two vectors.
    fn euclidean_distance(a: &Self::Tensor, b: &Self::Tensor) -> Result<f32> {
        Self::squared_euclidean_distance(a, b).map(f32::sqrt)
    }

    /// Energy distance between the rows of two matrices, estimated on at
    /// most `downsample` rows of each.
    fn fast_energy_distance<R>(
        minibatch: &Self::Tensor,
        samples: &Self::Tensor,
        downsample: usize,
        rng: &mut R,
    ) -> Result<f32>
    where
        R: Rng + ?Sized,
    {
        let x = Self::to_array(minibatch);
        let y = Self::to_array(samples);
        shape::check_rank("fast_energy_distance", x.shape(), 2)?;
        shape::check_rank("fast_energy_distance", y.shape(), 2)?;
        let (x_data, y_data) = (row_major(&x), row_major(&y));
        debug!(
            backend = Self::NAME,
            minibatch = ?x.shape(),
            samples = ?y.shape(),
            downsample,
            "fast_energy_distance"
        );
        distance::energy(
            Rows::new(&x_data, x.shape()[1])?,
            Rows::new(&y_data, y.shape()[1])?,
            downsample,
            rng,
        )
    }
}

fn row_major(array: &ArrayD<f32>) -> Vec<f32> {
    array.iter().copied().collect()
}

fn vector_pair<B: Backend + ?Sized>(
    op: &'static str,
    a: &B::Tensor,
    b: &B::Tensor,
) -> Result<()> {
    if B::ndim(a) != 1 {
        return Err(Error::InvalidRank { op, ndim: B::ndim(a) });
    }
    if B::shape(a) != B::shape(b) {
        return Err(Error::ShapeMismatch {
            op,
            expected: B::shape(a).to_vec(),
            got: B::shape(b).to_vec(),
        });
    }
    Ok(())
}

/// Values of `start + k * step` that lie in `[start, end)`.
pub(crate) fn arange(start: f32, end: f32, step: f32) -> Result<Vec<f32>> {
    let finite = step.is_finite() && start.is_finite() && end.is_finite();
    if step == 0.0 || !finite {
        return Err(Error::InvalidArgument {
            arg: "step",
            reason: format!("cannot step from {start} to {end} by {step}"),
        });
    }
    let count = ((end - start) / step).ceil();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = if count > 0.0 { count as usize } else { 0 };
    #[allow(clippy::cast_precision_loss)]
    let values = (0..count).map(|k| start + k as f32 * step).collect();
    Ok(values)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "ndarray-backend")] {
        /// Dynamically configured type alias for the selected backend, based
        /// on crate feature flags.
        pub type SelectedBackend = ndarray::NdarrayBackend;
    } else if #[cfg(feature = "dense-backend")] {
        /// Dynamically configured type alias for the selected backend, based
        /// on crate feature flags.
        pub type SelectedBackend = dense::DenseBackend;
    } else {
        compile_error!(
            "A backend feature must be enabled. \
             Available: `ndarray-backend`, `dense-backend`"
        );
    }
}
