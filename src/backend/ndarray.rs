//! [`ndarray`] crate backend.

use ndarray::{
    Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis, Ix1, Ix2,
    IxDyn, Zip,
};

use crate::{
    backend::{Backend, EPSILON},
    error::{Error, Result},
    kernels, linalg, shape,
};

/// Marker type for the [`ndarray`] backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct NdarrayBackend;

/// Runs `f` on a lane as a slice, copying only when the lane is strided.
fn with_slice<T: Copy, R>(lane: ArrayView1<'_, T>, f: impl Fn(&[T]) -> R) -> R {
    match lane.as_slice() {
        Some(slice) => f(slice),
        None => f(&lane.to_vec()),
    }
}

/// Applies `f` to every lane along `axis` (or to all elements) and keeps
/// the reduced axis with length 1.
fn reduce<T, R>(
    x: &ArrayD<T>,
    axis: Option<usize>,
    f: impl Fn(&[T]) -> R,
) -> Result<ArrayD<R>>
where
    T: Copy,
    R: Clone,
{
    match axis {
        Some(axis) => {
            shape::check_axis(axis, x.ndim())?;
            Ok(x
                .map_axis(Axis(axis), |lane| with_slice(lane, &f))
                .insert_axis(Axis(axis)))
        }
        None => {
            let all: Vec<T> = x.iter().copied().collect();
            Ok(ArrayD::from_elem(IxDyn(&vec![1; x.ndim()]), f(&all)))
        }
    }
}

/// Fails when the reduction would see no elements.
fn non_empty(
    op: &'static str,
    shape: &[usize],
    axis: Option<usize>,
) -> Result<()> {
    let len = match axis {
        Some(axis) => shape.get(axis).copied().unwrap_or(1),
        None => shape::size(shape),
    };
    if len == 0 {
        Err(Error::EmptyReduction { op })
    } else {
        Ok(())
    }
}

/// Broadcasts `x` against `y` and maps every element pair through `f`.
fn zip_with<A, B, R>(
    x: &ArrayD<A>,
    y: &ArrayD<B>,
    f: impl Fn(A, B) -> R,
) -> Result<ArrayD<R>>
where
    A: Copy,
    B: Copy,
{
    let out = IxDyn(&shape::broadcast_shapes(x.shape(), y.shape())?);
    let broadcast_error = || Error::Broadcast {
        lhs: x.shape().to_vec(),
        rhs: y.shape().to_vec(),
    };
    let xv = x.broadcast(out.clone()).ok_or_else(broadcast_error)?;
    let yv = y.broadcast(out).ok_or_else(broadcast_error)?;
    Ok(Zip::from(&xv).and(&yv).map_collect(|&a, &b| f(a, b)))
}

/// `y` viewed with the shape of `x`, for in-place updates of `x`.
fn broadcast_into<'a>(
    x: &ArrayD<f32>,
    y: &'a ArrayD<f32>,
) -> Result<ArrayViewD<'a, f32>> {
    y.broadcast(x.raw_dim()).ok_or_else(|| Error::Broadcast {
        lhs: x.shape().to_vec(),
        rhs: y.shape().to_vec(),
    })
}

fn as_vector<'a>(
    op: &'static str,
    x: &'a ArrayD<f32>,
) -> Result<ArrayView1<'a, f32>> {
    shape::check_rank(op, x.shape(), 1)?;
    view1(x)
}

fn view1(x: &ArrayD<f32>) -> Result<ArrayView1<'_, f32>> {
    Ok(x.view().into_dimensionality::<Ix1>()?)
}

fn view2(x: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>> {
    Ok(x.view().into_dimensionality::<Ix2>()?)
}

fn no_tensors() -> Error {
    Error::InvalidArgument {
        arg: "tensors",
        reason: "need at least one tensor to stack".to_owned(),
    }
}

/// Joins `views` along an existing `axis` after checking that they agree
/// on every other axis.
fn concatenate(
    op: &'static str,
    views: &[ArrayViewD<'_, f32>],
    axis: usize,
) -> Result<ArrayD<f32>> {
    let first = views.first().ok_or_else(no_tensors)?;
    shape::check_axis(axis, first.ndim())?;
    for view in views {
        shape::check_concat(op, first.shape(), view.shape(), axis)?;
    }
    Ok(ndarray::concatenate(Axis(axis), views)?)
}

fn inner_mismatch(a: &ArrayD<f32>, b: &ArrayD<f32>) -> Error {
    Error::ShapeMismatch {
        op: "dot",
        expected: a.shape().to_vec(),
        got: b.shape().to_vec(),
    }
}

impl Backend for NdarrayBackend {
    type Tensor = ArrayD<f32>;
    type Mask = ArrayD<bool>;
    type Indices = ArrayD<usize>;

    const NAME: &'static str = "ndarray";

    #[inline]
    fn to_array(tensor: &Self::Tensor) -> ArrayD<f32> {
        tensor.clone()
    }

    #[inline]
    fn mask_to_array(mask: &Self::Mask) -> ArrayD<bool> {
        mask.clone()
    }

    #[inline]
    fn indices_to_array(indices: &Self::Indices) -> ArrayD<usize> {
        indices.clone()
    }

    #[inline]
    fn float_tensor(array: ArrayD<f32>) -> Self::Tensor {
        array
    }

    fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self::Tensor> {
        if data.len() != shape::size(shape) {
            return Err(Error::ShapeMismatch {
                op: "from_vec",
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
    }

    fn mask_from_vec(data: Vec<bool>, shape: &[usize]) -> Result<Self::Mask> {
        if data.len() != shape::size(shape) {
            return Err(Error::ShapeMismatch {
                op: "mask_from_vec",
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
    }

    #[inline]
    fn shape(tensor: &Self::Tensor) -> &[usize] {
        tensor.shape()
    }

    #[inline]
    fn ndim(tensor: &Self::Tensor) -> usize {
        tensor.ndim()
    }

    #[inline]
    fn transpose(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.t().as_standard_layout().into_owned()
    }

    #[inline]
    fn zeros(shape: &[usize]) -> Self::Tensor {
        ArrayD::zeros(IxDyn(shape))
    }

    #[inline]
    fn ones(shape: &[usize]) -> Self::Tensor {
        ArrayD::ones(IxDyn(shape))
    }

    fn diag(mat: &Self::Tensor) -> Result<Self::Tensor> {
        shape::check_rank("diag", mat.shape(), 2)?;
        Ok(mat.diag().to_owned().into_dyn())
    }

    fn diagonal_matrix(vec: &Self::Tensor) -> Result<Self::Tensor> {
        let vec = as_vector("diagonal_matrix", vec)?;
        Ok(Array2::from_diag(&vec).into_dyn())
    }

    #[inline]
    fn identity(n: usize) -> Self::Tensor {
        Array2::eye(n).into_dyn()
    }

    fn fill_diagonal(mat: &mut Self::Tensor, value: f32) -> Result<()> {
        shape::check_rank("fill_diagonal", mat.shape(), 2)?;
        mat.diag_mut().fill(value);
        Ok(())
    }

    #[inline]
    fn sign(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.mapv(kernels::sign)
    }

    #[inline]
    fn clip(
        tensor: &Self::Tensor,
        min: Option<f32>,
        max: Option<f32>,
    ) -> Self::Tensor {
        tensor.mapv(|v| kernels::clip(v, min, max))
    }

    #[inline]
    fn clip_inplace(
        tensor: &mut Self::Tensor,
        min: Option<f32>,
        max: Option<f32>,
    ) {
        tensor.mapv_inplace(|v| kernels::clip(v, min, max));
    }

    #[inline]
    fn tround(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.mapv(f32::round_ties_even)
    }

    #[inline]
    fn flatten(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.iter().copied().collect::<Array1<f32>>().into_dyn()
    }

    fn reshape(tensor: &Self::Tensor, shape: &[usize]) -> Result<Self::Tensor> {
        if tensor.len() != shape::size(shape) {
            return Err(Error::ShapeMismatch {
                op: "reshape",
                expected: tensor.shape().to_vec(),
                got: shape.to_vec(),
            });
        }
        Ok(ArrayD::from_shape_vec(
            IxDyn(shape),
            tensor.iter().copied().collect(),
        )?)
    }

    fn broadcast(
        vec: &Self::Tensor,
        mat: &Self::Tensor,
    ) -> Result<Self::Tensor> {
        let vec = as_vector("broadcast", vec)?;
        let rows = *mat.shape().first().ok_or(Error::InvalidRank {
            op: "broadcast",
            ndim: 0,
        })?;
        let expanded = vec
            .broadcast((rows, vec.len()))
            .ok_or_else(|| Error::Broadcast {
                lhs: vec![vec.len()],
                rhs: mat.shape().to_vec(),
            })?;
        Ok(expanded.to_owned().into_dyn())
    }

    fn mix_inplace(
        w: f32,
        x: &mut Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()> {
        let y = broadcast_into(x, y)?;
        Zip::from(x)
            .and(&y)
            .par_for_each(|x, &y| *x = kernels::mix(w, *x, y));
        Ok(())
    }

    fn square_mix_inplace(
        w: f32,
        x: &mut Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()> {
        let y = broadcast_into(x, y)?;
        Zip::from(x)
            .and(&y)
            .par_for_each(|x, &y| *x = kernels::square_mix(w, *x, y));
        Ok(())
    }

    fn sqrt_div(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        zip_with(x, y, |a, b| a / (EPSILON + b).sqrt())
    }

    fn normalize(x: &Self::Tensor) -> Self::Tensor {
        let total: f32 = x.iter().map(|&v| EPSILON + v).sum();
        x.mapv(|v| v / total)
    }

    fn norm(x: &Self::Tensor) -> f32 {
        x.iter().map(|&v| v * v).sum::<f32>().sqrt()
    }

    fn tmax(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("tmax", x.shape(), axis)?;
        reduce(x, axis, kernels::max)
    }

    fn tmin(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("tmin", x.shape(), axis)?;
        reduce(x, axis, kernels::min)
    }

    fn mean(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("mean", x.shape(), axis)?;
        reduce(x, axis, kernels::mean)
    }

    fn var(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("var", x.shape(), axis)?;
        reduce(x, axis, kernels::var)
    }

    fn std(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("std", x.shape(), axis)?;
        reduce(x, axis, kernels::std)
    }

    fn tsum(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        reduce(x, axis, kernels::sum)
    }

    fn tprod(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        reduce(x, axis, kernels::prod)
    }

    fn tany(x: &Self::Mask, axis: Option<usize>) -> Result<Self::Mask> {
        reduce(x, axis, kernels::any)
    }

    fn tall(x: &Self::Mask, axis: Option<usize>) -> Result<Self::Mask> {
        reduce(x, axis, kernels::all)
    }

    fn equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        zip_with(x, y, |a, b| a == b)
    }

    fn not_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        zip_with(x, y, |a, b| a != b)
    }

    fn greater(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        zip_with(x, y, |a, b| a > b)
    }

    fn greater_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        zip_with(x, y, |a, b| a >= b)
    }

    fn lesser(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        zip_with(x, y, |a, b| a < b)
    }

    fn lesser_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        zip_with(x, y, |a, b| a <= b)
    }

    fn allclose(x: &Self::Tensor, y: &Self::Tensor) -> Result<bool> {
        Ok(zip_with(x, y, kernels::close)?.iter().all(|&b| b))
    }

    fn maximum(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        zip_with(x, y, kernels::maximum)
    }

    fn minimum(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        zip_with(x, y, kernels::minimum)
    }

    fn argmax(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Indices> {
        non_empty("argmax", x.shape(), axis)?;
        let reduced = reduce(x, axis, kernels::argmax)?;
        Ok(match axis {
            Some(axis) => reduced.index_axis_move(Axis(axis), 0),
            None => reduced.into_shape_with_order(IxDyn(&[]))?,
        })
    }

    fn argmin(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Indices> {
        non_empty("argmin", x.shape(), axis)?;
        let reduced = reduce(x, axis, kernels::argmin)?;
        Ok(match axis {
            Some(axis) => reduced.index_axis_move(Axis(axis), 0),
            None => reduced.into_shape_with_order(IxDyn(&[]))?,
        })
    }

    fn dot(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor> {
        let inner = match (a.shape(), b.shape()) {
            (&[k], &[l]) | (&[_, k], &[l]) | (&[k], &[l, _]) => k == l,
            (&[_, k], &[l, _]) => k == l,
            ([_] | [_, _], _) => {
                return Err(Error::InvalidRank {
                    op: "dot",
                    ndim: b.ndim(),
                });
            }
            _ => {
                return Err(Error::InvalidRank {
                    op: "dot",
                    ndim: a.ndim(),
                });
            }
        };
        if !inner {
            return Err(inner_mismatch(a, b));
        }

        Ok(match (a.ndim(), b.ndim()) {
            (1, 1) => ArrayD::from_elem(IxDyn(&[]), view1(a)?.dot(&view1(b)?)),
            (2, 1) => view2(a)?.dot(&view1(b)?).into_dyn(),
            (1, 2) => view1(a)?.dot(&view2(b)?).into_dyn(),
            _ => view2(a)?.dot(&view2(b)?).into_dyn(),
        })
    }

    fn outer(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        let x = as_vector("outer", x)?;
        let y = as_vector("outer", y)?;
        let outer =
            Array2::from_shape_fn((x.len(), y.len()), |(i, j)| x[i] * y[j]);
        Ok(outer.into_dyn())
    }

    fn affine(
        a: &Self::Tensor,
        b: &Self::Tensor,
        w: &Self::Tensor,
    ) -> Result<Self::Tensor> {
        zip_with(a, &Self::dot(w, b)?, |a, wb| a + wb)
    }

    fn inv(mat: &Self::Tensor) -> Result<Self::Tensor> {
        shape::check_rank("inv", mat.shape(), 2)?;
        let n = mat.shape()[0];
        if mat.shape()[1] != n {
            return Err(Error::ShapeMismatch {
                op: "inv",
                expected: vec![n, n],
                got: mat.shape().to_vec(),
            });
        }
        let data: Vec<f32> = mat.iter().copied().collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&[n, n]), linalg::invert(&data, n)?)?)
    }

    fn batch_dot(
        vis: &Self::Tensor,
        w: &Self::Tensor,
        hid: &Self::Tensor,
        axis: usize,
    ) -> Result<Self::Tensor> {
        let product = zip_with(&Self::dot(vis, w)?, hid, |vw, h| vw * h)?;
        shape::check_axis(axis, product.ndim())?;
        Ok(product.sum_axis(Axis(axis)))
    }

    fn repeat(
        tensor: &Self::Tensor,
        n: usize,
        axis: usize,
    ) -> Result<Self::Tensor> {
        shape::check_axis(axis, tensor.ndim())?;
        let mut out = tensor.shape().to_vec();
        out[axis] *= n;
        Ok(ArrayD::from_shape_fn(IxDyn(&out), |mut index| {
            index[axis] /= n;
            tensor[&index]
        }))
    }

    fn stack(tensors: &[&Self::Tensor], axis: usize) -> Result<Self::Tensor> {
        let first = tensors.first().ok_or_else(no_tensors)?;
        shape::check_axis(axis, first.ndim() + 1)?;
        if let Some(bad) = tensors.iter().find(|t| t.shape() != first.shape()) {
            return Err(Error::ShapeMismatch {
                op: "stack",
                expected: first.shape().to_vec(),
                got: bad.shape().to_vec(),
            });
        }
        let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
        Ok(ndarray::stack(Axis(axis), &views)?)
    }

    fn hstack(tensors: &[&Self::Tensor]) -> Result<Self::Tensor> {
        let first = tensors.first().ok_or_else(no_tensors)?;
        let axis = match first.ndim() {
            0 => return Err(Error::InvalidRank { op: "hstack", ndim: 0 }),
            1 => 0,
            _ => 1,
        };
        let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
        concatenate("hstack", &views, axis)
    }

    fn vstack(tensors: &[&Self::Tensor]) -> Result<Self::Tensor> {
        let views = tensors
            .iter()
            .map(|t| match t.ndim() {
                0 => Err(Error::InvalidRank { op: "vstack", ndim: 0 }),
                1 => Ok(t.view().insert_axis(Axis(0))),
                _ => Ok(t.view()),
            })
            .collect::<Result<Vec<_>>>()?;
        concatenate("vstack", &views, 0)
    }
}
