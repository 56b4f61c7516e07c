//! Dense tensor backend.
//!
//! Tensors are plain row-major buffers ([`DenseTensor`]) and every kernel is
//! written out here, spread over the [`rayon`] pool once the work is large
//! enough. This backend has no dependency on a native numerics library, so
//! it is the reference the [`ndarray`](super::ndarray) backend is checked
//! against.

mod tensor;

use ndarray::ArrayD;
use rayon::prelude::*;

pub use self::tensor::DenseTensor;
use self::tensor::PAR_THRESHOLD;
use crate::{
    backend::{Backend, EPSILON},
    error::{Error, Result},
    kernels, linalg, shape,
};

/// Marker type for the dense backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseBackend;

/// Row-major `m x k` by `k x n` product.
fn matmul(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut out = vec![0.0; m * n];
    if n == 0 {
        return out;
    }
    let row = |(i, out_row): (usize, &mut [f32])| {
        for p in 0..k {
            let a_ip = a[i * k + p];
            for (o, &b_pj) in out_row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *o += a_ip * b_pj;
            }
        }
    };
    if m * n * k >= PAR_THRESHOLD {
        out.par_chunks_mut(n).enumerate().for_each(row);
    } else {
        out.chunks_mut(n).enumerate().for_each(row);
    }
    out
}

fn check_vector(op: &'static str, x: &DenseTensor<f32>) -> Result<()> {
    shape::check_rank(op, x.shape(), 1)
}

fn check_matrix(
    op: &'static str,
    x: &DenseTensor<f32>,
) -> Result<(usize, usize)> {
    shape::check_rank(op, x.shape(), 2)?;
    Ok((x.shape()[0], x.shape()[1]))
}

fn non_empty(
    op: &'static str,
    x: &DenseTensor<f32>,
    axis: Option<usize>,
) -> Result<()> {
    let len = match axis {
        Some(axis) => x.shape().get(axis).copied().unwrap_or(1),
        None => x.len(),
    };
    if len == 0 {
        Err(Error::EmptyReduction { op })
    } else {
        Ok(())
    }
}

fn no_tensors() -> Error {
    Error::InvalidArgument {
        arg: "tensors",
        reason: "need at least one tensor to stack".to_owned(),
    }
}

/// Drops the kept axis of an index reduction.
fn squeeze_indices(
    reduced: DenseTensor<usize>,
    axis: Option<usize>,
) -> Result<DenseTensor<usize>> {
    let shape = match axis {
        Some(axis) => shape::remove_axis(reduced.shape(), axis),
        None => Vec::new(),
    };
    reduced.with_shape(shape)
}

/// Joins `tensors` along an existing `axis`.
fn concatenate(
    op: &'static str,
    tensors: &[&DenseTensor<f32>],
    axis: usize,
) -> Result<DenseTensor<f32>> {
    let first = tensors.first().ok_or_else(no_tensors)?;
    shape::check_axis(axis, first.ndim())?;
    for tensor in tensors {
        shape::check_concat(op, first.shape(), tensor.shape(), axis)?;
    }

    let outer: usize = first.shape()[..axis].iter().product();
    let inner: usize = first.shape()[axis + 1..].iter().product();
    let mut out_shape = first.shape().to_vec();
    out_shape[axis] = tensors.iter().map(|t| t.shape()[axis]).sum();
    let mut data = Vec::with_capacity(shape::size(&out_shape));
    for o in 0..outer {
        for tensor in tensors {
            let chunk = tensor.shape()[axis] * inner;
            let block = &tensor.as_slice()[o * chunk..(o + 1) * chunk];
            data.extend_from_slice(block);
        }
    }
    Ok(DenseTensor::from_parts(data, out_shape))
}

impl Backend for DenseBackend {
    type Tensor = DenseTensor<f32>;
    type Mask = DenseTensor<bool>;
    type Indices = DenseTensor<usize>;

    const NAME: &'static str = "dense";

    #[inline]
    fn to_array(tensor: &Self::Tensor) -> ArrayD<f32> {
        tensor.to_array()
    }

    #[inline]
    fn mask_to_array(mask: &Self::Mask) -> ArrayD<bool> {
        mask.to_array()
    }

    #[inline]
    fn indices_to_array(indices: &Self::Indices) -> ArrayD<usize> {
        indices.to_array()
    }

    #[inline]
    fn float_tensor(array: ArrayD<f32>) -> Self::Tensor {
        DenseTensor::from(array)
    }

    #[inline]
    fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self::Tensor> {
        DenseTensor::new(data, shape)
    }

    #[inline]
    fn mask_from_vec(data: Vec<bool>, shape: &[usize]) -> Result<Self::Mask> {
        DenseTensor::new(data, shape)
    }

    #[inline]
    fn shape(tensor: &Self::Tensor) -> &[usize] {
        tensor.shape()
    }

    #[inline]
    fn ndim(tensor: &Self::Tensor) -> usize {
        tensor.ndim()
    }

    fn transpose(tensor: &Self::Tensor) -> Self::Tensor {
        let axes: Vec<usize> = (0..tensor.ndim()).rev().collect();
        tensor.permute(&axes)
    }

    #[inline]
    fn zeros(shape: &[usize]) -> Self::Tensor {
        DenseTensor::full(shape, 0.0)
    }

    #[inline]
    fn ones(shape: &[usize]) -> Self::Tensor {
        DenseTensor::full(shape, 1.0)
    }

    fn diag(mat: &Self::Tensor) -> Result<Self::Tensor> {
        let (rows, cols) = check_matrix("diag", mat)?;
        let data = (0..rows.min(cols))
            .map(|i| mat.as_slice()[i * cols + i])
            .collect::<Vec<_>>();
        let len = data.len();
        Ok(DenseTensor::from_parts(data, vec![len]))
    }

    fn diagonal_matrix(vec: &Self::Tensor) -> Result<Self::Tensor> {
        check_vector("diagonal_matrix", vec)?;
        let n = vec.len();
        let mut out = Self::zeros(&[n, n]);
        for (i, &v) in vec.as_slice().iter().enumerate() {
            out.as_mut_slice()[i * n + i] = v;
        }
        Ok(out)
    }

    fn identity(n: usize) -> Self::Tensor {
        let mut out = Self::zeros(&[n, n]);
        for i in 0..n {
            out.as_mut_slice()[i * n + i] = 1.0;
        }
        out
    }

    fn fill_diagonal(mat: &mut Self::Tensor, value: f32) -> Result<()> {
        let (rows, cols) = check_matrix("fill_diagonal", mat)?;
        let data = mat.as_mut_slice();
        for i in 0..rows.min(cols) {
            data[i * cols + i] = value;
        }
        Ok(())
    }

    #[inline]
    fn sign(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.map(kernels::sign)
    }

    #[inline]
    fn clip(
        tensor: &Self::Tensor,
        min: Option<f32>,
        max: Option<f32>,
    ) -> Self::Tensor {
        tensor.map(|v| kernels::clip(v, min, max))
    }

    #[inline]
    fn clip_inplace(
        tensor: &mut Self::Tensor,
        min: Option<f32>,
        max: Option<f32>,
    ) {
        tensor.map_inplace(|v| kernels::clip(v, min, max));
    }

    #[inline]
    fn tround(tensor: &Self::Tensor) -> Self::Tensor {
        tensor.map(f32::round_ties_even)
    }

    fn flatten(tensor: &Self::Tensor) -> Self::Tensor {
        DenseTensor::from_parts(tensor.as_slice().to_vec(), vec![tensor.len()])
    }

    fn reshape(tensor: &Self::Tensor, shape: &[usize]) -> Result<Self::Tensor> {
        tensor.clone().with_shape(shape.to_vec())
    }

    fn broadcast(
        vec: &Self::Tensor,
        mat: &Self::Tensor,
    ) -> Result<Self::Tensor> {
        check_vector("broadcast", vec)?;
        let rows = *mat.shape().first().ok_or(Error::InvalidRank {
            op: "broadcast",
            ndim: 0,
        })?;
        vec.broadcast_to(&[rows, vec.len()])
    }

    fn mix_inplace(
        w: f32,
        x: &mut Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()> {
        let y = y.broadcast_to(x.shape())?;
        let (xs, ys) = (x.as_mut_slice(), y.as_slice());
        if xs.len() >= PAR_THRESHOLD {
            xs.par_iter_mut()
                .zip(ys.par_iter())
                .for_each(|(x, &y)| *x = kernels::mix(w, *x, y));
        } else {
            for (x, &y) in xs.iter_mut().zip(ys) {
                *x = kernels::mix(w, *x, y);
            }
        }
        Ok(())
    }

    fn square_mix_inplace(
        w: f32,
        x: &mut Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()> {
        let y = y.broadcast_to(x.shape())?;
        let (xs, ys) = (x.as_mut_slice(), y.as_slice());
        if xs.len() >= PAR_THRESHOLD {
            xs.par_iter_mut()
                .zip(ys.par_iter())
                .for_each(|(x, &y)| *x = kernels::square_mix(w, *x, y));
        } else {
            for (x, &y) in xs.iter_mut().zip(ys) {
                *x = kernels::square_mix(w, *x, y);
            }
        }
        Ok(())
    }

    fn sqrt_div(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        x.zip_with(y, |a, b| a / (EPSILON + b).sqrt())
    }

    fn normalize(x: &Self::Tensor) -> Self::Tensor {
        let total: f32 = x.as_slice().iter().map(|&v| EPSILON + v).sum();
        x.map(|v| v / total)
    }

    fn norm(x: &Self::Tensor) -> f32 {
        x.as_slice().iter().map(|&v| v * v).sum::<f32>().sqrt()
    }

    fn tmax(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("tmax", x, axis)?;
        x.reduce(axis, kernels::max)
    }

    fn tmin(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("tmin", x, axis)?;
        x.reduce(axis, kernels::min)
    }

    fn mean(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("mean", x, axis)?;
        x.reduce(axis, kernels::mean)
    }

    fn var(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("var", x, axis)?;
        x.reduce(axis, kernels::var)
    }

    fn std(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        non_empty("std", x, axis)?;
        x.reduce(axis, kernels::std)
    }

    fn tsum(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        x.reduce(axis, kernels::sum)
    }

    fn tprod(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Tensor> {
        x.reduce(axis, kernels::prod)
    }

    fn tany(x: &Self::Mask, axis: Option<usize>) -> Result<Self::Mask> {
        x.reduce(axis, kernels::any)
    }

    fn tall(x: &Self::Mask, axis: Option<usize>) -> Result<Self::Mask> {
        x.reduce(axis, kernels::all)
    }

    fn equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        x.zip_with(y, |a, b| a == b)
    }

    fn not_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        x.zip_with(y, |a, b| a != b)
    }

    fn greater(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        x.zip_with(y, |a, b| a > b)
    }

    fn greater_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        x.zip_with(y, |a, b| a >= b)
    }

    fn lesser(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        x.zip_with(y, |a, b| a < b)
    }

    fn lesser_equal(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Mask> {
        x.zip_with(y, |a, b| a <= b)
    }

    fn allclose(x: &Self::Tensor, y: &Self::Tensor) -> Result<bool> {
        Ok(x.zip_with(y, kernels::close)?.as_slice().iter().all(|&b| b))
    }

    fn maximum(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        x.zip_with(y, kernels::maximum)
    }

    fn minimum(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        x.zip_with(y, kernels::minimum)
    }

    fn argmax(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Indices> {
        non_empty("argmax", x, axis)?;
        squeeze_indices(x.reduce(axis, kernels::argmax)?, axis)
    }

    fn argmin(x: &Self::Tensor, axis: Option<usize>) -> Result<Self::Indices> {
        non_empty("argmin", x, axis)?;
        squeeze_indices(x.reduce(axis, kernels::argmin)?, axis)
    }

    fn dot(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor> {
        let mismatch = || Error::ShapeMismatch {
            op: "dot",
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        };
        match (a.shape(), b.shape()) {
            (&[k], &[l]) => {
                if k != l {
                    return Err(mismatch());
                }
                let value = a
                    .as_slice()
                    .iter()
                    .zip(b.as_slice())
                    .map(|(&x, &y)| x * y)
                    .sum();
                Ok(DenseTensor::from_parts(vec![value], Vec::new()))
            }
            (&[m, k], &[l, n]) => {
                if k != l {
                    return Err(mismatch());
                }
                let data = matmul(a.as_slice(), b.as_slice(), m, k, n);
                Ok(DenseTensor::from_parts(data, vec![m, n]))
            }
            (&[m, k], &[l]) => {
                if k != l {
                    return Err(mismatch());
                }
                let data = matmul(a.as_slice(), b.as_slice(), m, k, 1);
                Ok(DenseTensor::from_parts(data, vec![m]))
            }
            (&[k], &[l, n]) => {
                if k != l {
                    return Err(mismatch());
                }
                let data = matmul(a.as_slice(), b.as_slice(), 1, k, n);
                Ok(DenseTensor::from_parts(data, vec![n]))
            }
            ([_] | [_, _], _) => Err(Error::InvalidRank {
                op: "dot",
                ndim: b.ndim(),
            }),
            _ => Err(Error::InvalidRank {
                op: "dot",
                ndim: a.ndim(),
            }),
        }
    }

    fn outer(x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor> {
        check_vector("outer", x)?;
        check_vector("outer", y)?;
        let data = matmul(x.as_slice(), y.as_slice(), x.len(), 1, y.len());
        Ok(DenseTensor::from_parts(data, vec![x.len(), y.len()]))
    }

    fn affine(
        a: &Self::Tensor,
        b: &Self::Tensor,
        w: &Self::Tensor,
    ) -> Result<Self::Tensor> {
        a.zip_with(&Self::dot(w, b)?, |a, wb| a + wb)
    }

    fn inv(mat: &Self::Tensor) -> Result<Self::Tensor> {
        let (n, cols) = check_matrix("inv", mat)?;
        if cols != n {
            return Err(Error::ShapeMismatch {
                op: "inv",
                expected: vec![n, n],
                got: mat.shape().to_vec(),
            });
        }
        let data = linalg::invert(mat.as_slice(), n)?;
        Ok(DenseTensor::from_parts(data, vec![n, n]))
    }

    fn batch_dot(
        vis: &Self::Tensor,
        w: &Self::Tensor,
        hid: &Self::Tensor,
        axis: usize,
    ) -> Result<Self::Tensor> {
        let product = Self::dot(vis, w)?.zip_with(hid, |vw, h| vw * h)?;
        let summed = product.reduce(Some(axis), kernels::sum)?;
        summed.with_shape(shape::remove_axis(product.shape(), axis))
    }

    fn repeat(
        tensor: &Self::Tensor,
        n: usize,
        axis: usize,
    ) -> Result<Self::Tensor> {
        shape::check_axis(axis, tensor.ndim())?;
        let len = tensor.shape()[axis];
        let outer: usize = tensor.shape()[..axis].iter().product();
        let inner: usize = tensor.shape()[axis + 1..].iter().product();
        let mut out_shape = tensor.shape().to_vec();
        out_shape[axis] *= n;

        let mut data = Vec::with_capacity(tensor.len() * n);
        for o in 0..outer {
            for k in 0..len {
                let start = (o * len + k) * inner;
                let chunk = &tensor.as_slice()[start..start + inner];
                for _ in 0..n {
                    data.extend_from_slice(chunk);
                }
            }
        }
        Ok(DenseTensor::from_parts(data, out_shape))
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

        let outer: usize = first.shape()[..axis].iter().product();
        let inner: usize = first.shape()[axis..].iter().product();
        let mut out_shape = first.shape().to_vec();
        out_shape.insert(axis, tensors.len());
        let mut data = Vec::with_capacity(shape::size(&out_shape));
        for o in 0..outer {
            for tensor in tensors {
                let block = &tensor.as_slice()[o * inner..(o + 1) * inner];
                data.extend_from_slice(block);
            }
        }
        Ok(DenseTensor::from_parts(data, out_shape))
    }

    fn hstack(tensors: &[&Self::Tensor]) -> Result<Self::Tensor> {
        let first = tensors.first().ok_or_else(no_tensors)?;
        match first.ndim() {
            0 => Err(Error::InvalidRank { op: "hstack", ndim: 0 }),
            1 => concatenate("hstack", tensors, 0),
            _ => concatenate("hstack", tensors, 1),
        }
    }

    fn vstack(tensors: &[&Self::Tensor]) -> Result<Self::Tensor> {
        let rows = tensors
            .iter()
            .map(|t| match t.ndim() {
                0 => Err(Error::InvalidRank { op: "vstack", ndim: 0 }),
                1 => (*t).clone().with_shape(vec![1, t.len()]),
                _ => Ok((*t).clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&DenseTensor<f32>> = rows.iter().collect();
        concatenate("vstack", &refs, 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        backend::{
            Backend,
            dense::{DenseBackend, DenseTensor},
        },
        error::Error,
    };

    fn tensor(data: &[f32], shape: &[usize]) -> DenseTensor<f32> {
        DenseBackend::from_vec(data.to_vec(), shape).unwrap()
    }

    #[test]
    fn dense_zeros_has_correct_shape_and_values() {
        let shape = &[2, 3];
        let t = DenseBackend::zeros(shape);

        assert_eq!(DenseBackend::shape(&t), shape);
        assert!(t.as_slice().iter().all(|&value| value == 0.0));
    }

    #[test]
    fn dense_ones_like_copies_shape() {
        let t = DenseBackend::ones_like(&DenseBackend::zeros(&[3, 1]));

        assert_eq!(t.shape(), &[3, 1]);
        assert!(t.as_slice().iter().all(|&value| value == 1.0));
    }

    #[test]
    fn dense_transpose_of_vector_is_identity() {
        let v = tensor(&[1.0, 2.0, 3.0], &[3]);

        assert_eq!(DenseBackend::transpose(&v), v);
    }

    #[test]
    fn dense_diag_of_wide_matrix() {
        let m = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);

        assert_eq!(DenseBackend::diag(&m).unwrap().as_slice(), &[1.0, 5.0]);
        assert!(matches!(
            DenseBackend::diag(&tensor(&[1.0], &[1])),
            Err(Error::InvalidRank { op: "diag", ndim: 1 })
        ));
    }

    #[test]
    fn dense_diagonal_matrix_and_fill_diagonal() {
        let v = tensor(&[2.0, 3.0], &[2]);
        let mut d = DenseBackend::diagonal_matrix(&v).unwrap();

        assert_eq!(d.as_slice(), &[2.0, 0.0, 0.0, 3.0]);

        DenseBackend::fill_diagonal(&mut d, -1.0).unwrap();

        assert_eq!(d.as_slice(), &[-1.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn dense_clip_both_bounds() {
        let x = tensor(&[-2.0, 0.0, 2.0], &[3]);

        let clipped = DenseBackend::clip(&x, Some(-1.0), Some(1.0));

        assert_eq!(clipped.as_slice(), &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn dense_reshape_and_flatten() {
        let x = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);

        let reshaped = DenseBackend::reshape(&x, &[3, 2]).unwrap();

        assert_eq!(reshaped.shape(), &[3, 2]);
        assert_eq!(DenseBackend::flatten(&x).shape(), &[6]);
        assert!(matches!(
            DenseBackend::reshape(&x, &[4]),
            Err(Error::ShapeMismatch { op: "reshape", .. })
        ));
    }

    #[test]
    fn dense_mix_inplace_broadcasts_bias() {
        let mut x = tensor(&[1.0, 1.0, 1.0, 1.0], &[2, 2]);
        let y = tensor(&[3.0, 5.0], &[2]);

        DenseBackend::mix_inplace(0.5, &mut x, &y).unwrap();

        assert_eq!(x.as_slice(), &[2.0, 3.0, 2.0, 3.0]);
    }

    #[test]
    fn dense_square_mix_inplace_large_runs_in_parallel() {
        let mut x = DenseBackend::zeros(&[100, 100]);
        let y = DenseBackend::ones(&[100, 100]);

        DenseBackend::square_mix_inplace(0.9, &mut x, &y).unwrap();

        assert!(x.as_slice().iter().all(|&v| (v - 0.1).abs() < 1e-6));
    }

    #[test]
    fn dense_reductions_keep_dims() {
        let x = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);

        let col_sums = DenseBackend::tsum(&x, Some(0)).unwrap();
        let row_min = DenseBackend::tmin(&x, Some(1)).unwrap();
        let total = DenseBackend::tsum(&x, None).unwrap();

        assert_eq!(col_sums.shape(), &[1, 3]);
        assert_eq!(col_sums.as_slice(), &[5.0, 7.0, 9.0]);
        assert_eq!(row_min.as_slice(), &[1.0, 4.0]);
        assert_eq!(total.shape(), &[1, 1]);
        assert_eq!(total.as_slice(), &[21.0]);
    }

    #[test]
    fn dense_var_of_constant_is_zero() {
        let x = DenseBackend::ones(&[3, 4]);

        let var = DenseBackend::var(&x, Some(1)).unwrap();

        assert_eq!(var.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn dense_empty_reduction_errors() {
        let x = DenseBackend::zeros(&[0, 3]);

        let prod = DenseBackend::tprod(&x, Some(0)).unwrap();

        assert!(matches!(
            DenseBackend::tmax(&x, Some(0)),
            Err(Error::EmptyReduction { op: "tmax" })
        ));
        assert_eq!(prod.as_slice(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn dense_tall_over_rows() {
        let mask =
            DenseBackend::mask_from_vec(vec![true, true, false, true], &[2, 2])
                .unwrap();

        let all = DenseBackend::tall(&mask, Some(0)).unwrap();

        assert_eq!(all.shape(), &[1, 2]);
        assert_eq!(all.as_slice(), &[false, true]);
    }

    #[test]
    fn dense_comparisons_reject_incompatible_shapes() {
        let x = DenseBackend::zeros(&[2, 3]);
        let y = DenseBackend::zeros(&[2]);

        assert!(matches!(
            DenseBackend::equal(&x, &y),
            Err(Error::Broadcast { .. })
        ));
    }

    #[test]
    fn dense_not_equal_and_greater_equal() {
        let x = tensor(&[1.0, 2.0, 3.0], &[3]);
        let y = tensor(&[2.0], &[1]);

        let ne = DenseBackend::not_equal(&x, &y).unwrap();
        let ge = DenseBackend::greater_equal(&x, &y).unwrap();
        let lt = DenseBackend::lesser(&x, &y).unwrap();

        assert_eq!(ne.as_slice(), &[true, false, true]);
        assert_eq!(ge.as_slice(), &[false, true, true]);
        assert_eq!(lt.as_slice(), &[true, false, false]);
    }

    #[test]
    fn dense_maximum_and_minimum() {
        let x = tensor(&[1.0, 5.0], &[2]);
        let y = tensor(&[3.0, 2.0], &[2]);

        let max = DenseBackend::maximum(&x, &y).unwrap();
        let min = DenseBackend::minimum(&x, &y).unwrap();

        assert_eq!(max.as_slice(), &[3.0, 5.0]);
        assert_eq!(min.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn dense_argmin_along_columns() {
        let x = tensor(&[4.0, 1.0, 0.0, 3.0, 2.0, 5.0], &[3, 2]);

        let idx = DenseBackend::argmin(&x, Some(0)).unwrap();
        let flat = DenseBackend::argmax(&x, None).unwrap();

        assert_eq!(idx.shape(), &[2]);
        assert_eq!(idx.as_slice(), &[1, 0]);
        assert_eq!(flat.ndim(), 0);
        assert_eq!(flat.as_slice(), &[5]);
    }

    #[test]
    fn dense_dot_matrix_matrix() {
        let a = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = tensor(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[3, 2]);

        let c = DenseBackend::dot(&a, &b).unwrap();

        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.as_slice(), &[4.0, 5.0, 10.0, 11.0]);
    }

    #[test]
    fn dense_dot_vector_forms() {
        let m = tensor(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let v = tensor(&[1.0, -1.0], &[2]);

        let mv = DenseBackend::dot(&m, &v).unwrap();
        let vm = DenseBackend::dot(&v, &m).unwrap();

        assert_eq!(mv.as_slice(), &[-1.0, -1.0]);
        assert_eq!(vm.as_slice(), &[-2.0, -2.0]);
        assert_eq!(DenseBackend::dot(&v, &v).unwrap().as_slice(), &[2.0]);
        assert!(matches!(
            DenseBackend::dot(&m, &tensor(&[1.0; 3], &[3])),
            Err(Error::ShapeMismatch { op: "dot", .. })
        ));
        assert!(matches!(
            DenseBackend::dot(&DenseBackend::zeros(&[1, 1, 1]), &v),
            Err(Error::InvalidRank { op: "dot", ndim: 3 })
        ));
    }

    #[test]
    fn dense_large_matmul_matches_identity() {
        let n = 64;
        let a: Vec<f32> = (0..n * n).map(|v| (v % 7) as f32).collect();
        let a = tensor(&a, &[n, n]);

        let c = DenseBackend::dot(&a, &DenseBackend::identity(n)).unwrap();

        assert_eq!(c, a);
    }

    #[test]
    fn dense_outer_product() {
        let x = tensor(&[1.0, 2.0, 3.0], &[3]);
        let y = tensor(&[1.0, 10.0], &[2]);

        let o = DenseBackend::outer(&x, &y).unwrap();

        assert_eq!(o.shape(), &[3, 2]);
        assert_eq!(o.as_slice(), &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
    }

    #[test]
    fn dense_affine_with_matrix_input() {
        let a = tensor(&[1.0, 2.0], &[2]);
        let w = DenseBackend::identity(2);
        let b = tensor(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);

        let out = DenseBackend::affine(&a, &b, &w).unwrap();

        assert_eq!(out.as_slice(), &[2.0, 4.0, 4.0, 6.0]);
    }

    #[test]
    fn dense_inv_round_trips_to_identity() {
        let m = tensor(&[4.0, 7.0, 2.0, 6.0], &[2, 2]);

        let inv = DenseBackend::inv(&m).unwrap();
        let eye = DenseBackend::dot(&m, &inv).unwrap();

        let expected = [1.0, 0.0, 0.0, 1.0];
        assert!(
            eye.as_slice()
                .iter()
                .zip(expected)
                .all(|(a, b)| (a - b).abs() < 1e-5)
        );
        assert!(matches!(
            DenseBackend::inv(&DenseBackend::zeros(&[2, 3])),
            Err(Error::ShapeMismatch { op: "inv", .. })
        ));
    }

    #[test]
    fn dense_batch_dot_removes_axis() {
        let vis = tensor(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let w = tensor(&[1.0, 0.0, 0.0, 2.0], &[2, 2]);
        let hid = tensor(&[1.0, 1.0, 0.0, 1.0], &[2, 2]);

        let out = DenseBackend::batch_dot(&vis, &w, &hid, 1).unwrap();

        assert_eq!(out.shape(), &[2]);
        assert_eq!(out.as_slice(), &[5.0, 8.0]);
    }

    #[test]
    fn dense_repeat_middle_axis() {
        let x = tensor(&[1.0, 2.0, 3.0, 4.0], &[1, 2, 2]);

        let r = DenseBackend::repeat(&x, 3, 1).unwrap();

        assert_eq!(r.shape(), &[1, 6, 2]);
        assert_eq!(
            r.as_slice(),
            &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 3.0, 4.0]
        );
    }

    #[test]
    fn dense_stack_rejects_mismatched_shapes() {
        let a = DenseBackend::zeros(&[2]);
        let b = DenseBackend::zeros(&[3]);

        assert!(matches!(
            DenseBackend::stack(&[&a, &b], 0),
            Err(Error::ShapeMismatch { op: "stack", .. })
        ));
        assert!(matches!(
            DenseBackend::stack(&[&a], 2),
            Err(Error::InvalidAxis { .. })
        ));
    }

    #[test]
    fn dense_inv_of_small_entries() {
        let m = tensor(&[1e-13, 0.0, 0.0, 1e-13], &[2, 2]);

        let inv = DenseBackend::inv(&m).unwrap();

        assert!(inv.as_slice().iter().all(|v| v.is_finite()));
        assert!((inv.as_slice()[0] - 1e13).abs() <= 1e7);
    }

    #[test]
    fn dense_hstack_rejects_mismatched_rows() {
        let a = DenseBackend::zeros(&[2, 1]);
        let b = DenseBackend::zeros(&[3, 1]);

        assert!(matches!(
            DenseBackend::hstack(&[&a, &b]),
            Err(Error::ShapeMismatch { op: "hstack", .. })
        ));
    }

    #[test]
    fn dense_hstack_matrices() {
        let a = tensor(&[1.0, 2.0], &[2, 1]);
        let b = tensor(&[3.0, 4.0, 5.0, 6.0], &[2, 2]);

        let h = DenseBackend::hstack(&[&a, &b]).unwrap();

        assert_eq!(h.shape(), &[2, 3]);
        assert_eq!(h.as_slice(), &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn dense_vstack_mixes_vectors_and_matrices() {
        let a = tensor(&[1.0, 2.0], &[2]);
        let b = tensor(&[3.0, 4.0, 5.0, 6.0], &[2, 2]);

        let v = DenseBackend::vstack(&[&a, &b]).unwrap();

        assert_eq!(v.shape(), &[3, 2]);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn dense_trange_values() {
        let r = DenseBackend::trange(1.0, 2.0, 0.25).unwrap();

        assert_eq!(r.as_slice(), &[1.0, 1.25, 1.5, 1.75]);
    }

    #[test]
    fn dense_broadcast_needs_matrix_rows() {
        let v = tensor(&[1.0, 2.0, 3.0], &[3]);

        let m = DenseBackend::zeros(&[2, 7]);
        let b = DenseBackend::broadcast(&v, &m).unwrap();

        assert_eq!(b.shape(), &[2, 3]);
        let scalar = DenseBackend::zeros(&[]);
        assert!(DenseBackend::broadcast(&v, &scalar).is_err());
    }

    #[test]
    fn dense_allclose_broadcasts_and_matches_infinities() {
        let x = tensor(&[1.0, f32::INFINITY, 1.0, f32::INFINITY], &[2, 2]);
        let y = tensor(&[1.000_001, f32::INFINITY], &[2]);
        let ones = tensor(&[1.0, 1.0], &[2]);

        assert!(DenseBackend::allclose(&x, &y).unwrap());
        assert!(!DenseBackend::allclose(&y, &ones).unwrap());
        assert!(DenseBackend::allclose(&x, &tensor(&[1.0; 3], &[3])).is_err());
    }

    #[test]
    fn dense_norm_and_normalize() {
        let x = tensor(&[3.0, 4.0], &[2]);

        assert_eq!(DenseBackend::norm(&x), 5.0);
        let n = DenseBackend::normalize(&x);
        assert!((n.as_slice()[0] - 3.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn dense_dtype_and_scalar() {
        let x = DenseBackend::zeros(&[1]);

        assert_eq!(DenseBackend::dtype(&x), crate::backend::DType::F32);
        assert_eq!(DenseBackend::float_scalar(3_u8).unwrap(), 3.0);
        assert_eq!(DenseBackend::float_scalar(0.5_f64).unwrap(), 0.5);
    }
}
