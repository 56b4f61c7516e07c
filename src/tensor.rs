//! # The tensor module
//!
//! This module exposes the tensor type of the backend picked by crate
//! features, and a macro to write such tensors as literals.

use crate::backend::{Backend, SelectedBackend};

/// Creates a tensor of the [`SelectedBackend`] from nested arrays with a
/// `vec!`-like syntax. Elements are `f32`.
///
/// # Examples
///
/// ```
/// use rbm_backend::{Backend, SelectedBackend, tensor};
///
/// // A 1D Tensor
/// let v = tensor![1.0, 2.0, 3.0];
///
/// // A 2D Tensor
/// let m = tensor![[1.0, 2.0], [3.0, 4.0]];
///
/// assert_eq!(SelectedBackend::shape(&v), &[3]);
/// assert_eq!(SelectedBackend::shape(&m), &[2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($($data:tt)+) => {
        <$crate::backend::SelectedBackend as $crate::backend::Backend>
            ::float_tensor(
                $crate::ndarray::array!($($data)+)
                    .mapv(|v: f32| v)
                    .into_dyn(),
            )
    };
}

/// The float tensor of the [`SelectedBackend`].
pub type Tensor = <SelectedBackend as Backend>::Tensor;

#[cfg(test)]
mod tests {
    use crate::{
        backend::{Backend, SelectedBackend},
        tensor::Tensor,
    };

    fn values(tensor: &Tensor) -> Vec<f32> {
        SelectedBackend::to_array(tensor).iter().copied().collect()
    }

    #[test]
    fn test_tensor_macro_1d() {
        let tensor = tensor![1.0, 2.0];

        assert_eq!(SelectedBackend::shape(&tensor), &[2]);
        assert_eq!(values(&tensor), vec![1.0, 2.0]);
    }

    #[test]
    fn test_tensor_macro_2d() {
        let tensor = tensor![[1.0, 2.0], [3.0, 4.0]];

        assert_eq!(SelectedBackend::shape(&tensor), &[2, 2]);
        assert_eq!(values(&tensor), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_tensor_macro_3d() {
        let tensor =
            tensor![[[1.0, 2.0], [3.0, 4.0]], [[5.0, 6.0], [7.0, 8.0]]];

        assert_eq!(SelectedBackend::shape(&tensor), &[2, 2, 2]);
        assert_eq!(
            values(&tensor),
            (1..=8).map(|v| v as f32).collect::<Vec<_>>()
        );
    }
}
