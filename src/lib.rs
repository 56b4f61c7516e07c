//! Swappable numeric backends for training restricted Boltzmann machines.
//!
//! Everything a trainer needs from a numerics library (tensor creation,
//! broadcasting elementwise math, keep-dims reductions, products, running
//! averages and sample distances) is expressed by the [`Backend`] trait.
//! Two implementations ship with the crate:
//!
//! - [`NdarrayBackend`](backend::ndarray::NdarrayBackend), built on
//!   [`ndarray`], selected by the default `ndarray-backend` feature;
//! - [`DenseBackend`](backend::dense::DenseBackend), a self-contained
//!   row-major tensor with [`rayon`] kernels, selected by `dense-backend`.
//!
//! Code written against [`SelectedBackend`] compiles unchanged with
//! either.
//!
//! ```
//! use rbm_backend::{Backend, SelectedBackend as B, tensor};
//!
//! let mut running = B::zeros(&[2]);
//! let grad = tensor![1.0, -1.0];
//!
//! B::mix_inplace(0.9, &mut running, &grad).unwrap();
//!
//! let expected = tensor![0.1, -0.1];
//! assert!(B::allclose(&running, &expected).unwrap());
//! ```

pub mod backend;
pub mod distance;
pub mod error;
mod kernels;
mod linalg;
pub mod shape;
pub mod tensor;

pub use ndarray;

pub use crate::{
    backend::{Backend, DType, EPSILON, SelectedBackend},
    distance::EnergyDistance,
    error::{Error, Result},
    tensor::Tensor,
};
