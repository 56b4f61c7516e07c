//! Error types shared by every backend.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while running a backend operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The shape of an operand does not match what the operation needs.
    #[error("shape mismatch in `{op}`: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// The operation that rejected the operand.
        op: &'static str,
        /// The expected shape.
        expected: Vec<usize>,
        /// The shape that was supplied.
        got: Vec<usize>,
    },

    /// Two shapes cannot be broadcast together.
    #[error("cannot broadcast shapes {lhs:?} and {rhs:?}")]
    Broadcast {
        /// Left-hand side shape.
        lhs: Vec<usize>,
        /// Right-hand side shape.
        rhs: Vec<usize>,
    },

    /// An axis outside of `0..ndim`.
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis {
        /// The rejected axis.
        axis: usize,
        /// Rank of the tensor.
        ndim: usize,
    },

    /// The tensor has a rank the operation does not accept.
    #[error("`{op}` does not accept a tensor with {ndim} dimensions")]
    InvalidRank {
        /// The operation that rejected the operand.
        op: &'static str,
        /// Rank of the tensor.
        ndim: usize,
    },

    /// A reduction without an identity element was applied to no elements.
    #[error("`{op}` of an empty tensor is undefined")]
    EmptyReduction {
        /// The reduction.
        op: &'static str,
    },

    /// The matrix has no inverse representable in `f32`.
    #[error("matrix is singular to working precision")]
    SingularMatrix,

    /// A scalar could not be represented as `f32`.
    #[error("value cannot be represented as f32")]
    ScalarConversion,

    /// Invalid argument provided to an operation.
    #[error("invalid argument `{arg}`: {reason}")]
    InvalidArgument {
        /// The argument name.
        arg: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Shape error reported by [`ndarray`].
    #[error(transparent)]
    Ndarray(#[from] ndarray::ShapeError),
}
