use thiserror::Error;

use crate::backend::Backend;
use crate::shape::Shape;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error(
        "cannot {op} tensors on different backends {lhs_backend} and {rhs_backend} \
         of shapes {lhs_shape} and {rhs_shape}"
    )]
    BackendMismatch {
        op: String,
        lhs_backend: Backend,
        rhs_backend: Backend,
        lhs_shape: Shape,
        rhs_shape: Shape,
    },
    #[error("cannot {op} tensors of incompatible shapes {lhs} and {rhs}")]
    ShapeMismatch { op: String, lhs: Shape, rhs: Shape },
    #[error("shape {shape} has a zero-sized dimension")]
    ZeroSizedDimension { shape: Shape },
    #[error("cannot index shape {shape}: no dimension left to consume")]
    Dimension { shape: Shape },
    #[error("invalid dimension range [{start}, {end}) for shape with {ndim} dimensions")]
    Range { start: usize, end: usize, ndim: usize },
    #[error("index {index} out of bounds for axis {axis} of size {size}")]
    OutOfBounds { index: usize, axis: usize, size: usize },
    #[error("dimension {index} out of range for shape with {ndim} dimensions")]
    Index { index: usize, ndim: usize },
    #[error("{op} is not supported on the {backend} backend")]
    UnsupportedOnBackend { op: &'static str, backend: Backend },
    #[error("failed to allocate {requested} bytes on {backend}: {reason}")]
    Allocation {
        backend: Backend,
        requested: usize,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
