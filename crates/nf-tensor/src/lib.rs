//! `nf-tensor` - N-dimensional f32 tensors for nforge.
//!
//! This crate provides:
//! - A `Shape` type with canonical, trailing-ones-insensitive equality
//! - A `BackendStorage` trait with host (CPU) and device (CUDA) realizations
//! - A `Tensor` type that owns one storage and can migrate between backends
//! - Borrowed `View`s addressing contiguous sub-blocks by index prefix
//! - Element-wise arithmetic with single-element broadcasting
//!
//! The device backend runs against a capacity-limited heap and an in-order
//! stream. Its size comes from `NFORGE_DEVICE_MEMORY_MB` (see [`config`]).

pub mod backend;
pub mod config;
pub mod cpu;
pub mod cuda;
pub mod error;
pub mod semantic;
pub mod shape;
pub mod storage;
pub mod tensor;
pub mod view;

// Re-export primary types at the crate root for convenience.
pub use backend::{Backend, BackendStorage, BinaryOp};
pub use config::DeviceConfig;
pub use cpu::HostStorage;
pub use cuda::{DeviceHeap, DeviceStorage};
pub use error::{Result, TensorError};
pub use semantic::{BinaryPlan, ShapeMatch};
pub use shape::Shape;
pub use storage::Storage;
pub use tensor::Tensor;
pub use view::{View, ViewMut};
