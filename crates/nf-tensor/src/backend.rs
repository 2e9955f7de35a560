use std::fmt::{self, Debug};

use rand::Rng;

use crate::error::Result;
use crate::shape::Shape;

/// Memory residency of a tensor's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Host memory.
    Cpu,
    /// Accelerator device memory.
    Cuda,
}

impl Backend {
    /// Returns the name of this backend (e.g., "CPU", "CUDA").
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Cpu => "CPU",
            Backend::Cuda => "CUDA",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element-wise binary arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }

    /// Applies the operation with IEEE-754 semantics (division by zero
    /// yields infinity or NaN).
    #[inline]
    pub fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }
}

/// Storage contract every backend realization satisfies.
///
/// A storage owns a flat, row-major buffer of `shape().total_size()` f32
/// elements. Offsets and counts passed to the block operations are flat
/// element positions; callers are expected to have validated them (see
/// [`crate::semantic`]), so implementations perform no bounds checks beyond
/// what slice indexing gives for free.
pub trait BackendStorage: Sized + Debug + Send {
    /// Returns the backend this storage resides on.
    fn backend(&self) -> Backend;

    fn shape(&self) -> &Shape;

    /// Number of elements held. Always equals `shape().total_size()`.
    fn num_elements(&self) -> usize;

    /// Overwrites every element with `value`.
    fn fill_all(&mut self, value: f32);

    /// Overwrites every element with uniform samples in `[-1, 1]` drawn from `rng`.
    fn fill_rand_with<R: Rng + ?Sized>(&mut self, rng: &mut R);

    /// Overwrites every element with uniform samples in `[-1, 1]`.
    fn fill_rand(&mut self) {
        self.fill_rand_with(&mut rand::thread_rng());
    }

    /// Deep copy on the same backend.
    fn try_clone(&self) -> Result<Self>;

    /// Copy of the sub-block obtained by consuming the leading dimension at
    /// `index`. A shape `[3, 2, 5]` at index 1 yields the `[2, 5]` block
    /// starting at element 10.
    fn get(&self, index: usize) -> Result<Self>;

    /// Copies `count` elements of `rhs` starting at `rhs_offset` into `self`
    /// starting at `lhs_offset`.
    fn set(&mut self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize);

    /// Copies `count` elements starting at `src_offset` to `dst_offset`
    /// within this storage. The windows may overlap.
    fn copy_within(&mut self, dst_offset: usize, src_offset: usize, count: usize);

    /// Exact (bitwise `==`) comparison of two windows of `count` elements.
    fn compare(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> bool;

    /// New storage shaped like `self` whose first `count` elements are
    /// `self[lhs_offset + i] op rhs[rhs_offset + i]`. Remaining elements are zero.
    fn binary(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        rhs: &Self,
        rhs_offset: usize,
        count: usize,
    ) -> Result<Self>;

    /// New storage shaped like `self` whose first `count` elements are
    /// `self[lhs_offset + i] op s`, where `s = scalar[scalar_offset]`.
    ///
    /// With `scalar_first` the operands are swapped to `s op self[lhs_offset + i]`,
    /// which is how a broadcast scalar on the left-hand side is evaluated.
    fn binary_scalar(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        scalar: &Self,
        scalar_offset: usize,
        count: usize,
        scalar_first: bool,
    ) -> Result<Self>;

    /// Host copy of the whole buffer.
    fn to_vec(&self) -> Result<Vec<f32>>;

    /// Space separated rendering of the buffer, e.g. `{ 1.000000 2.000000 }`.
    fn data_string(&self) -> Result<String>;

    fn add(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary(BinaryOp::Add, lhs_offset, rhs, rhs_offset, count)
    }

    fn sub(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary(BinaryOp::Sub, lhs_offset, rhs, rhs_offset, count)
    }

    fn mul(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary(BinaryOp::Mul, lhs_offset, rhs, rhs_offset, count)
    }

    fn div(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary(BinaryOp::Div, lhs_offset, rhs, rhs_offset, count)
    }

    fn add_scalar(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary_scalar(BinaryOp::Add, lhs_offset, rhs, rhs_offset, count, false)
    }

    fn sub_scalar(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary_scalar(BinaryOp::Sub, lhs_offset, rhs, rhs_offset, count, false)
    }

    fn mul_scalar(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary_scalar(BinaryOp::Mul, lhs_offset, rhs, rhs_offset, count, false)
    }

    fn div_scalar(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> Result<Self> {
        self.binary_scalar(BinaryOp::Div, lhs_offset, rhs, rhs_offset, count, false)
    }
}

/// Renders elements the way `data_string` does on every backend.
pub(crate) fn format_elements(data: &[f32]) -> String {
    let mut out = String::from("{ ");
    for v in data {
        out.push_str(&format!("{:.6} ", v));
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name() {
        assert_eq!(Backend::Cpu.name(), "CPU");
        assert_eq!(Backend::Cuda.to_string(), "CUDA");
    }

    #[test]
    fn test_binary_op_apply() {
        assert_eq!(BinaryOp::Add.apply(4.0, 1.5), 5.5);
        assert_eq!(BinaryOp::Sub.apply(4.0, 1.5), 2.5);
        assert_eq!(BinaryOp::Mul.apply(4.0, 1.5), 6.0);
        assert_eq!(BinaryOp::Div.apply(3.0, 1.5), 2.0);
    }

    #[test]
    fn test_div_by_zero_is_ieee() {
        assert_eq!(BinaryOp::Div.apply(1.0, 0.0), f32::INFINITY);
        assert_eq!(BinaryOp::Div.apply(-1.0, 0.0), f32::NEG_INFINITY);
        assert!(BinaryOp::Div.apply(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_format_elements() {
        assert_eq!(format_elements(&[1.0, 2.5]), "{ 1.000000 2.500000 }");
        assert_eq!(format_elements(&[]), "{ }");
    }
}
