//! Device-resident storage.
//!
//! The device is modelled as a capacity-limited heap plus an in-order
//! stream. Buffers live behind [`DeviceBuffer`], whose contents are only
//! reachable through kernels or a synchronizing download, so host-side
//! iteration (`to_vec`, `data_string`) is refused on this backend.

pub mod kernels;
pub mod memory;
pub mod stream;

use std::sync::Arc;

use rand::Rng;

use crate::backend::{Backend, BackendStorage, BinaryOp};
use crate::cpu::{leading_block, storage_len};
use crate::error::{Result, TensorError};
use crate::shape::Shape;

pub use memory::{DeviceBuffer, DeviceHeap};
pub use stream::Stream;

/// Tensor storage resident in device memory.
#[derive(Debug)]
pub struct DeviceStorage {
    shape: Shape,
    buffer: DeviceBuffer,
}

impl DeviceStorage {
    /// Create zero-filled storage on `heap`.
    pub fn zeros(shape: Shape, heap: &Arc<DeviceHeap>) -> Result<Self> {
        let buffer = heap.alloc(storage_len(&shape, Backend::Cuda)?)?;
        Ok(DeviceStorage { shape, buffer })
    }

    /// Copy host data into a new device allocation.
    pub fn upload(data: &[f32], shape: Shape, heap: &Arc<DeviceHeap>) -> Result<Self> {
        if data.len() != storage_len(&shape, Backend::Cuda)? {
            return Err(TensorError::ShapeMismatch {
                op: "upload".to_string(),
                lhs: shape,
                rhs: Shape::new(vec![data.len()]),
            });
        }
        let buffer = heap.upload(data)?;
        Ok(DeviceStorage { shape, buffer })
    }

    /// Copy the buffer back to host memory, synchronizing first.
    pub(crate) fn download(&self) -> Result<Vec<f32>> {
        self.buffer.download()
    }

    pub fn heap(&self) -> &Arc<DeviceHeap> {
        self.buffer.heap()
    }

    fn alloc_like(&self, shape: Shape) -> Result<Self> {
        DeviceStorage::zeros(shape, self.heap())
    }
}

impl BackendStorage for DeviceStorage {
    fn backend(&self) -> Backend {
        Backend::Cuda
    }

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn num_elements(&self) -> usize {
        debug_assert_eq!(self.buffer.len(), self.shape.total_size());
        self.buffer.len()
    }

    fn fill_all(&mut self, value: f32) {
        kernels::fill(&mut self.buffer, value);
    }

    fn fill_rand_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        kernels::fill_uniform_rand(&mut self.buffer, rng);
    }

    fn try_clone(&self) -> Result<Self> {
        let mut copy = self.alloc_like(self.shape.clone())?;
        kernels::copy(&mut copy.buffer, 0, &self.buffer, 0, self.buffer.len());
        Ok(copy)
    }

    fn get(&self, index: usize) -> Result<Self> {
        let (shape, offset) = leading_block(&self.shape, index)?;
        let mut block = self.alloc_like(shape)?;
        let count = block.buffer.len();
        kernels::copy(&mut block.buffer, 0, &self.buffer, offset, count);
        Ok(block)
    }

    fn set(&mut self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) {
        kernels::copy(&mut self.buffer, lhs_offset, &rhs.buffer, rhs_offset, count);
    }

    fn copy_within(&mut self, dst_offset: usize, src_offset: usize, count: usize) {
        kernels::copy_within(&mut self.buffer, dst_offset, src_offset, count);
    }

    fn compare(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> bool {
        kernels::compare(&self.buffer, lhs_offset, &rhs.buffer, rhs_offset, count)
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        rhs: &Self,
        rhs_offset: usize,
        count: usize,
    ) -> Result<Self> {
        let mut out = self.alloc_like(self.shape.clone())?;
        kernels::binary(
            op,
            &mut out.buffer,
            &self.buffer,
            lhs_offset,
            &rhs.buffer,
            rhs_offset,
            count,
        );
        Ok(out)
    }

    fn binary_scalar(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        scalar: &Self,
        scalar_offset: usize,
        count: usize,
        scalar_first: bool,
    ) -> Result<Self> {
        let mut out = self.alloc_like(self.shape.clone())?;
        kernels::binary_scalar(
            op,
            &mut out.buffer,
            &self.buffer,
            lhs_offset,
            &scalar.buffer,
            scalar_offset,
            count,
            scalar_first,
        );
        Ok(out)
    }

    fn to_vec(&self) -> Result<Vec<f32>> {
        Err(TensorError::UnsupportedOnBackend {
            op: "to_vec",
            backend: Backend::Cuda,
        })
    }

    fn data_string(&self) -> Result<String> {
        Err(TensorError::UnsupportedOnBackend {
            op: "data_string",
            backend: Backend::Cuda,
        })
    }
}
