use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::backend::{Backend, BackendStorage, BinaryOp};
use crate::cpu::HostStorage;
use crate::cuda::{DeviceHeap, DeviceStorage};
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Tensor storage on one of the supported backends.
///
/// Operations that take a second storage require both sides to live on the
/// same backend; a mixed pair is reported as [`TensorError::BackendMismatch`].
#[derive(Debug)]
pub enum Storage {
    Host(HostStorage),
    Device(DeviceStorage),
}

impl Storage {
    /// Zero-filled storage on `backend`. Device storage is placed on the
    /// global heap.
    pub fn zeros(shape: Shape, backend: Backend) -> Result<Self> {
        match backend {
            Backend::Cpu => Ok(Storage::Host(HostStorage::zeros(shape)?)),
            Backend::Cuda => Ok(Storage::Device(DeviceStorage::zeros(
                shape,
                &DeviceHeap::global(),
            )?)),
        }
    }

    /// Zero-filled storage of `shape` on the same backend (and heap) as `self`.
    pub fn zeros_like(&self, shape: Shape) -> Result<Self> {
        match self {
            Storage::Host(_) => Ok(Storage::Host(HostStorage::zeros(shape)?)),
            Storage::Device(d) => Ok(Storage::Device(DeviceStorage::zeros(shape, d.heap())?)),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Storage::Host(s) => s.backend(),
            Storage::Device(s) => s.backend(),
        }
    }

    pub fn shape(&self) -> &Shape {
        match self {
            Storage::Host(s) => s.shape(),
            Storage::Device(s) => s.shape(),
        }
    }

    pub fn num_elements(&self) -> usize {
        match self {
            Storage::Host(s) => s.num_elements(),
            Storage::Device(s) => s.num_elements(),
        }
    }

    pub fn fill_all(&mut self, value: f32) {
        match self {
            Storage::Host(s) => s.fill_all(value),
            Storage::Device(s) => s.fill_all(value),
        }
    }

    pub fn fill_rand_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self {
            Storage::Host(s) => s.fill_rand_with(rng),
            Storage::Device(s) => s.fill_rand_with(rng),
        }
    }

    pub fn try_clone(&self) -> Result<Self> {
        match self {
            Storage::Host(s) => Ok(Storage::Host(s.try_clone()?)),
            Storage::Device(s) => Ok(Storage::Device(s.try_clone()?)),
        }
    }

    pub fn get(&self, index: usize) -> Result<Self> {
        match self {
            Storage::Host(s) => Ok(Storage::Host(s.get(index)?)),
            Storage::Device(s) => Ok(Storage::Device(s.get(index)?)),
        }
    }

    pub fn set(
        &mut self,
        lhs_offset: usize,
        rhs: &Storage,
        rhs_offset: usize,
        count: usize,
    ) -> Result<()> {
        match (self, rhs) {
            (Storage::Host(a), Storage::Host(b)) => {
                a.set(lhs_offset, b, rhs_offset, count);
                Ok(())
            }
            (Storage::Device(a), Storage::Device(b)) => {
                a.set(lhs_offset, b, rhs_offset, count);
                Ok(())
            }
            (lhs, rhs) => Err(lhs.mismatch(rhs, "set")),
        }
    }

    /// Copies a window of this storage onto another window of itself.
    pub fn copy_within(&mut self, dst_offset: usize, src_offset: usize, count: usize) {
        match self {
            Storage::Host(s) => s.copy_within(dst_offset, src_offset, count),
            Storage::Device(s) => s.copy_within(dst_offset, src_offset, count),
        }
    }

    pub fn compare(
        &self,
        lhs_offset: usize,
        rhs: &Storage,
        rhs_offset: usize,
        count: usize,
    ) -> Result<bool> {
        match (self, rhs) {
            (Storage::Host(a), Storage::Host(b)) => Ok(a.compare(lhs_offset, b, rhs_offset, count)),
            (Storage::Device(a), Storage::Device(b)) => {
                Ok(a.compare(lhs_offset, b, rhs_offset, count))
            }
            _ => Err(self.mismatch(rhs, "compare")),
        }
    }

    pub fn binary(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        rhs: &Storage,
        rhs_offset: usize,
        count: usize,
    ) -> Result<Self> {
        match (self, rhs) {
            (Storage::Host(a), Storage::Host(b)) => Ok(Storage::Host(
                a.binary(op, lhs_offset, b, rhs_offset, count)?,
            )),
            (Storage::Device(a), Storage::Device(b)) => Ok(Storage::Device(
                a.binary(op, lhs_offset, b, rhs_offset, count)?,
            )),
            _ => Err(self.mismatch(rhs, op.name())),
        }
    }

    pub fn binary_scalar(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        scalar: &Storage,
        scalar_offset: usize,
        count: usize,
        scalar_first: bool,
    ) -> Result<Self> {
        match (self, scalar) {
            (Storage::Host(a), Storage::Host(s)) => Ok(Storage::Host(a.binary_scalar(
                op,
                lhs_offset,
                s,
                scalar_offset,
                count,
                scalar_first,
            )?)),
            (Storage::Device(a), Storage::Device(s)) => Ok(Storage::Device(a.binary_scalar(
                op,
                lhs_offset,
                s,
                scalar_offset,
                count,
                scalar_first,
            )?)),
            _ => Err(self.mismatch(scalar, op.name())),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<f32>> {
        match self {
            Storage::Host(s) => s.to_vec(),
            Storage::Device(s) => s.to_vec(),
        }
    }

    pub fn data_string(&self) -> Result<String> {
        match self {
            Storage::Host(s) => s.data_string(),
            Storage::Device(s) => s.data_string(),
        }
    }

    /// Builds a copy of this storage on `target`.
    ///
    /// `self` is left untouched; the caller swaps the result in and drops the
    /// old storage. Device targets use the global heap.
    pub fn to_backend(&self, target: Backend) -> Result<Storage> {
        match target {
            Backend::Cpu => self.to_host(),
            Backend::Cuda => self.to_device(&DeviceHeap::global()),
        }
    }

    /// Copy into host memory. Device data is synchronized before it is read.
    pub fn to_host(&self) -> Result<Storage> {
        match self {
            Storage::Host(s) => Ok(Storage::Host(s.try_clone()?)),
            Storage::Device(s) => {
                let data = s.download()?;
                debug!(elements = data.len(), "device to host copy");
                Ok(Storage::Host(HostStorage::from_vec(data, s.shape().clone())?))
            }
        }
    }

    /// Copy into device memory on `heap`.
    pub fn to_device(&self, heap: &Arc<DeviceHeap>) -> Result<Storage> {
        match self {
            Storage::Host(s) => {
                debug!(elements = s.num_elements(), "host to device copy");
                Ok(Storage::Device(DeviceStorage::upload(
                    s.as_slice(),
                    s.shape().clone(),
                    heap,
                )?))
            }
            Storage::Device(s) => {
                let data = s.download()?;
                Ok(Storage::Device(DeviceStorage::upload(
                    &data,
                    s.shape().clone(),
                    heap,
                )?))
            }
        }
    }

    fn mismatch(&self, rhs: &Storage, op: &str) -> TensorError {
        TensorError::BackendMismatch {
            op: op.to_string(),
            lhs_backend: self.backend(),
            rhs_backend: rhs.backend(),
            lhs_shape: self.shape().clone(),
            rhs_shape: rhs.shape().clone(),
        }
    }
}

impl From<HostStorage> for Storage {
    fn from(storage: HostStorage) -> Self {
        Storage::Host(storage)
    }
}

impl From<DeviceStorage> for Storage {
    fn from(storage: DeviceStorage) -> Self {
        Storage::Device(storage)
    }
}
