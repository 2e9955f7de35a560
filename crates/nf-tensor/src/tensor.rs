use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::backend::{Backend, BinaryOp};
use crate::cpu::HostStorage;
use crate::cuda::{DeviceHeap, DeviceStorage};
use crate::error::{Result, TensorError};
use crate::semantic::{self, ShapeMatch};
use crate::shape::Shape;
use crate::storage::Storage;
use crate::view::{View, ViewMut};

/// An N-dimensional f32 tensor owning its storage on one backend.
///
/// Two tensors never share a buffer: copies go through [`Tensor::try_clone`]
/// or [`Tensor::assign_from`], both of which deep-copy. There is no `Clone`
/// impl because copying device storage can run out of memory.
///
/// Binary arithmetic follows the shape rules in [`crate::semantic`]: equal
/// shapes and equal element counts work element-wise, and a single-element
/// operand on either side is broadcast over the other.
#[derive(Debug)]
pub struct Tensor {
    storage: Storage,
}

impl Tensor {
    /// Create a zero-filled tensor on `backend`.
    pub fn new(shape: impl Into<Shape>, backend: Backend) -> Result<Self> {
        Ok(Tensor {
            storage: Storage::zeros(shape.into(), backend)?,
        })
    }

    /// Create a tensor with every element set to `value`.
    pub fn full(shape: impl Into<Shape>, value: f32, backend: Backend) -> Result<Self> {
        let mut t = Tensor::new(shape, backend)?;
        t.fill_all(value);
        Ok(t)
    }

    /// Create a one-element tensor.
    pub fn scalar(value: f32, backend: Backend) -> Result<Self> {
        Tensor::full(Shape::scalar(), value, backend)
    }

    /// Create a tensor from row-major data.
    ///
    /// Fails with `ShapeMismatch` if `data.len()` is not the shape's total size.
    pub fn from_vec(data: Vec<f32>, shape: impl Into<Shape>, backend: Backend) -> Result<Self> {
        let host = HostStorage::from_vec(data, shape.into())?;
        let storage = match backend {
            Backend::Cpu => Storage::Host(host),
            Backend::Cuda => Storage::Host(host).to_device(&DeviceHeap::global())?,
        };
        Ok(Tensor { storage })
    }

    /// Zero-filled CPU tensor.
    pub fn zeros(shape: impl Into<Shape>) -> Result<Self> {
        Tensor::new(shape, Backend::Cpu)
    }

    /// CPU tensor filled with ones.
    pub fn ones(shape: impl Into<Shape>) -> Result<Self> {
        Tensor::full(shape, 1.0, Backend::Cpu)
    }

    /// Zero-filled device tensor allocated on a specific heap.
    pub fn zeros_on(shape: impl Into<Shape>, heap: &Arc<DeviceHeap>) -> Result<Self> {
        Ok(Tensor {
            storage: Storage::Device(DeviceStorage::zeros(shape.into(), heap)?),
        })
    }

    pub fn from_storage(storage: Storage) -> Self {
        Tensor { storage }
    }

    /// Deep copy on the same backend.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Tensor {
            storage: self.storage.try_clone()?,
        })
    }

    /// Replaces this tensor's shape, backend and contents with a deep copy
    /// of `other`. On failure `self` is unchanged.
    pub fn assign_from(&mut self, other: &Tensor) -> Result<()> {
        self.storage = other.storage.try_clone()?;
        Ok(())
    }

    pub fn fill_all(&mut self, value: f32) {
        self.storage.fill_all(value);
    }

    /// Fill with values drawn uniformly from `[-1, 1]`.
    pub fn fill_rand(&mut self) {
        self.fill_rand_with(&mut rand::thread_rng());
    }

    pub fn fill_rand_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.storage.fill_rand_with(rng);
    }

    /// Move the tensor's data to `backend`.
    ///
    /// A no-op if the tensor already lives there. Otherwise the target
    /// storage is built and filled first and only then swapped in, so an
    /// allocation failure leaves the tensor untouched. The old buffer is
    /// released when it is dropped.
    pub fn to(&mut self, backend: Backend) -> Result<()> {
        if self.backend() == backend {
            return Ok(());
        }
        info!(
            from = %self.backend(),
            to = %backend,
            shape = %self.shape(),
            "migrating tensor"
        );
        self.storage = self.storage.to_backend(backend)?;
        Ok(())
    }

    /// Move the tensor's data onto a specific device heap.
    pub fn to_device(&mut self, heap: &Arc<DeviceHeap>) -> Result<()> {
        if let Storage::Device(d) = &self.storage {
            if Arc::ptr_eq(d.heap(), heap) {
                return Ok(());
            }
        }
        info!(from = %self.backend(), shape = %self.shape(), "migrating tensor to device heap");
        self.storage = self.storage.to_device(heap)?;
        Ok(())
    }

    pub fn shape(&self) -> &Shape {
        self.storage.shape()
    }

    pub fn num_elements(&self) -> usize {
        self.storage.num_elements()
    }

    pub fn backend(&self) -> Backend {
        self.storage.backend()
    }

    /// `"CPU"` or `"CUDA"`.
    pub fn backend_name(&self) -> &'static str {
        self.backend().name()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Host copy of the elements. Fails on the device backend.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.storage.to_vec()
    }

    /// Elements formatted as `{ 1.000000 2.000000 }`. Fails on the device
    /// backend.
    pub fn data_string(&self) -> Result<String> {
        self.storage.data_string()
    }

    /// The whole tensor as a view.
    pub fn view(&self) -> View<'_> {
        View::whole(self)
    }

    pub fn view_mut(&mut self) -> ViewMut<'_> {
        ViewMut::whole(self)
    }

    /// View of the sub-block at leading index `i`.
    pub fn index(&self, i: usize) -> Result<View<'_>> {
        View::new(self, vec![i])
    }

    pub fn index_mut(&mut self, i: usize) -> Result<ViewMut<'_>> {
        ViewMut::new(self, vec![i])
    }

    /// View of the block addressed by a multi-index prefix.
    pub fn at(&self, position: &[usize]) -> Result<View<'_>> {
        View::new(self, position.to_vec())
    }

    pub fn at_mut(&mut self, position: &[usize]) -> Result<ViewMut<'_>> {
        ViewMut::new(self, position.to_vec())
    }

    /// Copy of the sub-block at leading index `i`.
    ///
    /// Fails with `Dimension` on a one-element tensor and `OutOfBounds` if
    /// `i` exceeds the leading dimension.
    pub fn get(&self, i: usize) -> Result<Tensor> {
        Ok(Tensor {
            storage: self.storage.get(i)?,
        })
    }

    /// Overwrite the block at `position` with the contents of `src`.
    ///
    /// The block and `src` must have canonically equal shapes and share a
    /// backend.
    pub fn set(&mut self, position: &[usize], src: &Tensor) -> Result<()> {
        self.set_view(position, &src.view())
    }

    /// Overwrite the block at `position` with the block addressed by `src`.
    pub fn set_view(&mut self, position: &[usize], src: &View<'_>) -> Result<()> {
        let plan = {
            let dst = View::new(self, position.to_vec())?;
            let plan = semantic::resolve(&dst, src, "set")?;
            if plan.relation != ShapeMatch::Equal {
                return Err(TensorError::ShapeMismatch {
                    op: "set".to_string(),
                    lhs: dst.shape().clone(),
                    rhs: src.shape().clone(),
                });
            }
            plan
        };
        self.storage.set(
            plan.lhs_offset,
            src.parent().storage(),
            plan.rhs_offset,
            plan.count,
        )
    }

    /// Copy the block at `src` onto the block at `dst` within this tensor.
    ///
    /// Both prefixes address blocks of this tensor, which must have
    /// canonically equal shapes. No intermediate tensor is allocated.
    pub fn copy_block(&mut self, dst: &[usize], src: &[usize]) -> Result<()> {
        let plan = {
            let (to, from) = (self.at(dst)?, self.at(src)?);
            let plan = semantic::resolve(&to, &from, "copy")?;
            if plan.relation != ShapeMatch::Equal {
                return Err(TensorError::ShapeMismatch {
                    op: "copy".to_string(),
                    lhs: to.shape().clone(),
                    rhs: from.shape().clone(),
                });
            }
            plan
        };
        self.storage
            .copy_within(plan.lhs_offset, plan.rhs_offset, plan.count);
        Ok(())
    }

    /// Exact element-wise equality with `other`.
    ///
    /// Tensors whose shapes are not canonically equal compare as `false`.
    /// Operands on different backends are an error.
    pub fn compare(&self, other: &Tensor) -> Result<bool> {
        self.view().compare(&other.view())
    }

    pub fn compare_view(&self, other: &View<'_>) -> Result<bool> {
        self.view().compare(other)
    }

    /// Compare the block at `position` with `other`.
    pub fn compare_at(&self, position: &[usize], other: &Tensor) -> Result<bool> {
        self.at(position)?.compare(&other.view())
    }

    pub fn compare_at_view(&self, position: &[usize], other: &View<'_>) -> Result<bool> {
        self.at(position)?.compare(other)
    }

    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        self.apply_binary(BinaryOp::Add, rhs)
    }

    pub fn sub(&self, rhs: &Tensor) -> Result<Tensor> {
        self.apply_binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(&self, rhs: &Tensor) -> Result<Tensor> {
        self.apply_binary(BinaryOp::Mul, rhs)
    }

    pub fn div(&self, rhs: &Tensor) -> Result<Tensor> {
        self.apply_binary(BinaryOp::Div, rhs)
    }

    fn apply_binary(&self, op: BinaryOp, rhs: &Tensor) -> Result<Tensor> {
        let (lhs_view, rhs_view) = (self.view(), rhs.view());
        let plan = semantic::plan(&lhs_view, &rhs_view, op.name())?;
        let (a, b) = (&self.storage, &rhs.storage);
        let storage = match plan.relation {
            ShapeMatch::Equal | ShapeMatch::EqualCount => {
                a.binary(op, plan.lhs_offset, b, plan.rhs_offset, plan.count)?
            }
            ShapeMatch::ScalarRhs => {
                a.binary_scalar(op, plan.lhs_offset, b, plan.rhs_offset, plan.count, false)?
            }
            // `s OP x`: the broadcast runs over rhs with the scalar first.
            ShapeMatch::ScalarLhs => {
                b.binary_scalar(op, plan.rhs_offset, a, plan.lhs_offset, plan.count, true)?
            }
            ShapeMatch::Incompatible => {
                return Err(TensorError::ShapeMismatch {
                    op: op.name().to_string(),
                    lhs: lhs_view.shape().clone(),
                    rhs: rhs_view.shape().clone(),
                })
            }
        };
        Ok(Tensor { storage })
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = Result<Tensor>;

            fn $method(self, rhs: &Tensor) -> Result<Tensor> {
                Tensor::$method(self, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

/// Element-wise equality through [`Tensor::compare`].
///
/// Any error, such as operands on different backends, compares as unequal.
/// Call `compare` directly when the operands may live on different backends
/// and the mismatch has to be reported.
impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other).unwrap_or(false)
    }
}

/// Same as the `Tensor` impl; errors compare as unequal.
impl PartialEq<View<'_>> for Tensor {
    fn eq(&self, other: &View<'_>) -> bool {
        self.compare_view(other).unwrap_or(false)
    }
}
