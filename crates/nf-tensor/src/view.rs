use crate::backend::Backend;
use crate::error::Result;
use crate::semantic::{self, ShapeMatch};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Shape and flat element offset of the block addressed by `position`.
fn locate(parent: &Shape, position: &[usize]) -> Result<(Shape, usize)> {
    let linear = parent.linear_index(position)?;
    let block = parent.index_by_prefix(position)?;
    let offset = block.total_size() * linear;
    Ok((block, offset))
}

/// A read-only window onto a contiguous block of a tensor.
///
/// The block is addressed by a multi-index prefix over the parent's leading
/// dimensions. No data is copied; the view borrows its parent, so it cannot
/// outlive it or observe a storage swap.
#[derive(Debug, Clone)]
pub struct View<'a> {
    parent: &'a Tensor,
    position: Vec<usize>,
    shape: Shape,
    offset: usize,
}

impl<'a> View<'a> {
    /// A view of the block at `position`.
    ///
    /// # Errors
    /// `Dimension` if `position` is longer than the parent's rank,
    /// `OutOfBounds` if any index exceeds its dimension.
    pub fn new(parent: &'a Tensor, position: Vec<usize>) -> Result<Self> {
        let (shape, offset) = locate(parent.shape(), &position)?;
        Ok(View {
            parent,
            position,
            shape,
            offset,
        })
    }

    /// The whole tensor as a view with an empty prefix.
    pub fn whole(parent: &'a Tensor) -> Self {
        View {
            parent,
            position: Vec::new(),
            shape: parent.shape().clone(),
            offset: 0,
        }
    }

    pub fn parent(&self) -> &'a Tensor {
        self.parent
    }

    pub fn position(&self) -> &[usize] {
        &self.position
    }

    pub fn backend(&self) -> Backend {
        self.parent.backend()
    }

    /// Shape of the addressed block.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Flat element offset of the block within the parent's storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn num_elements(&self) -> usize {
        self.shape.total_size()
    }

    /// Narrows the view by one more leading index.
    pub fn index(&self, idx: usize) -> Result<View<'a>> {
        let mut position = self.position.clone();
        position.push(idx);
        View::new(self.parent, position)
    }

    /// Exact comparison of the addressed block against another block.
    ///
    /// Blocks whose shapes are not canonically equal compare as unequal.
    pub fn compare(&self, other: &View<'_>) -> Result<bool> {
        let plan = semantic::plan(self, other, "compare")?;
        if plan.relation != ShapeMatch::Equal {
            return Ok(false);
        }
        self.parent.storage().compare(
            plan.lhs_offset,
            other.parent.storage(),
            plan.rhs_offset,
            plan.count,
        )
    }

    /// Copies the addressed block into a new tensor on the same backend.
    pub fn to_tensor(&self) -> Result<Tensor> {
        let source = self.parent.storage();
        let mut storage = source.zeros_like(self.shape.clone())?;
        storage.set(0, source, self.offset, self.num_elements())?;
        Ok(Tensor::from_storage(storage))
    }
}

/// Block equality through [`View::compare`].
///
/// Any error, such as views of tensors on different backends, compares as
/// unequal. Use `compare` to surface it.
impl PartialEq for View<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other).unwrap_or(false)
    }
}

/// Same as the `View` impl; errors compare as unequal.
impl PartialEq<Tensor> for View<'_> {
    fn eq(&self, other: &Tensor) -> bool {
        self.compare(&other.view()).unwrap_or(false)
    }
}

/// A writable window onto a contiguous block of a tensor.
///
/// Holds the parent exclusively for its lifetime, so the parent's storage
/// cannot be replaced or migrated while the view exists.
#[derive(Debug)]
pub struct ViewMut<'a> {
    parent: &'a mut Tensor,
    position: Vec<usize>,
    shape: Shape,
    offset: usize,
}

impl<'a> ViewMut<'a> {
    pub fn new(parent: &'a mut Tensor, position: Vec<usize>) -> Result<Self> {
        let (shape, offset) = locate(parent.shape(), &position)?;
        Ok(ViewMut {
            parent,
            position,
            shape,
            offset,
        })
    }

    /// The whole tensor as a writable view.
    pub fn whole(parent: &'a mut Tensor) -> Self {
        let shape = parent.shape().clone();
        ViewMut {
            parent,
            position: Vec::new(),
            shape,
            offset: 0,
        }
    }

    pub fn position(&self) -> &[usize] {
        &self.position
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Narrows the view by one more leading index.
    pub fn index(self, idx: usize) -> Result<ViewMut<'a>> {
        let mut position = self.position;
        position.push(idx);
        ViewMut::new(self.parent, position)
    }

    /// Read-only view of the same block.
    pub fn as_view(&self) -> View<'_> {
        View {
            parent: &*self.parent,
            position: self.position.clone(),
            shape: self.shape.clone(),
            offset: self.offset,
        }
    }

    /// Overwrites the addressed block with the contents of `src`.
    pub fn assign(&mut self, src: &Tensor) -> Result<()> {
        self.parent.set(&self.position, src)
    }

    /// Overwrites the addressed block with the block addressed by `src`.
    pub fn assign_view(&mut self, src: &View<'_>) -> Result<()> {
        self.parent.set_view(&self.position, src)
    }
}
