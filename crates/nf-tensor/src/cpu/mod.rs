use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::backend::{format_elements, Backend, BackendStorage, BinaryOp};
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Host-memory tensor storage.
///
/// Holds a contiguous, row-major `Vec<f32>` sized to `shape.total_size()`.
#[derive(Debug)]
pub struct HostStorage {
    shape: Shape,
    data: Vec<f32>,
}

impl HostStorage {
    /// Create zero-filled storage for the given shape.
    pub fn zeros(shape: Shape) -> Result<Self> {
        let data = alloc_zeroed(storage_len(&shape, Backend::Cpu)?)?;
        Ok(HostStorage { shape, data })
    }

    /// Create storage filled with `value`.
    pub fn full(shape: Shape, value: f32) -> Result<Self> {
        let mut storage = HostStorage::zeros(shape)?;
        storage.fill_all(value);
        Ok(storage)
    }

    /// Create storage from an f32 vector.
    ///
    /// # Errors
    /// Returns an error if `data.len()` does not match the shape.
    pub fn from_vec(data: Vec<f32>, shape: Shape) -> Result<Self> {
        if data.len() != storage_len(&shape, Backend::Cpu)? {
            return Err(TensorError::ShapeMismatch {
                op: "build storage from".to_string(),
                lhs: shape,
                rhs: Shape::new(vec![data.len()]),
            });
        }
        Ok(HostStorage { shape, data })
    }

    /// Returns the data as an f32 slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl BackendStorage for HostStorage {
    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn num_elements(&self) -> usize {
        debug_assert_eq!(self.data.len(), self.shape.total_size());
        self.data.len()
    }

    fn fill_all(&mut self, value: f32) {
        self.data.fill(value);
    }

    fn fill_rand_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        fill_uniform(&mut self.data, rng);
    }

    fn try_clone(&self) -> Result<Self> {
        let mut data = alloc_zeroed(self.data.len())?;
        data.copy_from_slice(&self.data);
        Ok(HostStorage {
            shape: self.shape.clone(),
            data,
        })
    }

    fn get(&self, index: usize) -> Result<Self> {
        let (shape, offset) = leading_block(&self.shape, index)?;
        let mut block = HostStorage::zeros(shape)?;
        let count = block.data.len();
        block.data.copy_from_slice(&self.data[offset..offset + count]);
        Ok(block)
    }

    fn set(&mut self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) {
        self.data[lhs_offset..lhs_offset + count]
            .copy_from_slice(&rhs.data[rhs_offset..rhs_offset + count]);
    }

    fn copy_within(&mut self, dst_offset: usize, src_offset: usize, count: usize) {
        self.data
            .copy_within(src_offset..src_offset + count, dst_offset);
    }

    fn compare(&self, lhs_offset: usize, rhs: &Self, rhs_offset: usize, count: usize) -> bool {
        compare_into(
            &self.data[lhs_offset..lhs_offset + count],
            &rhs.data[rhs_offset..rhs_offset + count],
        )
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs_offset: usize,
        rhs: &Self,
        rhs_offset: usize,
        count: usize,
    ) -> Result<Self> {
        let mut out = HostStorage::zeros(self.shape.clone())?;
        binary_into(
            op,
            &mut out.data[..count],
            &self.data[lhs_offset..lhs_offset + count],
            &rhs.data[rhs_offset..rhs_offset + count],
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
        let mut out = HostStorage::zeros(self.shape.clone())?;
        binary_scalar_into(
            op,
            &mut out.data[..count],
            &self.data[lhs_offset..lhs_offset + count],
            scalar.data[scalar_offset],
            scalar_first,
        );
        Ok(out)
    }

    fn to_vec(&self) -> Result<Vec<f32>> {
        Ok(self.data.clone())
    }

    fn data_string(&self) -> Result<String> {
        Ok(format_elements(&self.data))
    }
}

/// Allocates `n` zeroed elements, reporting exhaustion instead of aborting.
pub(crate) fn alloc_zeroed(n: usize) -> Result<Vec<f32>> {
    let mut data = Vec::new();
    data.try_reserve_exact(n)
        .map_err(|e| TensorError::Allocation {
            backend: Backend::Cpu,
            requested: n.saturating_mul(std::mem::size_of::<f32>()),
            reason: e.to_string(),
        })?;
    data.resize(n, 0.0);
    Ok(data)
}

/// Element count of storage for `shape`.
///
/// Zero-sized dimensions are rejected, and a count that overflows `usize`
/// is reported as an allocation failure on `backend`.
pub(crate) fn storage_len(shape: &Shape, backend: Backend) -> Result<usize> {
    if shape.has_zero_dim() {
        return Err(TensorError::ZeroSizedDimension {
            shape: shape.clone(),
        });
    }
    shape
        .checked_total_size()
        .ok_or_else(|| TensorError::Allocation {
            backend,
            requested: usize::MAX,
            reason: format!("element count of shape {shape} overflows usize"),
        })
}

/// Shape and flat offset of the block at `index` along the leading dimension.
pub(crate) fn leading_block(shape: &Shape, index: usize) -> Result<(Shape, usize)> {
    if shape.is_scalar() {
        return Err(TensorError::Dimension {
            shape: shape.clone(),
        });
    }
    let size = shape.dim(0)?;
    if index >= size {
        return Err(TensorError::OutOfBounds {
            index,
            axis: 0,
            size,
        });
    }
    let block = shape.remove_leading_dimension()?;
    let offset = block.total_size() * index;
    Ok((block, offset))
}

// Reference kernels over host-visible slices. The device backend executes
// these same loops against its own buffers.

pub(crate) fn fill_uniform<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R) {
    let dist = Uniform::new_inclusive(-1.0f32, 1.0f32);
    for v in out.iter_mut() {
        *v = dist.sample(rng);
    }
}

pub(crate) fn binary_into(op: BinaryOp, out: &mut [f32], a: &[f32], b: &[f32]) {
    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = op.apply(x, y);
    }
}

pub(crate) fn binary_scalar_into(
    op: BinaryOp,
    out: &mut [f32],
    a: &[f32],
    scalar: f32,
    scalar_first: bool,
) {
    if scalar_first {
        for (o, &x) in out.iter_mut().zip(a) {
            *o = op.apply(scalar, x);
        }
    } else {
        for (o, &x) in out.iter_mut().zip(a) {
            *o = op.apply(x, scalar);
        }
    }
}

pub(crate) fn compare_into(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn iota(dims: &[usize]) -> HostStorage {
        let shape = Shape::from_slice(dims);
        let data = (0..shape.total_size()).map(|i| i as f32).collect();
        HostStorage::from_vec(data, shape).unwrap()
    }

    #[test]
    fn test_zeros_and_full() {
        let z = HostStorage::zeros(Shape::from([2, 3])).unwrap();
        assert_eq!(z.num_elements(), 6);
        assert_eq!(z.as_slice(), &[0.0; 6]);

        let f = HostStorage::full(Shape::from([3]), 4.0).unwrap();
        assert_eq!(f.as_slice(), &[4.0, 4.0, 4.0]);
        assert_eq!(f.backend(), Backend::Cpu);
    }

    #[test]
    fn test_zeros_rejects_unrepresentable_shapes() {
        let huge = HostStorage::zeros(Shape::from([usize::MAX / 2, 3]));
        assert!(matches!(
            huge,
            Err(TensorError::Allocation {
                backend: Backend::Cpu,
                ..
            })
        ));
        assert!(matches!(
            HostStorage::zeros(Shape::from([3, 0])),
            Err(TensorError::ZeroSizedDimension { .. })
        ));
        assert!(matches!(
            HostStorage::from_vec(vec![], Shape::from([0])),
            Err(TensorError::ZeroSizedDimension { .. })
        ));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let r = HostStorage::from_vec(vec![1.0, 2.0], Shape::from([3]));
        assert!(matches!(r, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_fill_rand_range() {
        let mut s = HostStorage::zeros(Shape::from([64])).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        s.fill_rand_with(&mut rng);
        assert!(s.as_slice().iter().all(|v| (-1.0f32..=1.0).contains(v)));
        assert!(s.as_slice().iter().any(|&v| v != 0.0));

        let mut t = HostStorage::zeros(Shape::from([64])).unwrap();
        t.fill_rand_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(s.as_slice(), t.as_slice());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = HostStorage::full(Shape::from([4]), 1.0).unwrap();
        let mut copy = original.try_clone().unwrap();
        copy.fill_all(9.0);
        assert_eq!(original.as_slice(), &[1.0; 4]);
        assert_eq!(copy.as_slice(), &[9.0; 4]);
    }

    #[test]
    fn test_get_leading_block() {
        let s = iota(&[3, 2, 5]);
        let block = s.get(1).unwrap();
        assert_eq!(block.shape().dims(), &[2, 5]);
        assert_eq!(block.as_slice()[0], 10.0);
        assert_eq!(block.as_slice()[9], 19.0);

        let row = block.get(1).unwrap();
        assert_eq!(row.shape().dims(), &[5]);
        assert_eq!(row.as_slice(), &[15.0, 16.0, 17.0, 18.0, 19.0]);
    }

    #[test]
    fn test_get_scalar_fails() {
        let s = HostStorage::full(Shape::scalar(), 1.0).unwrap();
        assert!(matches!(s.get(0), Err(TensorError::Dimension { .. })));
        let v = iota(&[3]);
        assert!(matches!(v.get(3), Err(TensorError::OutOfBounds { .. })));
    }

    #[test]
    fn test_set_window() {
        let mut dst = HostStorage::zeros(Shape::from([2, 3])).unwrap();
        let src = iota(&[3]);
        dst.set(3, &src, 0, 3);
        assert_eq!(dst.as_slice(), &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_copy_within_overlapping() {
        let mut s = iota(&[6]);
        s.copy_within(0, 3, 3);
        assert_eq!(s.as_slice(), &[3.0, 4.0, 5.0, 3.0, 4.0, 5.0]);
        let mut s = iota(&[4]);
        s.copy_within(1, 0, 3);
        assert_eq!(s.as_slice(), &[0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_compare_window() {
        let a = iota(&[2, 3]);
        let b = iota(&[3]);
        assert!(a.compare(0, &b, 0, 3));
        assert!(!a.compare(3, &b, 0, 3));
        assert!(a.compare(1, &b, 1, 2));
    }

    #[test]
    fn test_binary_ops() {
        let a = HostStorage::full(Shape::from([5]), 4.0).unwrap();
        let b = HostStorage::full(Shape::from([5]), 1.5).unwrap();
        assert_eq!(a.add(0, &b, 0, 5).unwrap().as_slice(), &[5.5; 5]);
        assert_eq!(a.sub(0, &b, 0, 5).unwrap().as_slice(), &[2.5; 5]);
        assert_eq!(a.mul(0, &b, 0, 5).unwrap().as_slice(), &[6.0; 5]);
        assert_eq!(b.div(0, &a, 0, 5).unwrap().as_slice(), &[0.375; 5]);
    }

    #[test]
    fn test_binary_partial_count_keeps_shape() {
        let a = iota(&[2, 3]);
        let b = iota(&[2, 3]);
        let r = a.add(3, &b, 0, 3).unwrap();
        assert_eq!(r.shape().dims(), &[2, 3]);
        assert_eq!(r.as_slice(), &[3.0, 5.0, 7.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_scalar_ops() {
        let a = iota(&[4]);
        let s = HostStorage::full(Shape::scalar(), 2.0).unwrap();
        assert_eq!(
            a.sub_scalar(0, &s, 0, 4).unwrap().as_slice(),
            &[-2.0, -1.0, 0.0, 1.0]
        );
        assert_eq!(
            a.mul_scalar(0, &s, 0, 4).unwrap().as_slice(),
            &[0.0, 2.0, 4.0, 6.0]
        );
        let reversed = a
            .binary_scalar(BinaryOp::Sub, 0, &s, 0, 4, true)
            .unwrap();
        assert_eq!(reversed.as_slice(), &[2.0, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn test_div_scalar_by_zero() {
        let a = HostStorage::full(Shape::from([2]), 1.0).unwrap();
        let zero = HostStorage::zeros(Shape::scalar()).unwrap();
        let r = a.div_scalar(0, &zero, 0, 2).unwrap();
        assert!(r.as_slice().iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_data_string() {
        let s = HostStorage::from_vec(vec![1.0, 2.0], Shape::from([2])).unwrap();
        assert_eq!(s.data_string().unwrap(), "{ 1.000000 2.000000 }");
    }
}
