use crate::error::{Result, TensorError};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A tensor shape, wrapping a vector of dimension sizes.
///
/// A shape always has at least one dimension: an empty dimension list is
/// canonicalized to `[1]`, the scalar shape. Equality ignores trailing
/// size-1 dimensions, so `[3]`, `[3, 1]` and `[3, 1, 1]` all compare equal.
///
/// Any dimension list can be described, but storage is only ever built for
/// shapes whose sizes are all positive and whose element count fits in
/// `usize`; see [`Shape::checked_total_size`].
#[derive(Debug, Clone)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(mut dims: Vec<usize>) -> Self {
        if dims.is_empty() {
            dims.push(1);
        }
        Shape { dims }
    }

    /// Create a shape from a slice of dimensions.
    pub fn from_slice(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }

    /// The one-element shape `[1]`.
    pub fn scalar() -> Self {
        Shape { dims: vec![1] }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    ///
    /// Saturates at `usize::MAX` when the product overflows.
    pub fn total_size(&self) -> usize {
        self.checked_total_size().unwrap_or(usize::MAX)
    }

    /// Total number of elements, or `None` if the product overflows `usize`.
    pub fn checked_total_size(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// True when some dimension has size 0.
    pub fn has_zero_dim(&self) -> bool {
        self.dims.contains(&0)
    }

    /// True when the shape addresses exactly one element.
    pub fn is_scalar(&self) -> bool {
        self.total_size() == 1
    }

    /// Returns the size of dimension `i`.
    pub fn dim(&self, i: usize) -> Result<usize> {
        self.dims.get(i).copied().ok_or(TensorError::Index {
            index: i,
            ndim: self.ndim(),
        })
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Dimensions `[start, end)` as a new shape.
    pub fn slice(&self, start: usize, end: usize) -> Result<Shape> {
        if start > end || end > self.ndim() {
            return Err(TensorError::Range {
                start,
                end,
                ndim: self.ndim(),
            });
        }
        Ok(Shape::from_slice(&self.dims[start..end]))
    }

    /// The shape left after consuming the first `n` dimensions.
    ///
    /// Consuming every dimension leaves the scalar shape `[1]`, since a fully
    /// indexed tensor still addresses a one-element block.
    pub fn drop_prefix(&self, n: usize) -> Result<Shape> {
        self.slice(n, self.ndim())
    }

    /// The block shape addressed by a multi-index prefix.
    pub fn index_by_prefix(&self, position: &[usize]) -> Result<Shape> {
        self.drop_prefix(position.len())
    }

    pub fn remove_leading_dimension(&self) -> Result<Shape> {
        self.drop_prefix(1)
    }

    /// Dimensions with trailing 1s stripped, keeping at least one.
    pub fn without_trailing_ones(&self) -> &[usize] {
        let mut end = self.dims.len();
        while end > 1 && self.dims[end - 1] == 1 {
            end -= 1;
        }
        &self.dims[..end]
    }

    /// Computes row-major contiguous strides for this shape.
    ///
    /// For a shape [d0, d1, d2], the strides are [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.dims.len()];
        strides[self.dims.len() - 1] = 1;
        for i in (0..self.dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Row-major linear index of `position` over the leading
    /// `position.len()` dimensions.
    ///
    /// Multiplying the result by the size of the residual block gives the
    /// flat element offset of the block.
    pub fn linear_index(&self, position: &[usize]) -> Result<usize> {
        if position.len() > self.ndim() {
            return Err(TensorError::Dimension { shape: self.clone() });
        }
        let mut linear = 0;
        for (axis, &index) in position.iter().enumerate() {
            let size = self.dims[axis];
            if index >= size {
                return Err(TensorError::OutOfBounds { index, axis, size });
            }
            linear = linear * size + index;
        }
        Ok(linear)
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.without_trailing_ones() == other.without_trailing_ones()
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.without_trailing_ones().hash(state);
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::from_slice(&dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.total_size(), 24);
        assert_eq!(s.dim(0).unwrap(), 2);
        assert_eq!(s.dim(1).unwrap(), 3);
        assert_eq!(s.dim(2).unwrap(), 4);
        assert!(!s.is_scalar());
    }

    #[test]
    fn test_total_size_overflow() {
        let s = Shape::from([usize::MAX / 2, 3]);
        assert_eq!(s.checked_total_size(), None);
        assert_eq!(s.total_size(), usize::MAX);
        assert!(!s.is_scalar());
        assert_eq!(Shape::from([3, 4]).checked_total_size(), Some(12));
    }

    #[test]
    fn test_zero_dim() {
        assert!(Shape::from([3, 0]).has_zero_dim());
        assert!(!Shape::from([3, 1]).has_zero_dim());
    }

    #[test]
    fn test_dim_out_of_range() {
        let s = Shape::new(vec![2, 3]);
        assert!(matches!(
            s.dim(2),
            Err(TensorError::Index { index: 2, ndim: 2 })
        ));
    }

    #[test]
    fn test_empty_is_scalar() {
        let s = Shape::new(vec![]);
        assert_eq!(s.dims(), &[1]);
        assert_eq!(s.total_size(), 1);
        assert!(s.is_scalar());
        assert_eq!(s, Shape::scalar());
    }

    #[test]
    fn test_trailing_ones_equality() {
        for dims in [vec![3], vec![2, 5], vec![4, 1, 7], vec![1]] {
            let base = Shape::new(dims.clone());
            let mut one = dims.clone();
            one.push(1);
            let mut two = dims.clone();
            two.extend([1, 1]);
            assert_eq!(base, Shape::new(one));
            assert_eq!(base, Shape::new(two));
        }
        assert_ne!(Shape::from([3]), Shape::from([1, 3]));
        assert_ne!(Shape::from([2, 3]), Shape::from([3, 2]));
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(Shape::from([3, 1]));
        assert!(set.contains(&Shape::from([3])));
        assert!(set.contains(&Shape::from([3, 1, 1])));
    }

    #[test]
    fn test_slice() {
        let s = Shape::from([3, 2, 5]);
        assert_eq!(s.slice(1, 3).unwrap().dims(), &[2, 5]);
        assert_eq!(s.slice(0, 1).unwrap().dims(), &[3]);
        assert_eq!(s.slice(2, 2).unwrap().dims(), &[1]);
        assert!(matches!(s.slice(2, 1), Err(TensorError::Range { .. })));
        assert!(matches!(s.slice(0, 4), Err(TensorError::Range { .. })));
    }

    #[test]
    fn test_drop_prefix() {
        let s = Shape::from([3, 2, 5]);
        assert_eq!(s.drop_prefix(1).unwrap().dims(), &[2, 5]);
        assert_eq!(s.index_by_prefix(&[1, 0]).unwrap().dims(), &[5]);
        assert_eq!(s.drop_prefix(3).unwrap().dims(), &[1]);
        assert!(s.drop_prefix(4).is_err());
        assert_eq!(s.remove_leading_dimension().unwrap().dims(), &[2, 5]);
    }

    #[test]
    fn test_without_trailing_ones() {
        assert_eq!(Shape::from([3, 1, 1]).without_trailing_ones(), &[3]);
        assert_eq!(Shape::from([1, 1]).without_trailing_ones(), &[1]);
        assert_eq!(Shape::from([1, 4]).without_trailing_ones(), &[1, 4]);
    }

    #[test]
    fn test_strides() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.strides(), vec![12, 4, 1]);
        assert_eq!(Shape::scalar().strides(), vec![1]);
    }

    #[test]
    fn test_linear_index() {
        let s = Shape::from([3, 2, 5]);
        assert_eq!(s.linear_index(&[]).unwrap(), 0);
        assert_eq!(s.linear_index(&[1]).unwrap(), 1);
        assert_eq!(s.linear_index(&[1, 0]).unwrap(), 2);
        assert_eq!(s.linear_index(&[2, 1]).unwrap(), 5);
        assert_eq!(s.linear_index(&[2, 1, 4]).unwrap(), 29);
        assert!(matches!(
            s.linear_index(&[3]),
            Err(TensorError::OutOfBounds { index: 3, axis: 0, size: 3 })
        ));
        assert!(matches!(
            s.linear_index(&[0, 0, 0, 0]),
            Err(TensorError::Dimension { .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from([3, 2, 5]).to_string(), "[3, 2, 5]");
        assert_eq!(Shape::scalar().to_string(), "[1]");
    }
}
