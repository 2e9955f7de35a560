//! Operand validation for binary tensor operations.
//!
//! Every binary operation (arithmetic, block assignment, block comparison)
//! goes through [`resolve`] or [`plan`]: both operands must live on the same
//! backend, and their shapes are classified into a [`ShapeMatch`] that picks
//! the element-wise or broadcast-scalar kernel. The classification is a pure
//! function of the two shapes and their order.

use std::fmt;

use tracing::debug;

use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::view::View;

/// How two operand shapes relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeMatch {
    /// Canonically equal shapes; element-wise over every element.
    Equal,
    /// The left operand is a single element broadcast over the right.
    ScalarLhs,
    /// The right operand is a single element broadcast over the left.
    ScalarRhs,
    /// Different shapes with the same element count, treated as two flat
    /// sequences of that length. No dimension alignment is implied.
    EqualCount,
    /// None of the above.
    Incompatible,
}

impl fmt::Display for ShapeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeMatch::Equal => "equal",
            ShapeMatch::ScalarLhs => "scalar-lhs",
            ShapeMatch::ScalarRhs => "scalar-rhs",
            ShapeMatch::EqualCount => "equal-count",
            ShapeMatch::Incompatible => "incompatible",
        };
        f.write_str(name)
    }
}

/// Offsets and element count for executing a binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryPlan {
    pub lhs_offset: usize,
    pub rhs_offset: usize,
    pub count: usize,
    pub relation: ShapeMatch,
}

/// Classifies a shape pair. First match wins, in the order `Equal`,
/// `ScalarLhs`, `ScalarRhs`, `EqualCount`, `Incompatible`.
pub fn classify(lhs: &Shape, rhs: &Shape) -> ShapeMatch {
    if lhs == rhs {
        ShapeMatch::Equal
    } else if lhs.is_scalar() {
        ShapeMatch::ScalarLhs
    } else if rhs.is_scalar() {
        ShapeMatch::ScalarRhs
    } else if lhs.total_size() == rhs.total_size() {
        ShapeMatch::EqualCount
    } else {
        ShapeMatch::Incompatible
    }
}

/// Number of elements an operation touches under `relation`.
pub fn element_count(relation: ShapeMatch, lhs: &Shape, rhs: &Shape) -> usize {
    match relation {
        ShapeMatch::Equal | ShapeMatch::ScalarRhs | ShapeMatch::EqualCount => lhs.total_size(),
        ShapeMatch::ScalarLhs => rhs.total_size(),
        ShapeMatch::Incompatible => 0,
    }
}

/// Checks that both operands live on the same backend.
pub fn ensure_same_backend(lhs: &View<'_>, rhs: &View<'_>, op: &str) -> Result<()> {
    if lhs.backend() != rhs.backend() {
        return Err(TensorError::BackendMismatch {
            op: op.to_string(),
            lhs_backend: lhs.backend(),
            rhs_backend: rhs.backend(),
            lhs_shape: lhs.shape().clone(),
            rhs_shape: rhs.shape().clone(),
        });
    }
    Ok(())
}

/// Validates the backends and classifies the shapes. An `Incompatible`
/// pair is returned as a plan with `count == 0`; see [`resolve`] for the
/// variant that rejects it.
pub fn plan(lhs: &View<'_>, rhs: &View<'_>, op: &str) -> Result<BinaryPlan> {
    ensure_same_backend(lhs, rhs, op)?;

    let relation = classify(lhs.shape(), rhs.shape());
    let plan = BinaryPlan {
        lhs_offset: lhs.offset(),
        rhs_offset: rhs.offset(),
        count: element_count(relation, lhs.shape(), rhs.shape()),
        relation,
    };
    debug!(
        op,
        lhs = %lhs.shape(),
        rhs = %rhs.shape(),
        relation = %plan.relation,
        count = plan.count,
        "resolved binary operation"
    );
    Ok(plan)
}

/// Like [`plan`], but an `Incompatible` pair is an error naming both shapes
/// and the operation.
pub fn resolve(lhs: &View<'_>, rhs: &View<'_>, op: &str) -> Result<BinaryPlan> {
    let plan = plan(lhs, rhs, op)?;
    if plan.relation == ShapeMatch::Incompatible {
        return Err(TensorError::ShapeMismatch {
            op: op.to_string(),
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    Ok(plan)
}
