//! Optimization state and the evaluator callback.
//!
//! The solver never looks inside the state it optimizes. It only needs to read the current
//! values, put back a saved copy, and apply an additive update in the tangent space. That
//! surface is the [`Context`] trait. [`VectorContext`] is the plain `ℝⁿ` implementation.
//!
//! An [`Evaluator`] turns a context into a residual [`DiffVector`]. When `with_jacobian` is
//! false the evaluator may skip derivative work and return a constant vector. The line search
//! relies on that to evaluate trial steps cheaply.

use nalgebra::DVector;

use crate::core::diff::{DiffScalar, DiffVector};
use crate::core::jacobian::SparseJacobian;
use crate::core::real::Real;

/// Mutable optimization state.
pub trait Context<T: Real> {
    /// Snapshot of the current values.
    fn value(&self) -> DVector<T>;

    /// Dimension of the update vector (the number of Jacobian columns).
    fn update_size(&self) -> usize;

    /// Restore a snapshot previously returned by [`value`](Context::value).
    fn set(&mut self, values: &DVector<T>);

    /// Apply an update of length [`update_size`](Context::update_size).
    fn update(&mut self, delta: &DVector<T>);
}

/// Residual function over a context.
pub trait Evaluator<T: Real, C> {
    fn evaluate(&mut self, context: &C, with_jacobian: bool) -> DiffVector<T>;
}

impl<T, C, F> Evaluator<T, C> for F
where
    T: Real,
    F: FnMut(&C, bool) -> DiffVector<T>,
{
    fn evaluate(&mut self, context: &C, with_jacobian: bool) -> DiffVector<T> {
        self(context, with_jacobian)
    }
}

/// Flat vector of unknowns updated by plain addition.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorContext<T: Real> {
    values: DVector<T>,
}

impl<T: Real> VectorContext<T> {
    pub fn new(values: DVector<T>) -> Self {
        Self { values }
    }

    pub fn from_slice(values: &[T]) -> Self {
        Self::new(DVector::from_column_slice(values))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    /// All unknowns as a differentiable vector with an identity Jacobian.
    pub fn variables(&self, with_jacobian: bool) -> DiffVector<T> {
        let n = self.values.len();
        let jacobian = with_jacobian.then(|| SparseJacobian::identity(n, 0, n));
        DiffVector::new(self.values.clone(), jacobian)
    }

    /// Unknown `i` as a differentiable scalar.
    pub fn variable(&self, i: usize, with_jacobian: bool) -> DiffScalar<T> {
        if with_jacobian {
            DiffScalar::variable(self.values[i], i)
        } else {
            DiffScalar::constant(self.values[i])
        }
    }
}

impl<T: Real> Context<T> for VectorContext<T> {
    fn value(&self) -> DVector<T> {
        self.values.clone()
    }

    fn update_size(&self) -> usize {
        self.values.len()
    }

    fn set(&mut self, values: &DVector<T>) {
        assert_eq!(
            values.len(),
            self.values.len(),
            "snapshot length does not match the context"
        );
        self.values.copy_from(values);
    }

    fn update(&mut self, delta: &DVector<T>) {
        assert_eq!(
            delta.len(),
            self.values.len(),
            "update length does not match the context"
        );
        for (v, &d) in self.values.iter_mut().zip(delta.iter()) {
            *v += d;
        }
    }
}
