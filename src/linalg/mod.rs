pub mod cholesky;
pub mod conjugate_gradient;
pub mod normal_equations;
pub mod sparse;

use nalgebra::DVector;
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

use crate::core::real::Real;

pub use cholesky::SparseCholeskySolver;
pub use conjugate_gradient::ConjugateGradientSolver;
pub use normal_equations::{GramMatrix, NormalEquations};
pub use sparse::SparseMatrix;

/// Worker pool used for the dense Gram accumulation.
#[cfg(feature = "parallel")]
pub type ThreadPool = rayon::ThreadPool;

/// Serial stand-in used when the `parallel` feature is disabled: all work runs on the
/// calling thread.
#[cfg(not(feature = "parallel"))]
#[derive(Debug, Default)]
pub struct ThreadPool;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverType {
    #[default]
    SparseCholesky,
    ConjugateGradient,
}

impl Display for LinearSolverType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::SparseCholesky => write!(f, "Sparse Cholesky"),
            LinearSolverType::ConjugateGradient => write!(f, "Conjugate Gradient"),
        }
    }
}

/// Linear algebra specific error types
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// Singular or near-singular matrix detected
    #[error("Singular matrix detected (matrix is not invertible)")]
    SingularMatrix,

    /// Failed to create sparse matrix from triplets
    #[error("Failed to create sparse matrix: {0}")]
    SparseMatrixCreation(String),

    /// An iterative solver found a direction of non-positive curvature
    #[error("Matrix is not positive definite: {0}")]
    NotPositiveDefinite(String),

    /// The solver produced NaN or infinite values
    #[error("Linear solve produced a non-finite solution")]
    NonFiniteSolution,

    /// Right-hand side does not match the matrix dimension
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Matrix format conversion failed
    #[error("Matrix conversion failed: {0}")]
    MatrixConversion(String),
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| LinAlgError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    ///
    /// This method logs both the LinAlgError and the underlying error
    /// from external libraries (e.g., faer's LltError, CreationError).
    ///
    /// # Example
    /// ```ignore
    /// SymbolicLlt::try_new(matrix.symbolic(), Side::Lower)
    ///     .map_err(|e| {
    ///         LinAlgError::FactorizationFailed(
    ///             "Symbolic Cholesky decomposition failed".to_string()
    ///         )
    ///         .log_with_source(e)
    ///     })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Solver for the symmetric positive (semi-)definite systems `A · x = b` produced by
/// [`NormalEquations`]. `A` is passed by its lower triangle.
pub trait LinearSolver<T: Real> {
    /// Solve `A · x = b`.
    ///
    /// # Errors
    /// Returns `LinAlgError` if:
    /// - Matrix factorization fails
    /// - Matrix is singular or not positive definite
    /// - The solution is not finite
    fn solve(&mut self, a: &GramMatrix<T>, b: &DVector<T>) -> LinAlgResult<DVector<T>>;

    /// Iterations used by the last solve (1 for direct methods).
    fn last_iterations(&self) -> usize {
        1
    }
}

/// Construct the backend selected by `solver_type`.
pub fn create_linear_solver<T: Real>(
    solver_type: LinearSolverType,
    cg_iterations: usize,
) -> Box<dyn LinearSolver<T>> {
    match solver_type {
        LinearSolverType::SparseCholesky => Box::new(SparseCholeskySolver::new()),
        LinearSolverType::ConjugateGradient => {
            Box::new(ConjugateGradientSolver::new(cg_iterations))
        }
    }
}

pub(crate) fn check_dimensions<T: Real>(a: &GramMatrix<T>, b: &DVector<T>) -> LinAlgResult<()> {
    if a.dim() != b.len() {
        return Err(LinAlgError::DimensionMismatch(format!(
            "matrix is {0}x{0} but the right-hand side has length {1}",
            a.dim(),
            b.len()
        ))
        .log());
    }
    Ok(())
}
