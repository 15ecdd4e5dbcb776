//! Error types for the sparse-nls library
//!
//! # Error Hierarchy
//!
//! - **`NlsError`** is the top-level error returned by [`GaussNewton::solve`]
//! - **Module errors** (`CoreError`, `LinAlgError`, `OptimizerError`) are wrapped inside it
//! - **Error sources** are preserved, allowing full error chain inspection
//!
//! Contract violations by the caller (mismatched buffer sizes, a missing Jacobian when one
//! was requested) are panics, not errors.
//!
//! [`GaussNewton::solve`]: crate::optimizer::GaussNewton::solve

use crate::{core::CoreError, linalg::LinAlgError, optimizer::OptimizerError};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the sparse-nls library
pub type NlsResult<T> = Result<T, NlsError>;

/// Main error type for the sparse-nls library
///
/// ```rust,ignore
/// if let Err(e) = solver.solve(&mut evaluator, &mut context) {
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum NlsError {
    /// Problem description errors (weights, dimensions)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Optimization algorithm errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),
}

impl NlsError {
    /// Get the full error chain as a string for logging and debugging.
    ///
    /// ```rust,ignore
    /// // Linear system solve failed at iteration 4
    /// //   → Singular matrix detected (matrix is not invertible)
    /// ```
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Get a compact single-line error chain for logging
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nls_error_display() {
        let error = NlsError::from(LinAlgError::SingularMatrix);
        assert!(error.to_string().contains("Singular matrix"));
    }

    #[test]
    fn test_nls_error_chain() {
        let error = NlsError::from(OptimizerError::LinearSolveFailed {
            iteration: 3,
            source: LinAlgError::FactorizationFailed("Cholesky factorization failed".to_string()),
        });

        let chain = error.chain();
        assert!(chain.contains("solve failed at iteration 3"));
        assert!(chain.contains("Cholesky"));
        assert!(chain.contains('→'));
        assert_eq!(chain.lines().count(), 2);
    }

    #[test]
    fn test_nls_error_chain_compact() {
        let error = NlsError::from(CoreError::InvalidWeight("weight -1".to_string()));
        let chain_compact = error.chain_compact();
        assert!(chain_compact.contains("weight -1"));
        assert!(!chain_compact.contains('\n'));
    }

    #[test]
    fn test_transparent_error_conversion() {
        let error: NlsError = OptimizerError::LineSearchFailed { scale: 1.5 }.into();
        match error {
            NlsError::Optimizer(OptimizerError::LineSearchFailed { scale }) => {
                assert_eq!(scale, 1.5)
            }
            _ => panic!("Expected Optimizer variant"),
        }
    }
}
