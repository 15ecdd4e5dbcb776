//! Core modelling components of the least-squares engine
//!
//! This module contains everything needed to describe a problem:
//! - Scalar precision ([`real`])
//! - Forward-mode differentiable values ([`diff`]) and their sparse Jacobians ([`jacobian`])
//! - Weighted residual aggregation ([`cost`])
//! - The optimization state and evaluator callback ([`context`])

pub mod context;
pub mod cost;
pub mod diff;
pub mod jacobian;
pub mod real;

use thiserror::Error;
use tracing::error;

/// Core module error types
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A cost term weight is negative or not finite
    #[error("Invalid cost weight: {0}")]
    InvalidWeight(String),

    /// Dimension mismatch between residual, Jacobian and variables
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| CoreError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the underlying error that caused it
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
