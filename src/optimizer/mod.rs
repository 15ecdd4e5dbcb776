//! Gauss-Newton optimization for sparse nonlinear least squares problems.
//!
//! - [`GaussNewton`]: the damped Gauss-Newton driver
//! - [`line_search`]: backtracking with quadratic interpolation used to scale each step

use crate::linalg::LinAlgError;
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;
use web_time as time;

pub mod gauss_newton;
pub mod line_search;

pub use gauss_newton::{GaussNewton, GaussNewtonConfig, IterationStats};
pub use line_search::{BacktrackingLineSearch, LineSearchResult};

/// Optimizer-specific error types
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Linear system solve failed during optimization
    #[error("Linear system solve failed at iteration {iteration}")]
    LinearSolveFailed {
        iteration: usize,
        #[source]
        source: LinAlgError,
    },

    /// Quadratic interpolation in the line search produced a scale outside (0, 1)
    #[error("Line search interpolation broke down: step scale {scale:.6e} is outside (0, 1)")]
    LineSearchFailed { scale: f64 },

    /// Invalid optimization parameters provided
    #[error("Invalid optimization parameters: {0}")]
    InvalidParameters(String),
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// config.validate().map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the error that caused it
    ///
    /// # Example
    /// ```ignore
    /// solver.solve(&gram, &rhs).map_err(|e| {
    ///     OptimizerError::LinearSolveFailed { iteration, source: e.clone() }.log_with_source(e)
    /// })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Why a solve stopped. Every status is a successful return; numerical failures are
/// reported as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// `‖r‖²` fell below the residual stopping criterion
    Converged,
    /// The linear model predicted a negligible relative reduction
    PredictedReductionTooSmall,
    /// The line search could not reduce the residual; the last step was rolled back
    NoFurtherReduction,
    /// Maximum number of iterations reached
    MaxIterationsReached,
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Converged => write!(f, "Converged"),
            OptimizationStatus::PredictedReductionTooSmall => {
                write!(f, "Predicted reduction too small")
            }
            OptimizationStatus::NoFurtherReduction => write!(f, "No further reduction"),
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
        }
    }
}

/// Detailed convergence information.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceInfo {
    /// L2 norm of the last accepted step (after line-search scaling)
    pub final_step_norm: f64,
    /// Residual-only evaluations
    pub residual_evaluations: usize,
    /// Residual + Jacobian evaluations
    pub jacobian_evaluations: usize,
    /// Backtracking iterations summed over the solve
    pub line_search_iterations: usize,
    /// Linear solver iterations summed over the solve
    pub linear_solver_iterations: usize,
}

impl Display for ConvergenceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Final step norm: {:.2e}, Residual evaluations: {}, Jacobian evaluations: {}, Line search iterations: {}, Linear solver iterations: {}",
            self.final_step_norm,
            self.residual_evaluations,
            self.jacobian_evaluations,
            self.line_search_iterations,
            self.linear_solver_iterations
        )
    }
}

/// Result of a solver execution. The optimized values live in the caller's context.
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Final optimization status
    pub status: OptimizationStatus,
    /// `‖r‖²` at the starting point
    pub initial_cost: f64,
    /// `‖r‖²` at the returned point
    pub final_cost: f64,
    /// Number of accepted steps
    pub iterations: usize,
    /// Total time elapsed
    pub elapsed_time: time::Duration,
    /// Convergence statistics
    pub convergence_info: ConvergenceInfo,
    /// Per-iteration statistics
    pub iteration_history: Vec<IterationStats>,
}

impl SolverResult {
    /// True when a stopping criterion was met, false for a plateau or an exhausted budget.
    pub fn is_converged(&self) -> bool {
        matches!(
            self.status,
            OptimizationStatus::Converged | OptimizationStatus::PredictedReductionTooSmall
        )
    }
}

impl Display for SolverResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Gauss-Newton Final Result")?;
        if self.is_converged() {
            writeln!(f, "CONVERGED ({})", self.status)?;
        } else {
            writeln!(f, "STOPPED ({})", self.status)?;
        }
        writeln!(f)?;
        writeln!(f, "Cost:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_cost)?;
        writeln!(f, "  Final:     {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.max(1e-12)
        )?;
        writeln!(f)?;
        writeln!(f, "Iterations:")?;
        writeln!(f, "  Total: {}", self.iterations)?;
        writeln!(f, "  {}", self.convergence_info)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(
            f,
            "  Total time: {:.2}ms",
            self.elapsed_time.as_secs_f64() * 1000.0
        )?;
        Ok(())
    }
}
