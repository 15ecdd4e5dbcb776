//! Damped Gauss-Newton with backtracking line search.
//!
//! The driver minimizes `‖r(x)‖²` for a residual produced by an [`Evaluator`] over a
//! [`Context`]. Each iteration:
//!
//! 1. Evaluates `r` and its Jacobian `J` at the current state.
//! 2. Stops if `‖r‖²` is below [`Real::RESIDUAL_ERROR_STOPPING_CRITERION`].
//! 3. Builds `(JᵀJ + λI) · dx = −Jᵀr` over the variables that influence `r`
//!    (see [`NormalEquations`]) and solves it with the configured backend.
//! 4. Stops if the predicted reduction `rhsᵀ·dx − λ‖dx‖²` relative to `‖r‖²` is below
//!    [`Real::PREDICTION_REDUCTION_STOPPING_CRITERION`].
//! 5. Scales the step with a [`BacktrackingLineSearch`] and accepts it if it reduced the
//!    residual. Otherwise the pre-step state is restored and the solve ends on a plateau.
//!
//! Running out of iterations and stopping on a plateau both return `Ok`: the context then
//! holds the best state found so far. Errors are reserved for numerical failures of the
//! linear solve or the line search model.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use sparse_nls::core::context::VectorContext;
//! use sparse_nls::core::diff::DiffVector;
//! use sparse_nls::optimizer::{GaussNewton, GaussNewtonConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut context = VectorContext::from_slice(&[0.0, 0.0]);
//! let target = DVector::from_vec(vec![3.0, -1.0]);
//! let mut residual = |ctx: &VectorContext<f64>, with_jacobian: bool| {
//!     ctx.variables(with_jacobian) - DiffVector::constant(target.clone())
//! };
//!
//! let mut solver = GaussNewton::with_config(GaussNewtonConfig::new().with_iterations(5));
//! let result = solver.solve(&mut residual, &mut context)?;
//! assert!(result.is_converged());
//! assert!((context.values()[0] - 3.0).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use web_time as time;

use crate::core::CoreError;
use crate::core::context::{Context, Evaluator};
use crate::core::real::Real;
use crate::error::NlsResult;
use crate::linalg::{self, LinearSolver, NormalEquations, ThreadPool};
use crate::optimizer::{
    BacktrackingLineSearch, ConvergenceInfo, OptimizationStatus, OptimizerError, OptimizerResult,
    SolverResult,
};

/// Per-iteration statistics for detailed logging (Ceres-style output).
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Iteration number (1-indexed, one per accepted step)
    pub iteration: usize,
    /// `‖r‖²` after the step
    pub cost: f64,
    /// Actual reduction of `‖r‖²` achieved by the step
    pub cost_change: f64,
    /// Reduction predicted by the linear model for the full step
    pub predicted_reduction: f64,
    /// L2 norm of the applied (scaled) step
    pub step_norm: f64,
    /// Line search scale applied to the Gauss-Newton step
    pub step_scale: f64,
    /// Backtracking iterations
    pub ls_iter: usize,
    /// Linear solver iterations (1 for direct solvers)
    pub linear_iter: usize,
    /// Time taken for this iteration in milliseconds
    pub iter_time_ms: f64,
    /// Total elapsed time since the solve started in milliseconds
    pub total_time_ms: f64,
}

impl IterationStats {
    /// Print table header in Ceres-style format
    pub fn print_header() {
        debug!(
            "{:>4}  {:>13}  {:>13}  {:>13}  {:>11}  {:>9}  {:>7}  {:>8}  {:>11}  {:>13}",
            "iter",
            "cost",
            "cost_change",
            "predicted",
            "|step|",
            "scale",
            "ls_iter",
            "lin_iter",
            "iter_time",
            "total_time"
        );
    }

    pub fn print_line(&self) {
        debug!(
            "{:>4}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>11.2e}  {:>9.3}  {:>7}  {:>8}  {:>9.2}ms  {:>11.2}ms",
            self.iteration,
            self.cost,
            self.cost_change,
            self.predicted_reduction,
            self.step_norm,
            self.step_scale,
            self.ls_iter,
            self.linear_iter,
            self.iter_time_ms,
            self.total_time_ms
        );
    }
}

/// Configuration parameters for the Gauss-Newton driver.
///
/// ```
/// use sparse_nls::linalg::LinearSolverType;
/// use sparse_nls::optimizer::GaussNewtonConfig;
///
/// let config = GaussNewtonConfig::new()
///     .with_iterations(20)
///     .with_reg(1e-3)
///     .with_linear_solver_type(LinearSolverType::ConjugateGradient)
///     .with_cg_iterations(100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GaussNewtonConfig {
    /// Type of linear solver for the normal equations
    pub linear_solver_type: linalg::LinearSolverType,
    /// Maximum number of outer iterations
    pub iterations: usize,
    /// Diagonal regularization `λ` added to `JᵀJ`; 0 disables it
    pub reg: f64,
    /// Iteration budget of the conjugate gradient backend, ignored by direct solvers
    pub cg_iterations: usize,
    /// Backtracking budget per outer iteration
    pub max_line_search_iterations: usize,
    /// Accumulate `JᵀJ` densely when the compacted Jacobian has at least as many rows as
    /// columns
    pub optimize_for_rectangular_dense_jacobian: bool,
    /// Log an info message when the solve stops because no step reduced the residual
    pub log_plateau: bool,
}

impl Default for GaussNewtonConfig {
    fn default() -> Self {
        Self {
            linear_solver_type: linalg::LinearSolverType::default(),
            iterations: 10,
            reg: 0.0,
            cg_iterations: 50,
            max_line_search_iterations: 10,
            optimize_for_rectangular_dense_jacobian: false,
            log_plateau: false,
        }
    }
}

impl GaussNewtonConfig {
    /// Create a new Gauss-Newton configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the linear solver type
    pub fn with_linear_solver_type(mut self, linear_solver_type: linalg::LinearSolverType) -> Self {
        self.linear_solver_type = linear_solver_type;
        self
    }

    /// Set the maximum number of iterations
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the diagonal regularization
    pub fn with_reg(mut self, reg: f64) -> Self {
        self.reg = reg;
        self
    }

    /// Set the conjugate gradient iteration budget
    pub fn with_cg_iterations(mut self, cg_iterations: usize) -> Self {
        self.cg_iterations = cg_iterations;
        self
    }

    /// Set the backtracking budget per iteration
    pub fn with_max_line_search_iterations(mut self, max_line_search_iterations: usize) -> Self {
        self.max_line_search_iterations = max_line_search_iterations;
        self
    }

    /// Enable or disable dense `JᵀJ` accumulation for tall Jacobians
    pub fn with_optimize_for_rectangular_dense_jacobian(mut self, enable: bool) -> Self {
        self.optimize_for_rectangular_dense_jacobian = enable;
        self
    }

    /// Enable or disable the plateau message
    pub fn with_log_plateau(mut self, log_plateau: bool) -> Self {
        self.log_plateau = log_plateau;
        self
    }

    /// Check that the parameters describe a solvable configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if !(self.reg.is_finite() && self.reg >= 0.0) {
            return Err(OptimizerError::InvalidParameters(format!(
                "reg must be finite and non-negative, got {}",
                self.reg
            ))
            .log());
        }
        if self.linear_solver_type == linalg::LinearSolverType::ConjugateGradient
            && self.cg_iterations == 0
        {
            return Err(OptimizerError::InvalidParameters(
                "cg_iterations must be positive for the conjugate gradient solver".to_string(),
            )
            .log());
        }
        Ok(())
    }

    /// Print configuration parameters (debug level logging)
    pub fn print_configuration(&self) {
        debug!(
            "\nConfiguration:\n  Solver:        Gauss-Newton\n  Linear solver: {}\n  Iterations:    {}\n  Regularization:      {:.2e}\n  CG iterations:       {}\n  Line search budget:  {}\n  Dense rectangular:   {}\n  Plateau logging:     {}",
            self.linear_solver_type,
            self.iterations,
            self.reg,
            self.cg_iterations,
            self.max_line_search_iterations,
            if self.optimize_for_rectangular_dense_jacobian {
                "enabled"
            } else {
                "disabled"
            },
            if self.log_plateau {
                "enabled"
            } else {
                "disabled"
            }
        );
    }
}

/// Gauss-Newton solver over a generic [`Context`].
///
/// The linear solver is created from the configuration once and reused by every
/// [`solve`](GaussNewton::solve) on this instance, so a direct backend keeps its symbolic
/// factorization while the sparsity pattern stays the same.
pub struct GaussNewton<T: Real> {
    config: GaussNewtonConfig,
    linear_solver: Box<dyn LinearSolver<T>>,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl<T: Real> fmt::Debug for GaussNewton<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaussNewton")
            .field("config", &self.config)
            .field("thread_pool", &self.thread_pool.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Real> Default for GaussNewton<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> GaussNewton<T> {
    /// Create a new Gauss-Newton solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(GaussNewtonConfig::default())
    }

    /// Create a new Gauss-Newton solver with the given configuration.
    pub fn with_config(config: GaussNewtonConfig) -> Self {
        let linear_solver =
            linalg::create_linear_solver(config.linear_solver_type, config.cg_iterations);
        Self {
            config,
            linear_solver,
            thread_pool: None,
        }
    }

    /// Run the dense `JᵀJ` accumulation on `pool`.
    ///
    /// Only used when [`GaussNewtonConfig::optimize_for_rectangular_dense_jacobian`] selects
    /// the dense path.
    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    pub fn config(&self) -> &GaussNewtonConfig {
        &self.config
    }

    /// Minimize `‖r‖²` starting from the current state of `context`.
    ///
    /// On `Ok` the context holds the final state. On `Err` it holds the state at the start
    /// of the failing iteration.
    ///
    /// # Panics
    /// If the evaluator returns no Jacobian when one is requested.
    pub fn solve<C, E>(&mut self, evaluator: &mut E, context: &mut C) -> NlsResult<SolverResult>
    where
        C: Context<T>,
        E: Evaluator<T, C>,
    {
        self.config.validate()?;

        let start_time = time::Instant::now();
        let debug_enabled = tracing::enabled!(tracing::Level::DEBUG);
        if debug_enabled {
            self.config.print_configuration();
            IterationStats::print_header();
        }

        let reg = T::from_f64(self.config.reg);
        let line_search = BacktrackingLineSearch::new(self.config.max_line_search_iterations);
        let pool = self.thread_pool.clone();

        let mut info = ConvergenceInfo::default();
        let mut history = Vec::with_capacity(self.config.iterations);
        let mut status = OptimizationStatus::MaxIterationsReached;
        let mut initial_error: Option<T> = None;
        let mut current_error: Option<T> = None;
        let mut iterations = 0;

        while iterations < self.config.iterations {
            let iter_start = time::Instant::now();

            let (residual, jacobian) = evaluator.evaluate(context, true).into_parts();
            info.jacobian_evaluations += 1;
            let error = residual.dot(&residual);
            initial_error.get_or_insert(error);
            current_error = Some(error);

            let Some(jacobian) = jacobian else {
                panic!("the evaluator returned no Jacobian although one was requested");
            };
            if error < T::RESIDUAL_ERROR_STOPPING_CRITERION {
                status = OptimizationStatus::Converged;
                break;
            }

            let update_size = context.update_size();
            if jacobian.cols() > update_size {
                return Err(CoreError::DimensionMismatch(format!(
                    "Jacobian has {} columns but the context update size is {}",
                    jacobian.cols(),
                    update_size
                ))
                .log()
                .into());
            }

            let normal_equations = NormalEquations::build(
                &jacobian,
                &residual,
                update_size,
                reg,
                self.config.optimize_for_rectangular_dense_jacobian,
                pool.as_deref(),
            )?;
            let compact_step = self
                .linear_solver
                .solve(&normal_equations.gram, &normal_equations.rhs)
                .map_err(|e| {
                    OptimizerError::LinearSolveFailed {
                        iteration: iterations + 1,
                        source: e.clone(),
                    }
                    .log_with_source(e)
                })?;
            let linear_iter = self.linear_solver.last_iterations();
            info.linear_solver_iterations += linear_iter;

            let predicted_reduction = normal_equations.predicted_reduction(&compact_step, reg);
            if predicted_reduction / error < T::PREDICTION_REDUCTION_STOPPING_CRITERION {
                status = OptimizationStatus::PredictedReductionTooSmall;
                break;
            }

            // φ'(0) = 2·rᵀJ·dx = −2·rhsᵀ·dx
            let rhs_dot_step = normal_equations.rhs.dot(&compact_step);
            let directional_derivative = -(rhs_dot_step + rhs_dot_step);
            let step = normal_equations.expand(&compact_step);

            let x0 = context.value();
            let search = match line_search.search(
                evaluator,
                context,
                &x0,
                &step,
                error,
                predicted_reduction,
                directional_derivative,
            ) {
                Ok(search) => search,
                Err(e) => {
                    context.set(&x0);
                    return Err(e.into());
                }
            };
            info.residual_evaluations += search.evaluations;
            info.line_search_iterations += search.iterations;

            if !(search.actual_reduction > T::zero()) {
                context.set(&x0);
                if self.config.log_plateau {
                    info!(
                        "Gauss-Newton stopped after {} iterations: no further reduction of {:.6e} although the stopping criteria were not met",
                        iterations,
                        error.as_f64()
                    );
                }
                status = OptimizationStatus::NoFurtherReduction;
                break;
            }

            iterations += 1;
            current_error = Some(search.residual_error);
            let step_norm = step.dot(&step).sqrt().as_f64() * search.scale.as_f64();
            info.final_step_norm = step_norm;

            let stats = IterationStats {
                iteration: iterations,
                cost: search.residual_error.as_f64(),
                cost_change: search.actual_reduction.as_f64(),
                predicted_reduction: predicted_reduction.as_f64(),
                step_norm,
                step_scale: search.scale.as_f64(),
                ls_iter: search.iterations,
                linear_iter,
                iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
            };
            if debug_enabled {
                stats.print_line();
            }
            history.push(stats);
        }

        let final_error = match current_error {
            Some(error) => error,
            None => {
                info.residual_evaluations += 1;
                evaluator.evaluate(context, false).squared_norm()
            }
        };

        let result = SolverResult {
            status,
            initial_cost: initial_error.unwrap_or(final_error).as_f64(),
            final_cost: final_error.as_f64(),
            iterations,
            elapsed_time: start_time.elapsed(),
            convergence_info: info,
            iteration_history: history,
        };
        if debug_enabled {
            debug!("{}", result);
        }
        Ok(result)
    }
}
