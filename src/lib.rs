//! # sparse-nls
//!
//! Sparse nonlinear least squares: minimize `‖r(x)‖²` for residuals built from
//! forward-mode differentiable values.
//!
//! ## Building blocks
//!
//! - **Differentiable values**: [`DiffScalar`] and [`DiffVector`] carry a value and a sparse
//!   Jacobian; arithmetic propagates derivatives over the union of touched columns
//! - **Cost aggregation**: [`Cost`] stacks weighted residual terms into one problem
//! - **Normal equations**: [`NormalEquations`] forms `JᵀJ + λI` over the variables that
//!   influence the residual
//! - **Linear solvers**: sparse/dense Cholesky and Jacobi-preconditioned conjugate gradient
//!   behind the [`LinearSolver`] trait
//! - **Gauss-Newton**: [`GaussNewton`] with diagonal regularization, backtracking line search
//!   and precision-dependent stopping criteria, generic over `f32` and `f64`
//!
//! ## Example
//!
//! ```
//! use sparse_nls::{Cost, GaussNewton, GaussNewtonConfig, VectorContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Fit y = a·t + b to three points.
//! let data = [(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)];
//! let mut residual = |ctx: &VectorContext<f64>, with_jacobian: bool| {
//!     let a = ctx.variable(0, with_jacobian);
//!     let b = ctx.variable(1, with_jacobian);
//!     let mut cost = Cost::new();
//!     for &(t, y) in &data {
//!         let r = &a * t + &b - y;
//!         cost.add(sparse_nls::DiffVector::from_scalars([r]), 1.0);
//!     }
//!     cost.to_diff_data()
//! };
//!
//! let mut context = VectorContext::from_slice(&[0.0, 0.0]);
//! let result = GaussNewton::with_config(GaussNewtonConfig::new()).solve(&mut residual, &mut context)?;
//! assert!(result.is_converged());
//! assert!((context.values()[0] - 2.0).abs() < 1e-9);
//! assert!((context.values()[1] - 1.0).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod optimizer;

pub use crate::core::context::{Context, Evaluator, VectorContext};
pub use crate::core::cost::{Cost, CostTerm};
pub use crate::core::diff::{DiffScalar, DiffVector, SparseRow};
pub use crate::core::jacobian::SparseJacobian;
pub use crate::core::real::Real;
pub use error::{NlsError, NlsResult};

pub use linalg::{
    ConjugateGradientSolver, GramMatrix, LinearSolver, LinearSolverType, NormalEquations,
    SparseCholeskySolver, SparseMatrix,
};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::{GaussNewton, GaussNewtonConfig, OptimizationStatus, SolverResult};
