//! Scalar types the engine can run on.
//!
//! Every numeric structure in the crate is generic over [`Real`], which is implemented for
//! `f32` and `f64`. Besides the usual floating point operations the trait carries the
//! precision-dependent constants the Gauss-Newton driver uses to decide when further
//! iterations cannot improve the result: single precision stops earlier than double
//! precision.

use num_traits::{Float, NumAssign};
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Floating point scalar usable by differentiable values, costs and solvers.
pub trait Real:
    Float + NumAssign + Debug + Display + Default + Sum + Send + Sync + 'static
{
    /// The solve terminates once `‖r‖²` drops below this value.
    const RESIDUAL_ERROR_STOPPING_CRITERION: Self;

    /// The solve terminates once `predicted_reduction / ‖r‖²` drops below this value.
    const PREDICTION_REDUCTION_STOPPING_CRITERION: Self;

    /// Relative residual tolerance used by iterative linear solvers.
    const LINEAR_SOLVER_TOLERANCE: Self;

    /// Widen to `f64` (lossless for both implementations).
    fn as_f64(self) -> f64;

    /// Narrow from `f64`.
    fn from_f64(value: f64) -> Self;
}

impl Real for f32 {
    const RESIDUAL_ERROR_STOPPING_CRITERION: Self = 1e-10;
    const PREDICTION_REDUCTION_STOPPING_CRITERION: Self = 1e-6;
    const LINEAR_SOLVER_TOLERANCE: Self = 1e-6;

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Real for f64 {
    const RESIDUAL_ERROR_STOPPING_CRITERION: Self = 1e-20;
    const PREDICTION_REDUCTION_STOPPING_CRITERION: Self = 1e-10;
    const LINEAR_SOLVER_TOLERANCE: Self = 1e-12;

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}
