//! Backtracking line search with quadratic interpolation.
//!
//! Given the pre-step state `x₀`, a full step `dx` and the squared residual norm
//! `φ(s) = ‖r(x₀ + s·dx)‖²`, the search starts at `s = 1` and shrinks `s` until the actual
//! reduction `φ(0) − φ(s)` reaches `α · s · predicted` (`α = 0.25`).
//!
//! Each new scale minimizes the quadratic through `φ(0)`, `φ'(0)` and `φ(s)`:
//!
//! ```text
//! s' = −φ'(0)·s² / (2·(φ(s) − φ(0) − φ'(0)·s))
//! ```
//!
//! A minimizer outside `(0, 1)` means the model no longer describes the residual and the
//! search fails. Minimizers at or below the floor (`0.05`) are replaced by `s / 2`.
//! Every trial is applied from `x₀` so scales never compound.

use nalgebra::DVector;
use tracing::trace;

use crate::core::context::{Context, Evaluator};
use crate::core::real::Real;
use crate::optimizer::{OptimizerError, OptimizerResult};

/// Accepted scale and the residual it produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchResult<T> {
    pub scale: T,
    /// `‖r‖²` at the accepted scale
    pub residual_error: T,
    /// `‖r(x₀)‖² − residual_error`
    pub actual_reduction: T,
    /// Backtracking iterations (0 when the full step was accepted)
    pub iterations: usize,
    /// Residual evaluations performed
    pub evaluations: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BacktrackingLineSearch<T> {
    max_iterations: usize,
    sufficient_decrease: T,
    interpolation_floor: T,
}

impl<T: Real> BacktrackingLineSearch<T> {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            sufficient_decrease: T::from_f64(0.25),
            interpolation_floor: T::from_f64(0.05),
        }
    }

    /// Search along `dx` from `x0`. On return the context holds `x0 + scale · dx`.
    ///
    /// `directional_derivative` is `φ'(0) = 2·rᵀJ·dx`.
    #[allow(clippy::too_many_arguments)]
    pub fn search<C, E>(
        &self,
        evaluator: &mut E,
        context: &mut C,
        x0: &DVector<T>,
        dx: &DVector<T>,
        initial_error: T,
        predicted_reduction: T,
        directional_derivative: T,
    ) -> OptimizerResult<LineSearchResult<T>>
    where
        C: Context<T>,
        E: Evaluator<T, C>,
    {
        let mut scale = T::one();
        let mut residual_error = apply(evaluator, context, x0, dx, scale);
        let mut evaluations = 1;
        let mut best = (scale, residual_error);
        let mut iterations = 0;

        while !(initial_error - residual_error
            >= self.sufficient_decrease * scale * predicted_reduction)
            && iterations < self.max_iterations
        {
            iterations += 1;
            let interpolated =
                interpolate_scale(initial_error, directional_derivative, scale, residual_error);
            if !(interpolated > T::zero() && interpolated < T::one()) {
                return Err(OptimizerError::LineSearchFailed {
                    scale: interpolated.as_f64(),
                }
                .log());
            }

            scale = if interpolated > self.interpolation_floor {
                interpolated
            } else {
                scale * T::from_f64(0.5)
            };
            residual_error = apply(evaluator, context, x0, dx, scale);
            evaluations += 1;
            trace!(
                "line search iteration {}: scale {:.4e}, error {:.6e}",
                iterations,
                scale.as_f64(),
                residual_error.as_f64()
            );

            if residual_error > best.1 {
                (scale, residual_error) = best;
                context.set(x0);
                context.update(&dx.map(|v| v * scale));
                break;
            }
            best = (scale, residual_error);
        }

        Ok(LineSearchResult {
            scale,
            residual_error,
            actual_reduction: initial_error - residual_error,
            iterations,
            evaluations,
        })
    }
}

/// Set the context to `x0 + scale · dx` and return the residual error there.
fn apply<T, C, E>(evaluator: &mut E, context: &mut C, x0: &DVector<T>, dx: &DVector<T>, scale: T) -> T
where
    T: Real,
    C: Context<T>,
    E: Evaluator<T, C>,
{
    context.set(x0);
    context.update(&dx.map(|v| v * scale));
    evaluator.evaluate(context, false).squared_norm()
}

/// Minimizer of the quadratic through `φ(0)`, `φ'(0)` and `φ(scale)`.
pub(crate) fn interpolate_scale<T: Real>(
    initial_error: T,
    directional_derivative: T,
    scale: T,
    error_at_scale: T,
) -> T {
    let two = T::one() + T::one();
    let curvature = two * (error_at_scale - initial_error - directional_derivative * scale);
    -directional_derivative * scale * scale / curvature
}
