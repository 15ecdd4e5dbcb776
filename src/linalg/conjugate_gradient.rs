use nalgebra::DVector;
use tracing::debug;

use crate::core::real::Real;
use crate::linalg::{GramMatrix, LinAlgError, LinAlgResult, LinearSolver, check_dimensions};

/// Jacobi-preconditioned conjugate gradient.
///
/// Runs on the lower-triangle storage directly, in the working precision. Stops when the
/// residual norm falls below `T::LINEAR_SOLVER_TOLERANCE · ‖b‖` or after `max_iterations`,
/// returning the current iterate in both cases.
#[derive(Debug, Clone)]
pub struct ConjugateGradientSolver {
    max_iterations: usize,
    last_iterations: usize,
}

impl ConjugateGradientSolver {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            last_iterations: 0,
        }
    }
}

impl Default for ConjugateGradientSolver {
    fn default() -> Self {
        Self::new(50)
    }
}

fn dot<T: Real>(a: &DVector<T>, b: &DVector<T>) -> T {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

impl<T: Real> LinearSolver<T> for ConjugateGradientSolver {
    fn solve(&mut self, a: &GramMatrix<T>, b: &DVector<T>) -> LinAlgResult<DVector<T>> {
        check_dimensions(a, b)?;
        let n = a.dim();
        self.last_iterations = 0;

        let mut x = DVector::zeros(n);
        let b_norm = dot(b, b).sqrt();
        if b_norm == T::zero() {
            return Ok(x);
        }
        let threshold = T::LINEAR_SOLVER_TOLERANCE * b_norm;

        let inv_diag = a.diagonal().map(|d| {
            if d > T::zero() && d.is_finite() {
                T::one() / d
            } else {
                T::one()
            }
        });

        let mut r = b.clone();
        let mut z = r.component_mul(&inv_diag);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        for k in 0..self.max_iterations {
            let ap = a.symmetric_mul(&p);
            let curvature = dot(&p, &ap);
            if !(curvature > T::zero()) {
                return Err(LinAlgError::NotPositiveDefinite(format!(
                    "search direction curvature {curvature} at iteration {k}"
                ))
                .log());
            }

            let alpha = rz / curvature;
            x.axpy(alpha, &p, T::one());
            r.axpy(-alpha, &ap, T::one());
            self.last_iterations = k + 1;

            if dot(&r, &r).sqrt() <= threshold {
                break;
            }

            z = r.component_mul(&inv_diag);
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            p = &z + p * beta;
        }

        if self.last_iterations == self.max_iterations {
            debug!(
                "Conjugate gradient stopped after {} iterations, residual {:.3e}",
                self.max_iterations,
                dot(&r, &r).sqrt().as_f64()
            );
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(LinAlgError::NonFiniteSolution.log());
        }
        Ok(x)
    }

    fn last_iterations(&self) -> usize {
        self.last_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::SparseCholeskySolver;
    use crate::linalg::sparse::SparseMatrix;
    use nalgebra::DMatrix;

    const TOLERANCE: f64 = 1e-9;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn tridiagonal(n: usize) -> GramMatrix<f64> {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 4.0 + i as f64));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
        }
        GramMatrix::Sparse(SparseMatrix::from_triplets(n, n, &triplets))
    }

    #[test]
    fn test_matches_cholesky() -> TestResult {
        let a = tridiagonal(20);
        let b = DVector::from_fn(20, |i, _| (i as f64).sin());

        let mut cg = ConjugateGradientSolver::new(100);
        let mut direct = SparseCholeskySolver::new();
        let x_cg = cg.solve(&a, &b)?;
        let x_direct = direct.solve(&a, &b)?;

        assert!((x_cg - x_direct).norm() < TOLERANCE);
        assert!(LinearSolver::<f64>::last_iterations(&cg) > 0);
        Ok(())
    }

    #[test]
    fn test_iteration_budget_is_respected() -> TestResult {
        let a = tridiagonal(50);
        let b = DVector::from_element(50, 1.0);
        let mut cg = ConjugateGradientSolver::new(2);
        let x = cg.solve(&a, &b)?;
        assert_eq!(LinearSolver::<f64>::last_iterations(&cg), 2);
        assert!(x.iter().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn test_zero_rhs_returns_zero() -> TestResult {
        let mut cg = ConjugateGradientSolver::default();
        let x = cg.solve(&tridiagonal(3), &DVector::zeros(3))?;
        assert_eq!(x, DVector::zeros(3));
        Ok(())
    }

    #[test]
    fn test_dense_storage() -> TestResult {
        let a = GramMatrix::Dense(DMatrix::<f64>::from_row_slice(2, 2, &[4.0, 0.0, 2.0, 3.0]));
        let mut cg = ConjugateGradientSolver::default();
        let x = cg.solve(&a, &DVector::from_vec(vec![6.0, 5.0]))?;
        assert!((x[0] - 1.0).abs() < TOLERANCE);
        assert!((x[1] - 1.0).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_indefinite_matrix_is_rejected() {
        let a = GramMatrix::Dense(DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]));
        let mut cg = ConjugateGradientSolver::default();
        let result = cg.solve(&a, &DVector::from_vec(vec![0.0, 1.0]));
        assert!(matches!(result, Err(LinAlgError::NotPositiveDefinite(_))));
    }
}
