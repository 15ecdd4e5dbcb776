//! Weighted sum of squared residual terms.
//!
//! A [`Cost`] holds an ordered list of [`CostTerm`]s and represents
//!
//! ```text
//! E(x) = Σₖ wₖ ‖rₖ(x)‖²
//! ```
//!
//! Each term is stored unscaled; the weight is applied as `√wₖ` whenever the cost is flattened
//! into one residual vector or fed into Jacobian products. Terms may disagree on their Jacobian
//! width: a narrower Jacobian is treated as zero-padded to the widest one.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::core::diff::DiffVector;
use crate::core::real::Real;
use crate::core::{CoreError, CoreResult};
use crate::linalg::sparse::SparseMatrix;
use crate::linalg::{LinAlgResult, ThreadPool};

/// One weighted residual block.
#[derive(Debug, Clone, PartialEq)]
pub struct CostTerm<T: Real> {
    pub residual: DiffVector<T>,
    pub weight: T,
    pub name: Option<String>,
}

impl<T: Real> CostTerm<T> {
    pub fn rows(&self) -> usize {
        self.residual.len()
    }

    /// Jacobian width, 0 for a constant term.
    pub fn cols(&self) -> usize {
        self.residual.jacobian().map_or(0, |j| j.cols())
    }

    /// `w · ‖r‖²`
    pub fn squared_norm(&self) -> T {
        self.weight * self.residual.squared_norm()
    }

    fn sqrt_weight(&self) -> T {
        self.weight.sqrt()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cost<T: Real> {
    terms: Vec<CostTerm<T>>,
}

impl<T: Real> Cost<T> {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    /// Append a term.
    ///
    /// # Panics
    /// If `weight` is negative or not finite. Use [`try_add`](Self::try_add) to get an error
    /// instead.
    pub fn add(&mut self, residual: DiffVector<T>, weight: T) {
        if let Err(e) = self.try_add(residual, weight) {
            panic!("{e}");
        }
    }

    /// Append a term after validating its weight.
    pub fn try_add(&mut self, residual: DiffVector<T>, weight: T) -> CoreResult<()> {
        self.push_term(residual, weight, None)
    }

    /// Append a term with a label used in diagnostics.
    pub fn add_named(
        &mut self,
        name: impl Into<String>,
        residual: DiffVector<T>,
        weight: T,
    ) -> CoreResult<()> {
        self.push_term(residual, weight, Some(name.into()))
    }

    fn push_term(&mut self, residual: DiffVector<T>, weight: T, name: Option<String>) -> CoreResult<()> {
        if !(weight.is_finite() && weight >= T::zero()) {
            return Err(CoreError::InvalidWeight(format!(
                "term {} ({}) has weight {weight}",
                self.terms.len(),
                name.as_deref().unwrap_or("unnamed")
            ))
            .log());
        }
        if residual.value().iter().any(|v| !v.is_finite()) {
            warn!(
                "Cost term {} ({}) has a non-finite residual",
                self.terms.len(),
                name.as_deref().unwrap_or("unnamed")
            );
        }
        self.terms.push(CostTerm {
            residual,
            weight,
            name,
        });
        Ok(())
    }

    /// Move all terms of `other` to the end of this cost.
    pub fn append(&mut self, other: Cost<T>) {
        self.terms.extend(other.terms);
    }

    pub fn terms(&self) -> &[CostTerm<T>] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Total residual rows.
    pub fn rows(&self) -> usize {
        self.terms.iter().map(CostTerm::rows).sum()
    }

    /// Widest Jacobian across terms.
    pub fn cols(&self) -> usize {
        self.terms.iter().map(CostTerm::cols).max().unwrap_or(0)
    }

    /// True when every term carries a Jacobian. One constant term makes the whole aggregate
    /// Jacobian-free.
    pub fn has_jacobian(&self) -> bool {
        self.terms.iter().all(|t| t.residual.has_jacobian())
    }

    /// Stacked weighted residual `[√w₀ r₀; √w₁ r₁; …]`.
    pub fn value(&self) -> DVector<T> {
        let mut out = DVector::zeros(self.rows());
        let mut offset = 0;
        for term in &self.terms {
            let s = term.sqrt_weight();
            for (k, &r) in term.residual.value().iter().enumerate() {
                out[offset + k] = s * r;
            }
            offset += term.rows();
        }
        out
    }

    /// `Σ wₖ ‖rₖ‖²`
    pub fn squared_norm(&self) -> T {
        self.terms.iter().map(CostTerm::squared_norm).sum()
    }

    /// Flatten into one weighted residual vector with a stacked, zero-padded Jacobian.
    ///
    /// The result has no Jacobian unless [`has_jacobian`](Self::has_jacobian) holds.
    pub fn to_diff_data(&self) -> DiffVector<T> {
        if !self.has_jacobian() {
            return DiffVector::constant(self.value());
        }
        let parts: Vec<DiffVector<T>> = self
            .terms
            .iter()
            .map(|t| t.residual.scaled(t.sqrt_weight()))
            .collect();
        DiffVector::vstack(&parts)
    }

    /// `out += scale · J · x` for the weighted stacked Jacobian.
    ///
    /// # Panics
    /// If `out.len() != rows()` or `x.len() != cols()`.
    pub fn add_jx(&self, out: &mut DVector<T>, x: &DVector<T>, scale: T) {
        assert_eq!(out.len(), self.rows(), "output length must equal the cost rows");
        assert_eq!(x.len(), self.cols(), "input length must equal the cost columns");
        let (out, x) = (out.as_mut_slice(), x.as_slice());
        let mut offset = 0;
        for term in &self.terms {
            let rows = term.rows();
            if let Some(j) = term.residual.jacobian() {
                j.add_jx(
                    &mut out[offset..offset + rows],
                    &x[..j.cols()],
                    scale * term.sqrt_weight(),
                );
            }
            offset += rows;
        }
    }

    /// `out += scale · Jᵀ · x` for the weighted stacked Jacobian.
    ///
    /// # Panics
    /// If `out.len() != cols()` or `x.len() != rows()`.
    pub fn add_jtx(&self, out: &mut DVector<T>, x: &DVector<T>, scale: T) {
        assert_eq!(out.len(), self.cols(), "output length must equal the cost columns");
        assert_eq!(x.len(), self.rows(), "input length must equal the cost rows");
        let (out, x) = (out.as_mut_slice(), x.as_slice());
        let mut offset = 0;
        for term in &self.terms {
            let rows = term.rows();
            if let Some(j) = term.residual.jacobian() {
                j.add_jtx(
                    &mut out[..j.cols()],
                    &x[offset..offset + rows],
                    scale * term.sqrt_weight(),
                );
            }
            offset += rows;
        }
    }

    /// Lower triangle of `scale · Σ wₖ Jₖᵀ Jₖ` added into a dense `cols × cols` matrix.
    ///
    /// # Panics
    /// If `out` is not `cols() × cols()`.
    pub fn add_dense_jtj_lower(
        &self,
        out: &mut DMatrix<T>,
        scale: T,
        pool: Option<&ThreadPool>,
    ) -> LinAlgResult<()> {
        let n = self.cols();
        assert_eq!(
            (out.nrows(), out.ncols()),
            (n, n),
            "dense Gram output must be {n}x{n}"
        );
        for term in &self.terms {
            if let Some(j) = term.residual.jacobian() {
                j.add_dense_jtj_lower(out, scale * term.weight, pool)?;
            }
        }
        Ok(())
    }

    /// Lower triangle of `scale · Σ wₖ Jₖᵀ Jₖ` added into a sparse `cols × cols` matrix.
    ///
    /// # Panics
    /// If `out` is not `cols() × cols()`.
    pub fn add_sparse_jtj_lower(&self, out: &mut SparseMatrix<T>, scale: T) -> LinAlgResult<()> {
        let n = self.cols();
        assert_eq!(
            (out.rows(), out.cols()),
            (n, n),
            "sparse Gram output must be {n}x{n}"
        );
        for term in &self.terms {
            if let Some(j) = term.residual.jacobian() {
                j.add_sparse_jtj_lower(out, scale * term.weight)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diff::DiffScalar;

    const TOLERANCE: f64 = 1e-12;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn linear_term(coeffs: &[(usize, f64)], constant: f64) -> DiffVector<f64> {
        let mut s = DiffScalar::constant(constant);
        for &(col, c) in coeffs {
            s = s + DiffScalar::variable(1.0, col) * c;
        }
        DiffVector::from_scalars([s])
    }

    fn two_term_cost() -> Cost<f64> {
        let mut cost = Cost::new();
        cost.add(linear_term(&[(0, 1.0)], 1.0), 4.0);
        cost.add(linear_term(&[(0, 2.0), (2, -1.0)], 0.0), 1.0);
        cost
    }

    #[test]
    fn test_weight_scales_value_and_jacobian_by_sqrt() {
        let mut cost = Cost::new();
        cost.add(linear_term(&[(1, 3.0)], 0.0), 4.0);
        let flat = cost.to_diff_data();
        assert!((flat.value()[0] - 6.0).abs() < TOLERANCE);
        assert!((flat.jacobian().unwrap().matrix().get(0, 1) - 6.0).abs() < TOLERANCE);
        assert!((cost.squared_norm() - 36.0).abs() < TOLERANCE);
        assert!((flat.squared_norm() - cost.squared_norm()).abs() < TOLERANCE);
    }

    #[test]
    fn test_shape_takes_widest_jacobian() {
        let cost = two_term_cost();
        assert_eq!(cost.rows(), 2);
        assert_eq!(cost.cols(), 3);
        let flat = cost.to_diff_data();
        let j = flat.jacobian().unwrap();
        assert_eq!((j.rows(), j.cols()), (2, 3));
        assert_eq!(j.matrix().get(0, 0), 2.0);
        assert_eq!(j.matrix().get(1, 2), -1.0);
    }

    #[test]
    fn test_products_match_flattened_jacobian() {
        let cost = two_term_cost();
        let flat = cost.to_diff_data();
        let dense = flat.jacobian().unwrap().matrix().to_dense();

        let x = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let mut jx = DVector::zeros(2);
        cost.add_jx(&mut jx, &x, 1.0);
        assert!((jx - &dense * &x).norm() < TOLERANCE);

        let y = DVector::from_vec(vec![0.3, -0.7]);
        let mut jty = DVector::zeros(3);
        cost.add_jtx(&mut jty, &y, 2.0);
        assert!((jty - dense.transpose() * &y * 2.0).norm() < TOLERANCE);
    }

    #[test]
    fn test_dense_and_sparse_gram_agree() -> TestResult {
        let cost = two_term_cost();
        let flat = cost.to_diff_data();
        let dense_j = flat.jacobian().unwrap().matrix().to_dense();
        let expected = dense_j.transpose() * &dense_j;

        let mut dense = DMatrix::zeros(3, 3);
        cost.add_dense_jtj_lower(&mut dense, 1.0, None)?;
        let mut sparse = SparseMatrix::zeros(3, 3);
        cost.add_sparse_jtj_lower(&mut sparse, 1.0)?;

        for i in 0..3 {
            for j in 0..=i {
                assert!((dense[(i, j)] - expected[(i, j)]).abs() < TOLERANCE);
                assert!((sparse.get(i, j) - expected[(i, j)]).abs() < TOLERANCE);
            }
        }
        Ok(())
    }

    #[test]
    fn test_one_constant_term_drops_aggregate_jacobian() {
        let mut cost = Cost::new();
        cost.add(DiffVector::constant(DVector::from_vec(vec![1.0, 2.0])), 1.0);
        cost.add(linear_term(&[(1, 1.0)], 0.0), 1.0);
        assert!(!cost.has_jacobian());
        let flat = cost.to_diff_data();
        assert!(!flat.has_jacobian());
        assert_eq!(flat.len(), 3);

        // Products still see the constant term as a zero block.
        let mut jx = DVector::zeros(3);
        cost.add_jx(&mut jx, &DVector::from_vec(vec![0.0, 2.0]), 1.0);
        assert_eq!(jx.as_slice(), &[0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_empty_cost_is_differentiable() {
        let cost = Cost::<f64>::new();
        assert!(cost.has_jacobian());
        let flat = cost.to_diff_data();
        assert_eq!(flat.has_jacobian(), cost.has_jacobian());
        assert!(flat.is_empty());
        let j = flat.jacobian().expect("empty cost keeps a Jacobian");
        assert_eq!((j.rows(), j.cols()), (0, 0));
    }

    #[test]
    #[should_panic(expected = "output length must equal the cost rows")]
    fn test_add_jx_rejects_wrong_output_length() {
        let cost = two_term_cost();
        let mut out = DVector::zeros(3);
        cost.add_jx(&mut out, &DVector::zeros(3), 1.0);
    }

    #[test]
    #[should_panic(expected = "input length must equal the cost columns")]
    fn test_add_jx_rejects_wrong_input_length() {
        let cost = two_term_cost();
        let mut out = DVector::zeros(2);
        cost.add_jx(&mut out, &DVector::zeros(2), 1.0);
    }

    #[test]
    #[should_panic(expected = "output length must equal the cost columns")]
    fn test_add_jtx_rejects_wrong_output_length() {
        let cost = two_term_cost();
        let mut out = DVector::zeros(2);
        cost.add_jtx(&mut out, &DVector::zeros(2), 1.0);
    }

    #[test]
    #[should_panic(expected = "input length must equal the cost rows")]
    fn test_add_jtx_rejects_wrong_input_length() {
        let cost = two_term_cost();
        let mut out = DVector::zeros(3);
        cost.add_jtx(&mut out, &DVector::zeros(5), 1.0);
    }

    #[test]
    #[should_panic(expected = "dense Gram output must be 3x3")]
    fn test_dense_gram_rejects_wrong_shape() {
        let cost = two_term_cost();
        let mut out = DMatrix::zeros(2, 2);
        let _ = cost.add_dense_jtj_lower(&mut out, 1.0, None);
    }

    #[test]
    #[should_panic(expected = "sparse Gram output must be 3x3")]
    fn test_sparse_gram_rejects_wrong_shape() {
        let cost = two_term_cost();
        let mut out = SparseMatrix::zeros(4, 4);
        let _ = cost.add_sparse_jtj_lower(&mut out, 1.0);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let mut cost = Cost::<f64>::new();
        let err = cost.try_add(linear_term(&[(0, 1.0)], 0.0), -1.0);
        assert!(matches!(err, Err(CoreError::InvalidWeight(_))));
        assert!(cost.is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let mut a = two_term_cost();
        let mut b = Cost::new();
        b.add_named("prior", linear_term(&[(1, 1.0)], 0.0), 1.0).unwrap();
        a.append(b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.terms()[2].name.as_deref(), Some("prior"));
    }
}
