//! Sparse Jacobian blocks.
//!
//! A [`SparseJacobian`] is a [`SparseMatrix`] plus the index of its first non-empty column.
//! Residual blocks produced by autodiff usually touch only a narrow band of the variable
//! vector, and `start_col` lets the Gram accumulation skip everything to the left of it.

use nalgebra::DMatrix;

use crate::core::real::Real;
use crate::linalg::sparse::SparseMatrix;
use crate::linalg::{LinAlgResult, ThreadPool};

#[derive(Debug, Clone, PartialEq)]
pub struct SparseJacobian<T: Real> {
    matrix: SparseMatrix<T>,
    start_col: usize,
}

impl<T: Real> SparseJacobian<T> {
    pub fn new(matrix: SparseMatrix<T>) -> Self {
        let start_col = matrix.min_col().unwrap_or(0);
        Self { matrix, start_col }
    }

    /// Jacobian with no stored entries.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(SparseMatrix::zeros(rows, cols))
    }

    /// `size × cols` block that is the identity on columns `offset .. offset + size`.
    pub fn identity(size: usize, offset: usize, cols: usize) -> Self {
        assert!(
            offset + size <= cols,
            "identity block [{offset}, {}) does not fit in {cols} columns",
            offset + size
        );
        let mut matrix = SparseMatrix::empty(cols);
        matrix.reserve(size, size);
        for i in 0..size {
            matrix.push(offset + i, T::one());
            matrix.finish_row();
        }
        Self::new(matrix)
    }

    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Index of the first column holding a stored entry (0 for an empty Jacobian).
    pub fn start_col(&self) -> usize {
        self.start_col
    }

    pub fn matrix(&self) -> &SparseMatrix<T> {
        &self.matrix
    }

    pub fn into_matrix(self) -> SparseMatrix<T> {
        self.matrix
    }

    /// Widen to `cols` columns. Existing entries are untouched.
    pub fn resize_cols(&mut self, cols: usize) {
        let rows = self.matrix.rows();
        self.matrix.resize(rows, cols);
    }

    pub fn scale(&mut self, factor: T) {
        self.matrix.scale(factor);
    }

    /// `a · self + b · other` over the union of both sparsity patterns.
    pub fn linear_combination(&self, a: T, other: &Self, b: T) -> Self {
        assert_eq!(
            self.rows(),
            other.rows(),
            "Jacobians with different row counts cannot be combined"
        );
        Self::new(self.matrix.linear_combination(a, &other.matrix, b))
    }

    /// `out += scale · J · x`
    pub fn add_jx(&self, out: &mut [T], x: &[T], scale: T) {
        self.matrix.mul_vec_add(out, x, scale);
    }

    /// `out += scale · Jᵀ · x`
    pub fn add_jtx(&self, out: &mut [T], x: &[T], scale: T) {
        self.matrix.transpose_mul_vec_add(out, x, scale);
    }

    /// Lower triangle of `scale · JᵀJ` added into the top-left block of a dense matrix.
    pub fn add_dense_jtj_lower(
        &self,
        out: &mut DMatrix<T>,
        scale: T,
        pool: Option<&ThreadPool>,
    ) -> LinAlgResult<()> {
        self.matrix.add_gram_lower_to_dense(out, scale, pool)
    }

    /// `out = out + scale · lower(JᵀJ)`, widening the Gram block to `out`'s size.
    pub fn add_sparse_jtj_lower(&self, out: &mut SparseMatrix<T>, scale: T) -> LinAlgResult<()> {
        assert_eq!(out.rows(), out.cols(), "Gram output must be square");
        assert!(
            out.cols() >= self.cols(),
            "Gram output is {0}x{0} but {1} columns are required",
            out.cols(),
            self.cols()
        );
        let mut gram = self.matrix.gram_lower()?;
        gram.resize(out.rows(), out.cols());
        *out = out.linear_combination(T::one(), &gram, scale);
        Ok(())
    }
}
