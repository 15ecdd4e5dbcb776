//! Regularized normal equations `(JᵀJ + λI) · dx = −Jᵀr`.
//!
//! Variables that no residual depends on produce structurally empty columns in `J`. They are
//! removed before the Gram matrix is formed, so the system is solved in a compact index space
//! and mapped back with zeros afterwards. Regularization is added to diagonal entries that
//! already exist and never creates new ones. After the compaction every retained column has
//! at least one stored entry, so its diagonal entry is always present.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::core::jacobian::SparseJacobian;
use crate::core::real::Real;
use crate::linalg::sparse::SparseMatrix;
use crate::linalg::{LinAlgResult, ThreadPool};

/// Lower triangle of a symmetric Gram matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum GramMatrix<T: Real> {
    /// Dense storage; entries above the diagonal are ignored.
    Dense(DMatrix<T>),
    /// Row-major storage holding only entries with `col ≤ row`.
    Sparse(SparseMatrix<T>),
}

impl<T: Real> GramMatrix<T> {
    pub fn dim(&self) -> usize {
        match self {
            GramMatrix::Dense(m) => m.nrows(),
            GramMatrix::Sparse(m) => m.rows(),
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, GramMatrix::Dense(_))
    }

    /// Entry `(i, j)` of the full symmetric matrix.
    pub fn get(&self, i: usize, j: usize) -> T {
        let (r, c) = if i >= j { (i, j) } else { (j, i) };
        match self {
            GramMatrix::Dense(m) => m[(r, c)],
            GramMatrix::Sparse(m) => m.get(r, c),
        }
    }

    pub fn diagonal(&self) -> DVector<T> {
        DVector::from_fn(self.dim(), |i, _| self.get(i, i))
    }

    /// `A · x` using the lower triangle for both halves.
    pub fn symmetric_mul(&self, x: &DVector<T>) -> DVector<T> {
        let n = self.dim();
        assert_eq!(x.len(), n, "vector length must equal the matrix dimension");
        let mut y = DVector::zeros(n);
        match self {
            GramMatrix::Dense(m) => {
                for j in 0..n {
                    y[j] += m[(j, j)] * x[j];
                    for i in j + 1..n {
                        let a = m[(i, j)];
                        y[i] += a * x[j];
                        y[j] += a * x[i];
                    }
                }
            }
            GramMatrix::Sparse(m) => {
                for i in 0..n {
                    let (cols, vals) = m.row(i);
                    for (&j, &a) in cols.iter().zip(vals) {
                        y[i] += a * x[j];
                        if j != i {
                            y[j] += a * x[i];
                        }
                    }
                }
            }
        }
        y
    }

    /// Full symmetric dense copy.
    pub fn to_dense(&self) -> DMatrix<T> {
        let n = self.dim();
        DMatrix::from_fn(n, n, |i, j| self.get(i, j))
    }
}

/// Normal equations in the compact index space of the variables that influence the residual.
#[derive(Debug, Clone)]
pub struct NormalEquations<T: Real> {
    /// Lower triangle of `JcᵀJc + λI`.
    pub gram: GramMatrix<T>,
    /// `−Jcᵀr`
    pub rhs: DVector<T>,
    /// `used_columns[k]` is the full index of compact variable `k`.
    pub used_columns: Vec<usize>,
    /// Length of the full update vector.
    pub full_size: usize,
}

impl<T: Real> NormalEquations<T> {
    /// Assemble the normal equations for `jacobian` and `residual`.
    ///
    /// The dense path is taken when `prefer_dense` is set and the compact Jacobian has at least
    /// as many rows as columns. The dense accumulation runs on `pool` when one is given.
    ///
    /// # Errors
    /// `MatrixConversion` if faer fails to transpose or multiply the Jacobian.
    ///
    /// # Panics
    /// If `residual` does not match the Jacobian rows or the Jacobian is wider than
    /// `full_size`.
    pub fn build(
        jacobian: &SparseJacobian<T>,
        residual: &DVector<T>,
        full_size: usize,
        reg: T,
        prefer_dense: bool,
        pool: Option<&ThreadPool>,
    ) -> LinAlgResult<Self> {
        assert_eq!(
            residual.len(),
            jacobian.rows(),
            "residual length must equal the Jacobian rows"
        );
        assert!(
            jacobian.cols() <= full_size,
            "Jacobian has {} columns but the update vector has length {full_size}",
            jacobian.cols()
        );

        let jt = jacobian.matrix().transpose()?;
        let used_columns: Vec<usize> = (jacobian.start_col()..jt.rows())
            .filter(|&c| !jt.is_row_empty(c))
            .collect();
        let j_compact = jt.select_rows(&used_columns).transpose()?;
        let n = used_columns.len();

        if n < full_size {
            debug!(
                "Discarding {} of {} variables with empty Jacobian columns",
                full_size - n,
                full_size
            );
        }

        let gram = if prefer_dense && j_compact.rows() >= n {
            let mut dense = DMatrix::zeros(n, n);
            j_compact.add_gram_lower_to_dense(&mut dense, T::one(), pool)?;
            for i in 0..n {
                dense[(i, i)] += reg;
            }
            GramMatrix::Dense(dense)
        } else {
            let mut sparse = j_compact.gram_lower()?;
            sparse.add_to_existing_diagonal(reg);
            GramMatrix::Sparse(sparse)
        };

        let mut rhs = DVector::zeros(n);
        j_compact.transpose_mul_vec_add(rhs.as_mut_slice(), residual.as_slice(), -T::one());

        Ok(Self {
            gram,
            rhs,
            used_columns,
            full_size,
        })
    }

    /// Map a compact solution back to the full update space; discarded variables get 0.
    pub fn expand(&self, compact: &DVector<T>) -> DVector<T> {
        assert_eq!(
            compact.len(),
            self.used_columns.len(),
            "compact step has the wrong length"
        );
        let mut full = DVector::zeros(self.full_size);
        for (k, &c) in self.used_columns.iter().enumerate() {
            full[c] = compact[k];
        }
        full
    }

    /// `rhsᵀ·dx − λ‖dx‖²`, the reduction of `‖r‖²` the linear model predicts for `dx`.
    pub fn predicted_reduction(&self, dx: &DVector<T>, reg: T) -> T {
        let rhs_dot: T = self.rhs.iter().zip(dx.iter()).map(|(&a, &b)| a * b).sum();
        let dx_sq: T = dx.iter().map(|&v| v * v).sum();
        rhs_dot - dx_sq * reg
    }
}
