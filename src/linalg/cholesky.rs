use faer::{
    Mat, Side,
    linalg::solvers::{Llt as DenseLlt, Solve},
    sparse::linalg::solvers::{Llt, SymbolicLlt},
    sparse::{SparseColMat, Triplet},
};
use nalgebra::{DMatrix, DVector};

use crate::core::real::Real;
use crate::linalg::sparse::SparseMatrix;
use crate::linalg::{GramMatrix, LinAlgError, LinAlgResult, LinearSolver, check_dimensions};

/// Direct LLᵀ backend.
///
/// Sparse Gram matrices go through faer's supernodal sparse Cholesky, dense ones through
/// faer's dense Cholesky. Factorization always runs in `f64`.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver {
    /// Symbolic factorization of the last sparse pattern, keyed by that pattern.
    ///
    /// Gauss-Newton iterations on a fixed problem produce the same pattern every time, so
    /// the symbolic analysis is done once and only the numeric factorization repeats.
    symbolic: Option<CachedSymbolic>,

    symbolic_factorizations: usize,
}

#[derive(Debug, Clone)]
struct CachedSymbolic {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    factorization: SymbolicLlt<usize>,
}

impl SparseCholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many symbolic factorizations have been computed so far.
    pub fn symbolic_factorizations(&self) -> usize {
        self.symbolic_factorizations
    }

    fn symbolic_for<T: Real>(
        &mut self,
        lower: &SparseMatrix<T>,
        matrix: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<SymbolicLlt<usize>> {
        if let Some(cached) = &self.symbolic
            && cached.row_ptr == lower.row_ptr()
            && cached.col_idx == lower.col_indices()
        {
            // SymbolicLlt is reference counted, clone is cheap
            return Ok(cached.factorization.clone());
        }

        let factorization = SymbolicLlt::try_new(matrix.symbolic(), Side::Lower).map_err(|e| {
            LinAlgError::FactorizationFailed("Symbolic Cholesky decomposition failed".to_string())
                .log_with_source(e)
        })?;
        self.symbolic_factorizations += 1;
        self.symbolic = Some(CachedSymbolic {
            row_ptr: lower.row_ptr().to_vec(),
            col_idx: lower.col_indices().to_vec(),
            factorization: factorization.clone(),
        });
        Ok(factorization)
    }

    fn solve_sparse<T: Real>(
        &mut self,
        lower: &SparseMatrix<T>,
        b: &DVector<T>,
    ) -> LinAlgResult<Mat<f64>> {
        let n = lower.rows();
        let mut triplets = Vec::with_capacity(lower.nnz());
        for i in 0..n {
            let (cols, vals) = lower.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                triplets.push(Triplet::new(i, j, v.as_f64()));
            }
        }
        let matrix = SparseColMat::try_new_from_triplets(n, n, &triplets).map_err(|e| {
            LinAlgError::SparseMatrixCreation("Failed to assemble the Gram matrix".to_string())
                .log_with_source(e)
        })?;

        let symbolic = self.symbolic_for(lower, &matrix)?;
        let cholesky = Llt::try_new_with_symbolic(symbolic, matrix.as_ref(), Side::Lower)
            .map_err(|e| LinAlgError::SingularMatrix.log_with_source(e))?;

        let rhs = Mat::from_fn(n, 1, |i, _| b[i].as_f64());
        Ok(cholesky.solve(&rhs))
    }

    fn solve_dense<T: Real>(lower: &DMatrix<T>, b: &DVector<T>) -> LinAlgResult<Mat<f64>> {
        let n = lower.nrows();
        let matrix = Mat::from_fn(n, n, |i, j| {
            if i >= j {
                lower[(i, j)].as_f64()
            } else {
                lower[(j, i)].as_f64()
            }
        });
        let cholesky = DenseLlt::new(matrix.as_ref(), Side::Lower)
            .map_err(|e| LinAlgError::SingularMatrix.log_with_source(e))?;

        let mut rhs = Mat::from_fn(n, 1, |i, _| b[i].as_f64());
        cholesky.solve_in_place(rhs.as_mut());
        Ok(rhs)
    }
}

impl<T: Real> LinearSolver<T> for SparseCholeskySolver {
    fn solve(&mut self, a: &GramMatrix<T>, b: &DVector<T>) -> LinAlgResult<DVector<T>> {
        check_dimensions(a, b)?;
        let n = a.dim();
        if n == 0 {
            return Ok(DVector::zeros(0));
        }

        let x = match a {
            GramMatrix::Sparse(lower) => self.solve_sparse(lower, b)?,
            GramMatrix::Dense(lower) => Self::solve_dense(lower, b)?,
        };

        let solution = DVector::from_fn(n, |i, _| T::from_f64(x[(i, 0)]));
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(LinAlgError::NonFiniteSolution.log());
        }
        Ok(solution)
    }
}
