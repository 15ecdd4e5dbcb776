//! Owned row-major (CSR) sparse matrix.
//!
//! `SparseMatrix` is the storage behind Jacobian blocks and sparse Gram matrices. Column indices
//! are strictly increasing inside every row, so sums run as ordered two-pointer merges.
//!
//! The CSR buffers of a matrix are exactly the CSC buffers of its transpose. Transposes and
//! products hand that view to faer's sparse kernels without copying the structure; values are
//! widened to `f64` on the way in.
//!
//! Matrices are either assembled row by row:
//!
//! ```
//! use sparse_nls::linalg::sparse::SparseMatrix;
//!
//! let mut m = SparseMatrix::<f64>::empty(3);
//! m.reserve(2, 3);
//! m.push(0, 1.0);
//! m.push(2, 2.0);
//! m.finish_row();
//! m.push(1, 3.0);
//! m.finish_row();
//!
//! assert_eq!(m.rows(), 2);
//! assert_eq!(m.nnz(), 3);
//! assert_eq!(m.get(0, 2), 2.0);
//! ```
//!
//! or from `(row, col, value)` triplets, with duplicates summed.

use faer::{
    Accum, Mat, Par,
    sparse::linalg::matmul::{dense_sparse_matmul, sparse_dense_matmul, sparse_sparse_matmul},
    sparse::{SparseColMatRef, SymbolicSparseColMatRef},
};
use nalgebra::DMatrix;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::real::Real;
use crate::linalg::{LinAlgError, LinAlgResult, ThreadPool};

/// Row-major compressed sparse matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T: Real> {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Real> SparseMatrix<T> {
    /// All-zero `rows × cols` matrix (no stored entries).
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_ptr: vec![0; rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Matrix with zero rows, ready for row-by-row assembly with [`push`](Self::push) and
    /// [`finish_row`](Self::finish_row).
    pub fn empty(cols: usize) -> Self {
        Self::zeros(0, cols)
    }

    /// Reserve capacity for `additional_rows` more rows holding `additional_nnz` entries.
    pub fn reserve(&mut self, additional_rows: usize, additional_nnz: usize) {
        self.row_ptr.reserve(additional_rows);
        self.col_idx.reserve(additional_nnz);
        self.values.reserve(additional_nnz);
    }

    /// Append an entry to the row currently being assembled.
    ///
    /// # Panics
    /// If `col` is out of range or not strictly greater than the previous column of the row.
    pub fn push(&mut self, col: usize, value: T) {
        assert!(
            col < self.cols,
            "column {col} out of range for matrix with {} columns",
            self.cols
        );
        let row_start = self.row_ptr[self.rows];
        if self.col_idx.len() > row_start {
            let last = self.col_idx[self.col_idx.len() - 1];
            assert!(
                col > last,
                "columns must be strictly increasing within a row ({col} after {last})"
            );
        }
        self.col_idx.push(col);
        self.values.push(value);
    }

    /// Close the row currently being assembled.
    pub fn finish_row(&mut self) {
        self.rows += 1;
        self.row_ptr.push(self.col_idx.len());
    }

    /// Append a complete row given as sorted column indices and values.
    pub fn push_row(&mut self, cols: &[usize], values: &[T]) {
        assert_eq!(cols.len(), values.len(), "row indices and values differ in length");
        for (&c, &v) in cols.iter().zip(values) {
            self.push(c, v);
        }
        self.finish_row();
    }

    /// Build from `(row, col, value)` triplets. Duplicate coordinates are summed.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, T)]) -> Self {
        let mut sorted: Vec<(usize, usize, T)> = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut matrix = Self::empty(cols);
        matrix.reserve(rows, sorted.len());
        let mut it = sorted.into_iter().peekable();
        for r in 0..rows {
            while let Some(&(row, col, value)) = it.peek() {
                if row != r {
                    assert!(row > r, "triplet row {row} out of range");
                    break;
                }
                it.next();
                let last = matrix.col_idx.len();
                if last > matrix.row_ptr[r] && matrix.col_idx[last - 1] == col {
                    matrix.values[last - 1] += value;
                } else {
                    matrix.push(col, value);
                }
            }
            matrix.finish_row();
        }
        assert!(it.next().is_none(), "triplet row out of range for {rows} rows");
        matrix
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Column indices and values of row `r`.
    #[inline]
    pub fn row(&self, r: usize) -> (&[usize], &[T]) {
        let (start, end) = (self.row_ptr[r], self.row_ptr[r + 1]);
        (&self.col_idx[start..end], &self.values[start..end])
    }

    /// Value at `(r, c)`, zero when not stored.
    pub fn get(&self, r: usize, c: usize) -> T {
        let (cols, values) = self.row(r);
        match cols.binary_search(&c) {
            Ok(k) => values[k],
            Err(_) => T::zero(),
        }
    }

    /// Smallest stored column index.
    pub fn min_col(&self) -> Option<usize> {
        (0..self.rows)
            .filter_map(|r| self.row(r).0.first().copied())
            .min()
    }

    /// True if row `r` stores no entries.
    pub fn is_row_empty(&self, r: usize) -> bool {
        self.row_ptr[r] == self.row_ptr[r + 1]
    }

    /// Grow the matrix to `rows × cols`. New rows and columns are zero.
    ///
    /// # Panics
    /// If either dimension would shrink.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        assert!(
            rows >= self.rows && cols >= self.cols,
            "cannot shrink a {}x{} sparse matrix to {rows}x{cols}",
            self.rows,
            self.cols
        );
        let nnz = self.nnz();
        self.row_ptr.resize(rows + 1, nnz);
        self.rows = rows;
        self.cols = cols;
    }

    /// Multiply every stored value by `factor`.
    pub fn scale(&mut self, factor: T) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// Values widened to `f64` for the faer kernels.
    fn values_f64(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.as_f64()).collect()
    }

    /// `selfᵀ` as a faer column-major view over the row buffers of `self`.
    fn transposed_view<'a>(&'a self, values: &'a [f64]) -> SparseColMatRef<'a, usize, f64> {
        let symbolic = SymbolicSparseColMatRef::new_checked(
            self.cols,
            self.rows,
            &self.row_ptr,
            None,
            &self.col_idx,
        );
        SparseColMatRef::new(symbolic, values)
    }

    /// Transposed copy, computed by faer.
    ///
    /// # Errors
    /// `MatrixConversion` if faer cannot allocate the result.
    pub fn transpose(&self) -> LinAlgResult<Self> {
        let values = self.values_f64();
        let transposed = self.transposed_view(&values).to_row_major().map_err(|e| {
            LinAlgError::MatrixConversion("Failed to transpose the sparse matrix".to_string())
                .log_with_source(e)
        })?;
        let (symbolic, values) = transposed.into_parts();
        let (rows, cols, row_ptr, _, col_idx) = symbolic.into_parts();
        Ok(Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values: values.into_iter().map(T::from_f64).collect(),
        })
    }

    /// New matrix made of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let nnz = rows.iter().map(|&r| self.row_ptr[r + 1] - self.row_ptr[r]).sum();
        let mut out = Self::empty(self.cols);
        out.reserve(rows.len(), nnz);
        for &r in rows {
            let (cols, vals) = self.row(r);
            out.col_idx.extend_from_slice(cols);
            out.values.extend_from_slice(vals);
            out.finish_row();
        }
        out
    }

    /// Stack `other` below `self`, widening to the larger column count.
    pub fn append_rows(&mut self, other: &Self) {
        self.cols = self.cols.max(other.cols);
        self.reserve(other.rows, other.nnz());
        for r in 0..other.rows {
            let (cols, vals) = other.row(r);
            self.col_idx.extend_from_slice(cols);
            self.values.extend_from_slice(vals);
            self.finish_row();
        }
    }

    /// `a · self + b · other`, merged row by row over the union of stored columns.
    ///
    /// The result has the larger of the two shapes.
    pub fn linear_combination(&self, a: T, other: &Self, b: T) -> Self {
        let rows = self.rows.max(other.rows);
        let mut out = Self::empty(self.cols.max(other.cols));
        out.reserve(rows, self.nnz() + other.nnz());
        for r in 0..rows {
            let (ca, va) = if r < self.rows { self.row(r) } else { (&[][..], &[][..]) };
            let (cb, vb) = if r < other.rows { other.row(r) } else { (&[][..], &[][..]) };
            merge_union(ca, va, a, cb, vb, b, |c, v| {
                out.col_idx.push(c);
                out.values.push(v);
            });
            out.finish_row();
        }
        out
    }

    /// Add `value` to every diagonal entry that is already stored. No entries are created.
    pub fn add_to_existing_diagonal(&mut self, value: T) {
        for r in 0..self.rows {
            let (start, end) = (self.row_ptr[r], self.row_ptr[r + 1]);
            if let Ok(k) = self.col_idx[start..end].binary_search(&r) {
                self.values[start + k] += value;
            }
        }
    }

    /// `out += scale · self · x`
    pub fn mul_vec_add(&self, out: &mut [T], x: &[T], scale: T) {
        assert_eq!(out.len(), self.rows, "output length must equal the row count");
        assert_eq!(x.len(), self.cols, "input length must equal the column count");
        let values = self.values_f64();
        // (self · x)ᵀ = xᵀ · selfᵀ
        let lhs = Mat::from_fn(1, self.cols, |_, c| x[c].as_f64());
        let mut product = Mat::<f64>::zeros(1, self.rows);
        dense_sparse_matmul(
            product.as_mut(),
            Accum::Replace,
            lhs.as_ref(),
            self.transposed_view(&values),
            scale.as_f64(),
            Par::Seq,
        );
        for (r, o) in out.iter_mut().enumerate() {
            *o += T::from_f64(product[(0, r)]);
        }
    }

    /// `out += scale · selfᵀ · x`
    pub fn transpose_mul_vec_add(&self, out: &mut [T], x: &[T], scale: T) {
        assert_eq!(out.len(), self.cols, "output length must equal the column count");
        assert_eq!(x.len(), self.rows, "input length must equal the row count");
        let values = self.values_f64();
        let rhs = Mat::from_fn(self.rows, 1, |r, _| x[r].as_f64());
        let mut product = Mat::<f64>::zeros(self.cols, 1);
        sparse_dense_matmul(
            product.as_mut(),
            Accum::Replace,
            self.transposed_view(&values),
            rhs.as_ref(),
            scale.as_f64(),
            Par::Seq,
        );
        for (c, o) in out.iter_mut().enumerate() {
            *o += T::from_f64(product[(c, 0)]);
        }
    }

    /// Lower triangle of `selfᵀ · self` as a sparse `cols × cols` matrix.
    ///
    /// faer forms the full product; since it is symmetric, column `i` of the column-major
    /// result holds row `i`, and its entries up to the diagonal are kept. A column of `self`
    /// with at least one stored entry always yields a stored diagonal entry, even if its
    /// numeric value is zero.
    ///
    /// # Errors
    /// `MatrixConversion` if faer cannot allocate the product.
    pub fn gram_lower(&self) -> LinAlgResult<Self> {
        let n = self.cols;
        let values = self.values_f64();
        let jt = self.transposed_view(&values);
        let j = jt.transpose().to_col_major().map_err(|e| {
            LinAlgError::MatrixConversion(
                "Failed to convert the Jacobian to column-major format".to_string(),
            )
            .log_with_source(e)
        })?;
        let gram = sparse_sparse_matmul(jt, j.as_ref(), 1.0, Par::Seq).map_err(|e| {
            LinAlgError::MatrixConversion("Failed to form the Gram product".to_string())
                .log_with_source(e)
        })?;

        let gram = gram.as_ref();
        let col_ptr = gram.symbolic().col_ptr();
        let row_idx = gram.symbolic().row_idx();
        let gram_values = gram.val();

        let mut out = Self::empty(n);
        out.reserve(n, (gram_values.len() + n) / 2);
        for i in 0..n {
            let range = col_ptr[i]..col_ptr[i + 1];
            for (&r, &v) in row_idx[range.clone()].iter().zip(&gram_values[range]) {
                if r > i {
                    break;
                }
                out.push(r, T::from_f64(v));
            }
            out.finish_row();
        }
        Ok(out)
    }

    /// `out[i, j] += scale · (selfᵀ · self)[i, j]` for `i ≥ j < self.cols()`.
    ///
    /// `out` must be square and at least `cols × cols`; only its lower triangle is written.
    /// With a thread pool each worker owns whole columns of `out`, so no two workers ever
    /// write the same entry.
    ///
    /// # Errors
    /// `MatrixConversion` if the transpose cannot be formed.
    pub fn add_gram_lower_to_dense(
        &self,
        out: &mut DMatrix<T>,
        scale: T,
        pool: Option<&ThreadPool>,
    ) -> LinAlgResult<()> {
        let n = self.cols;
        let ld = out.nrows();
        assert_eq!(ld, out.ncols(), "Gram output must be square");
        assert!(ld >= n, "Gram output is {ld}x{ld} but {n} columns are required");
        if n == 0 {
            return Ok(());
        }

        let jt = self.transpose()?;
        let column_task = |(j, column): (usize, &mut [T])| {
            let (rows_j, vals_j) = jt.row(j);
            if rows_j.is_empty() {
                return;
            }
            for (i, entry) in column.iter_mut().enumerate().take(n).skip(j) {
                let (rows_i, vals_i) = jt.row(i);
                *entry += scale * sparse_dot(rows_i, vals_i, rows_j, vals_j);
            }
        };

        match pool {
            #[cfg(feature = "parallel")]
            Some(pool) => pool.install(|| {
                out.as_mut_slice()
                    .par_chunks_mut(ld)
                    .take(n)
                    .enumerate()
                    .for_each(&column_task)
            }),
            _ => out
                .as_mut_slice()
                .chunks_mut(ld)
                .take(n)
                .enumerate()
                .for_each(&column_task),
        }
        #[cfg(not(feature = "parallel"))]
        let _ = pool;
        Ok(())
    }

    /// Dense copy.
    pub fn to_dense(&self) -> DMatrix<T> {
        let mut dense = DMatrix::zeros(self.rows, self.cols);
        for r in 0..self.rows {
            let (cols, vals) = self.row(r);
            for (&c, &v) in cols.iter().zip(vals) {
                dense[(r, c)] = v;
            }
        }
        dense
    }
}

/// Emit `a · x + b · y` over the ordered union of the index sets of two sorted sparse vectors.
pub(crate) fn merge_union<T: Real>(
    ix: &[usize],
    vx: &[T],
    a: T,
    iy: &[usize],
    vy: &[T],
    b: T,
    mut emit: impl FnMut(usize, T),
) {
    let (mut p, mut q) = (0, 0);
    while p < ix.len() && q < iy.len() {
        match ix[p].cmp(&iy[q]) {
            std::cmp::Ordering::Less => {
                emit(ix[p], a * vx[p]);
                p += 1;
            }
            std::cmp::Ordering::Greater => {
                emit(iy[q], b * vy[q]);
                q += 1;
            }
            std::cmp::Ordering::Equal => {
                emit(ix[p], a * vx[p] + b * vy[q]);
                p += 1;
                q += 1;
            }
        }
    }
    for k in p..ix.len() {
        emit(ix[k], a * vx[k]);
    }
    for k in q..iy.len() {
        emit(iy[k], b * vy[k]);
    }
}

/// Dot product of two sorted sparse vectors.
pub(crate) fn sparse_dot<T: Real>(ix: &[usize], vx: &[T], iy: &[usize], vy: &[T]) -> T {
    let (mut p, mut q) = (0, 0);
    let mut sum = T::zero();
    while p < ix.len() && q < iy.len() {
        match ix[p].cmp(&iy[q]) {
            std::cmp::Ordering::Less => p += 1,
            std::cmp::Ordering::Greater => q += 1,
            std::cmp::Ordering::Equal => {
                sum += vx[p] * vy[q];
                p += 1;
                q += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample() -> SparseMatrix<f64> {
        // [1 0 2]
        // [0 3 0]
        // [4 0 5]
        // [0 0 6]
        SparseMatrix::from_triplets(
            4,
            3,
            &[
                (0, 0, 1.0),
                (0, 2, 2.0),
                (1, 1, 3.0),
                (2, 0, 4.0),
                (2, 2, 5.0),
                (3, 2, 6.0),
            ],
        )
    }

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let m = SparseMatrix::from_triplets(2, 2, &[(1, 0, 1.0), (0, 1, 2.0), (1, 0, 0.5)]);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(1, 0), 1.5);
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_push_rejects_unsorted_columns() {
        let mut m = SparseMatrix::<f64>::empty(3);
        m.push(2, 1.0);
        m.push(1, 1.0);
    }

    #[test]
    fn test_transpose() -> TestResult {
        let m = sample();
        let t = m.transpose()?;
        assert_eq!((t.rows(), t.cols()), (3, 4));
        assert_eq!(t.row_ptr(), &[0, 2, 3, 6]);
        for r in 0..4 {
            for c in 0..3 {
                assert_eq!(m.get(r, c), t.get(c, r));
            }
        }
        assert_eq!(t.transpose()?, m);
        Ok(())
    }

    #[test]
    fn test_transpose_of_empty_rows_and_columns() -> TestResult {
        let mut m = SparseMatrix::<f32>::from_triplets(2, 3, &[(1, 2, 0.5)]);
        m.resize(4, 5);
        let t = m.transpose()?;
        assert_eq!((t.rows(), t.cols()), (5, 4));
        assert_eq!(t.nnz(), 1);
        assert_eq!(t.get(2, 1), 0.5);
        assert!(t.is_row_empty(0) && t.is_row_empty(4));

        let nothing = SparseMatrix::<f64>::zeros(0, 0).transpose()?;
        assert_eq!((nothing.rows(), nothing.cols(), nothing.nnz()), (0, 0, 0));
        Ok(())
    }

    #[test]
    fn test_resize_pads_with_zeros() {
        let mut m = sample();
        m.resize(6, 5);
        assert_eq!((m.rows(), m.cols()), (6, 5));
        assert!(m.is_row_empty(5));
        assert_eq!(m.get(3, 2), 6.0);
        assert_eq!(m.nnz(), 6);
    }

    #[test]
    fn test_linear_combination_is_union() {
        let a = SparseMatrix::from_triplets(1, 5, &[(0, 0, 1.0), (0, 2, 2.0), (0, 4, 3.0)]);
        let b = SparseMatrix::from_triplets(1, 5, &[(0, 1, 10.0), (0, 2, 20.0)]);
        let c = a.linear_combination(1.0, &b, -1.0);
        assert_eq!(c.nnz(), 4);
        assert_eq!(c.row(0).0, &[0, 1, 2, 4]);
        assert_eq!(c.row(0).1, &[1.0, -10.0, -18.0, 3.0]);
    }

    #[test]
    fn test_mul_vec_and_transpose_mul_vec() {
        let m = sample();
        let mut y = vec![1.0; 4];
        m.mul_vec_add(&mut y, &[1.0, 2.0, 3.0], 2.0);
        assert_eq!(y, vec![15.0, 13.0, 39.0, 37.0]);

        let mut z = vec![0.0; 3];
        m.transpose_mul_vec_add(&mut z, &[1.0, 1.0, 1.0, 1.0], 1.0);
        assert_eq!(z, vec![5.0, 3.0, 13.0]);
    }

    #[test]
    fn test_products_skip_empty_rows() {
        let mut m = SparseMatrix::<f32>::from_triplets(2, 2, &[(0, 1, 2.0)]);
        m.resize(3, 3);
        let mut y = vec![1.0f32; 3];
        m.mul_vec_add(&mut y, &[5.0, 3.0, 7.0], -1.0);
        assert_eq!(y, vec![-5.0, 1.0, 1.0]);

        let mut z = vec![0.0f32; 3];
        m.transpose_mul_vec_add(&mut z, &[4.0, 9.0, 9.0], 0.5);
        assert_eq!(z, vec![0.0, 4.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "input length must equal the column count")]
    fn test_mul_vec_rejects_wrong_input_length() {
        let mut y = vec![0.0; 4];
        sample().mul_vec_add(&mut y, &[1.0, 2.0], 1.0);
    }

    #[test]
    fn test_gram_lower_matches_dense_product() -> TestResult {
        let m = sample();
        let g = m.gram_lower()?;
        assert_eq!((g.rows(), g.cols()), (3, 3));
        let dense = m.to_dense();
        let expected = dense.transpose() * &dense;
        for i in 0..3 {
            for j in 0..3 {
                let stored = g.get(i, j);
                if j > i {
                    assert_eq!(stored, 0.0, "upper triangle must stay empty");
                } else {
                    assert!((stored - expected[(i, j)]).abs() < TOLERANCE);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_gram_lower_single_precision() -> TestResult {
        let m = SparseMatrix::<f32>::from_triplets(3, 2, &[(0, 0, 2.0), (1, 0, 1.0), (2, 1, -3.0)]);
        let g = m.gram_lower()?;
        assert_eq!(g.row(0), (&[0][..], &[5.0f32][..]));
        // columns 0 and 1 never share a row, so (1, 0) is not stored
        assert_eq!(g.row(1), (&[1][..], &[9.0f32][..]));
        Ok(())
    }

    #[test]
    fn test_gram_lower_keeps_structural_zero_diagonal() -> TestResult {
        let m = SparseMatrix::from_triplets(1, 2, &[(0, 0, 0.0), (0, 1, 1.0)]);
        let g = m.gram_lower()?;
        assert_eq!(g.row(0).0, &[0]);
        assert_eq!(g.get(0, 0), 0.0);
        assert_eq!(g.row(1).0, &[0, 1]);
        Ok(())
    }

    #[test]
    fn test_dense_gram_matches_sparse_gram() -> TestResult {
        let m = sample();
        let sparse = m.gram_lower()?;
        let mut dense = DMatrix::zeros(3, 3);
        m.add_gram_lower_to_dense(&mut dense, 2.0, None)?;
        for i in 0..3 {
            for j in 0..=i {
                assert!((dense[(i, j)] - 2.0 * sparse.get(i, j)).abs() < TOLERANCE);
            }
        }
        assert_eq!(dense[(0, 2)], 0.0);
        Ok(())
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_dense_gram_on_thread_pool() -> TestResult {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build()?;
        let m = sample();
        let mut serial = DMatrix::zeros(3, 3);
        let mut parallel = DMatrix::zeros(3, 3);
        m.add_gram_lower_to_dense(&mut serial, 1.0, None)?;
        m.add_gram_lower_to_dense(&mut parallel, 1.0, Some(&pool))?;
        assert_eq!(serial, parallel);
        Ok(())
    }

    #[test]
    fn test_add_to_existing_diagonal_creates_nothing() {
        let mut g = SparseMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (2, 1, 4.0)]);
        g.add_to_existing_diagonal(0.5);
        assert_eq!(g.nnz(), 2);
        assert_eq!(g.get(0, 0), 1.5);
        assert_eq!(g.get(1, 1), 0.0);
        assert_eq!(g.get(2, 2), 0.0);
    }

    #[test]
    fn test_select_rows_and_min_col() {
        let m = sample();
        let s = m.select_rows(&[3, 1]);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.get(0, 2), 6.0);
        assert_eq!(s.get(1, 1), 3.0);
        assert_eq!(s.min_col(), Some(1));
        assert_eq!(SparseMatrix::<f64>::zeros(2, 2).min_col(), None);
    }
}
