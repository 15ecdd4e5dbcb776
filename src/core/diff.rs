//! Forward-mode differentiable values with sparse Jacobians.
//!
//! A [`DiffScalar`] carries a value and, optionally, the sparse row `∂value/∂x` with respect
//! to the solver's update vector. Arithmetic propagates the row through the chain rule, and the
//! Jacobian of a result is stored over the union of its operands' sparsity patterns. A value
//! without a Jacobian is a constant: it contributes nothing to derivatives.
//!
//! [`DiffVector`] is the vector counterpart, backed by a [`SparseJacobian`].
//!
//! ```
//! use sparse_nls::core::diff::DiffScalar;
//!
//! let x = DiffScalar::<f64>::variable(3.0, 0);
//! let y = DiffScalar::<f64>::variable(2.0, 4);
//! let f = &x * &y + x.sin();
//!
//! let row = f.jacobian().unwrap();
//! assert_eq!(row.indices(), &[0, 4]);
//! assert!((row.get(0) - (2.0 + 3.0f64.cos())).abs() < 1e-12);
//! assert_eq!(row.get(4), 3.0);
//! ```

use std::ops::{Add, Div, Mul, Neg, Sub};

use nalgebra::DVector;

use crate::core::jacobian::SparseJacobian;
use crate::core::real::Real;
use crate::linalg::sparse::{SparseMatrix, merge_union};

/// Sorted sparse row vector: strictly increasing column indices with one value each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseRow<T: Real> {
    indices: Vec<usize>,
    values: Vec<T>,
}

impl<T: Real> SparseRow<T> {
    /// # Panics
    /// If the lengths differ or the indices are not strictly increasing.
    pub fn new(indices: Vec<usize>, values: Vec<T>) -> Self {
        assert_eq!(indices.len(), values.len(), "indices and values differ in length");
        assert!(
            indices.windows(2).all(|w| w[0] < w[1]),
            "sparse row indices must be strictly increasing"
        );
        Self { indices, values }
    }

    /// Build from unordered `(index, value)` pairs; duplicates are summed.
    pub fn from_pairs(mut pairs: Vec<(usize, T)>) -> Self {
        pairs.sort_by_key(|&(i, _)| i);
        let mut row = Self::default();
        for (i, v) in pairs {
            if row.indices.last() == Some(&i) {
                if let Some(last) = row.values.last_mut() {
                    *last += v;
                }
            } else {
                row.indices.push(i);
                row.values.push(v);
            }
        }
        row
    }

    /// Row with a single `1` at `index`.
    pub fn unit(index: usize) -> Self {
        Self {
            indices: vec![index],
            values: vec![T::one()],
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Entry at `index`, zero if not stored.
    pub fn get(&self, index: usize) -> T {
        match self.indices.binary_search(&index) {
            Ok(k) => self.values[k],
            Err(_) => T::zero(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Smallest column count able to hold this row.
    pub fn required_cols(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    pub fn scaled(&self, factor: T) -> Self {
        Self {
            indices: self.indices.clone(),
            values: self.values.iter().map(|&v| v * factor).collect(),
        }
    }

    /// `a · self + b · other` stored over the union of both index sets.
    pub fn linear_combination(&self, a: T, other: &Self, b: T) -> Self {
        let mut out = Self {
            indices: Vec::with_capacity(self.nnz() + other.nnz()),
            values: Vec::with_capacity(self.nnz() + other.nnz()),
        };
        merge_union(
            &self.indices,
            &self.values,
            a,
            &other.indices,
            &other.values,
            b,
            |i, v| {
                out.indices.push(i);
                out.values.push(v);
            },
        );
        out
    }
}

/// `a · ja + b · jb` where a missing Jacobian counts as zero.
fn combine_rows<T: Real>(
    ja: Option<&SparseRow<T>>,
    a: T,
    jb: Option<&SparseRow<T>>,
    b: T,
) -> Option<SparseRow<T>> {
    match (ja, jb) {
        (Some(ja), Some(jb)) => Some(ja.linear_combination(a, jb, b)),
        (Some(ja), None) => Some(ja.scaled(a)),
        (None, Some(jb)) => Some(jb.scaled(b)),
        (None, None) => None,
    }
}

/// Scalar value with an optional sparse gradient row.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffScalar<T: Real> {
    value: T,
    jacobian: Option<SparseRow<T>>,
}

impl<T: Real> DiffScalar<T> {
    pub fn new(value: T, jacobian: Option<SparseRow<T>>) -> Self {
        Self { value, jacobian }
    }

    pub fn constant(value: T) -> Self {
        Self {
            value,
            jacobian: None,
        }
    }

    /// Independent variable living at column `index` of the update vector.
    pub fn variable(value: T, index: usize) -> Self {
        Self {
            value,
            jacobian: Some(SparseRow::unit(index)),
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn jacobian(&self) -> Option<&SparseRow<T>> {
        self.jacobian.as_ref()
    }

    pub fn has_jacobian(&self) -> bool {
        self.jacobian.is_some()
    }

    pub fn into_parts(self) -> (T, Option<SparseRow<T>>) {
        (self.value, self.jacobian)
    }

    /// `g(self)` given `g`'s value and derivative at `self.value()`.
    pub fn chain(&self, value: T, derivative: T) -> Self {
        Self {
            value,
            jacobian: self.jacobian.as_ref().map(|j| j.scaled(derivative)),
        }
    }

    fn add_ref(&self, rhs: &Self) -> Self {
        Self {
            value: self.value + rhs.value,
            jacobian: combine_rows(self.jacobian(), T::one(), rhs.jacobian(), T::one()),
        }
    }

    fn sub_ref(&self, rhs: &Self) -> Self {
        Self {
            value: self.value - rhs.value,
            jacobian: combine_rows(self.jacobian(), T::one(), rhs.jacobian(), -T::one()),
        }
    }

    fn mul_ref(&self, rhs: &Self) -> Self {
        Self {
            value: self.value * rhs.value,
            jacobian: combine_rows(self.jacobian(), rhs.value, rhs.jacobian(), self.value),
        }
    }

    fn div_ref(&self, rhs: &Self) -> Self {
        let inv = T::one() / rhs.value;
        let value = self.value * inv;
        Self {
            value,
            jacobian: combine_rows(self.jacobian(), inv, rhs.jacobian(), -value * inv),
        }
    }

    pub fn sqrt(&self) -> Self {
        let root = self.value.sqrt();
        let half = T::from_f64(0.5);
        self.chain(root, half / root)
    }

    pub fn square(&self) -> Self {
        let two = T::one() + T::one();
        self.chain(self.value * self.value, two * self.value)
    }

    pub fn powi(&self, n: i32) -> Self {
        let derivative = if n == 0 {
            T::zero()
        } else {
            T::from_f64(f64::from(n)) * self.value.powi(n - 1)
        };
        self.chain(self.value.powi(n), derivative)
    }

    pub fn powf(&self, exponent: T) -> Self {
        self.chain(
            self.value.powf(exponent),
            exponent * self.value.powf(exponent - T::one()),
        )
    }

    pub fn exp(&self) -> Self {
        let e = self.value.exp();
        self.chain(e, e)
    }

    pub fn ln(&self) -> Self {
        self.chain(self.value.ln(), T::one() / self.value)
    }

    pub fn sin(&self) -> Self {
        self.chain(self.value.sin(), self.value.cos())
    }

    pub fn cos(&self) -> Self {
        self.chain(self.value.cos(), -self.value.sin())
    }

    pub fn tanh(&self) -> Self {
        let t = self.value.tanh();
        self.chain(t, T::one() - t * t)
    }

    pub fn atan(&self) -> Self {
        self.chain(
            self.value.atan(),
            T::one() / (T::one() + self.value * self.value),
        )
    }

    /// Absolute value. At zero the derivative is the average of both sides, i.e. zero.
    pub fn abs(&self) -> Self {
        let sign = if self.value > T::zero() {
            T::one()
        } else if self.value < T::zero() {
            -T::one()
        } else {
            T::zero()
        };
        self.chain(self.value.abs(), sign)
    }

    /// Larger operand. On an exact tie the Jacobian is the average of both Jacobians.
    pub fn max(&self, other: &Self) -> Self {
        if self.value > other.value {
            self.clone()
        } else if other.value > self.value {
            other.clone()
        } else {
            self.tie(other)
        }
    }

    /// Smaller operand. On an exact tie the Jacobian is the average of both Jacobians.
    pub fn min(&self, other: &Self) -> Self {
        if self.value < other.value {
            self.clone()
        } else if other.value < self.value {
            other.clone()
        } else {
            self.tie(other)
        }
    }

    /// `self` limited to `[lower, upper]`, built from [`max`](Self::max) and
    /// [`min`](Self::min) so boundary ties follow the same averaging rule.
    pub fn clamp(&self, lower: &Self, upper: &Self) -> Self {
        self.max(lower).min(upper)
    }

    fn tie(&self, other: &Self) -> Self {
        let half = T::from_f64(0.5);
        Self {
            value: self.value,
            jacobian: combine_rows(self.jacobian(), half, other.jacobian(), half),
        }
    }
}

impl<T: Real> From<T> for DiffScalar<T> {
    fn from(value: T) -> Self {
        Self::constant(value)
    }
}

impl<T: Real> Neg for &DiffScalar<T> {
    type Output = DiffScalar<T>;

    fn neg(self) -> DiffScalar<T> {
        self.chain(-self.value, -T::one())
    }
}

impl<T: Real> Neg for DiffScalar<T> {
    type Output = DiffScalar<T>;

    fn neg(self) -> DiffScalar<T> {
        -&self
    }
}

macro_rules! impl_scalar_binary_op {
    ($trait:ident, $method:ident, $inner:ident) => {
        impl<T: Real> $trait<&DiffScalar<T>> for &DiffScalar<T> {
            type Output = DiffScalar<T>;

            fn $method(self, rhs: &DiffScalar<T>) -> DiffScalar<T> {
                self.$inner(rhs)
            }
        }

        impl<T: Real> $trait<DiffScalar<T>> for DiffScalar<T> {
            type Output = DiffScalar<T>;

            fn $method(self, rhs: DiffScalar<T>) -> DiffScalar<T> {
                self.$inner(&rhs)
            }
        }

        impl<T: Real> $trait<&DiffScalar<T>> for DiffScalar<T> {
            type Output = DiffScalar<T>;

            fn $method(self, rhs: &DiffScalar<T>) -> DiffScalar<T> {
                self.$inner(rhs)
            }
        }

        impl<T: Real> $trait<DiffScalar<T>> for &DiffScalar<T> {
            type Output = DiffScalar<T>;

            fn $method(self, rhs: DiffScalar<T>) -> DiffScalar<T> {
                self.$inner(&rhs)
            }
        }

        impl<T: Real> $trait<T> for &DiffScalar<T> {
            type Output = DiffScalar<T>;

            fn $method(self, rhs: T) -> DiffScalar<T> {
                self.$inner(&DiffScalar::constant(rhs))
            }
        }

        impl<T: Real> $trait<T> for DiffScalar<T> {
            type Output = DiffScalar<T>;

            fn $method(self, rhs: T) -> DiffScalar<T> {
                self.$inner(&DiffScalar::constant(rhs))
            }
        }
    };
}

impl_scalar_binary_op!(Add, add, add_ref);
impl_scalar_binary_op!(Sub, sub, sub_ref);
impl_scalar_binary_op!(Mul, mul, mul_ref);
impl_scalar_binary_op!(Div, div, div_ref);

macro_rules! impl_primitive_lhs_ops {
    ($($float:ty),*) => {$(
        impl Add<DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn add(self, rhs: DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).add_ref(&rhs)
            }
        }

        impl Add<&DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn add(self, rhs: &DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).add_ref(rhs)
            }
        }

        impl Sub<DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn sub(self, rhs: DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).sub_ref(&rhs)
            }
        }

        impl Sub<&DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn sub(self, rhs: &DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).sub_ref(rhs)
            }
        }

        impl Mul<DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn mul(self, rhs: DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).mul_ref(&rhs)
            }
        }

        impl Mul<&DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn mul(self, rhs: &DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).mul_ref(rhs)
            }
        }

        impl Div<DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn div(self, rhs: DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).div_ref(&rhs)
            }
        }

        impl Div<&DiffScalar<$float>> for $float {
            type Output = DiffScalar<$float>;

            fn div(self, rhs: &DiffScalar<$float>) -> DiffScalar<$float> {
                DiffScalar::constant(self).div_ref(rhs)
            }
        }
    )*};
}

impl_primitive_lhs_ops!(f32, f64);

/// Vector value with an optional sparse Jacobian (`rows == len`).
#[derive(Debug, Clone, PartialEq)]
pub struct DiffVector<T: Real> {
    value: DVector<T>,
    jacobian: Option<SparseJacobian<T>>,
}

impl<T: Real> DiffVector<T> {
    /// # Panics
    /// If the Jacobian row count differs from the value length.
    pub fn new(value: DVector<T>, jacobian: Option<SparseJacobian<T>>) -> Self {
        if let Some(j) = &jacobian {
            assert_eq!(
                j.rows(),
                value.len(),
                "Jacobian has {} rows for a vector of length {}",
                j.rows(),
                value.len()
            );
        }
        Self { value, jacobian }
    }

    pub fn constant(value: DVector<T>) -> Self {
        Self {
            value,
            jacobian: None,
        }
    }

    /// Stack scalars into a vector.
    ///
    /// The result has a Jacobian when at least one scalar has one; constant scalars become
    /// empty rows.
    pub fn from_scalars<I>(scalars: I) -> Self
    where
        I: IntoIterator<Item = DiffScalar<T>>,
    {
        let scalars: Vec<DiffScalar<T>> = scalars.into_iter().collect();
        let value = DVector::from_iterator(scalars.len(), scalars.iter().map(|s| s.value));
        if !scalars.iter().any(DiffScalar::has_jacobian) {
            return Self::constant(value);
        }

        let cols = scalars
            .iter()
            .filter_map(|s| s.jacobian.as_ref().map(SparseRow::required_cols))
            .max()
            .unwrap_or(0);
        let nnz = scalars
            .iter()
            .filter_map(|s| s.jacobian.as_ref().map(SparseRow::nnz))
            .sum();
        let mut matrix = SparseMatrix::empty(cols);
        matrix.reserve(scalars.len(), nnz);
        for s in &scalars {
            match &s.jacobian {
                Some(row) => matrix.push_row(row.indices(), row.values()),
                None => matrix.finish_row(),
            }
        }
        Self::new(value, Some(SparseJacobian::new(matrix)))
    }

    /// Concatenate vectors top to bottom. Constant parts contribute empty Jacobian rows.
    ///
    /// No parts at all give an empty vector with a `0 × 0` Jacobian.
    pub fn vstack(parts: &[DiffVector<T>]) -> Self {
        let len = parts.iter().map(DiffVector::len).sum();
        let value = DVector::from_iterator(
            len,
            parts.iter().flat_map(|p| p.value.iter().copied()),
        );
        if !parts.is_empty() && !parts.iter().any(DiffVector::has_jacobian) {
            return Self::constant(value);
        }

        let cols = parts
            .iter()
            .filter_map(|p| p.jacobian.as_ref().map(SparseJacobian::cols))
            .max()
            .unwrap_or(0);
        let mut matrix = SparseMatrix::empty(cols);
        for part in parts {
            match &part.jacobian {
                Some(j) => matrix.append_rows(j.matrix()),
                None => matrix.append_rows(&SparseMatrix::zeros(part.len(), cols)),
            }
        }
        Self::new(value, Some(SparseJacobian::new(matrix)))
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn value(&self) -> &DVector<T> {
        &self.value
    }

    pub fn jacobian(&self) -> Option<&SparseJacobian<T>> {
        self.jacobian.as_ref()
    }

    pub fn has_jacobian(&self) -> bool {
        self.jacobian.is_some()
    }

    pub fn into_parts(self) -> (DVector<T>, Option<SparseJacobian<T>>) {
        (self.value, self.jacobian)
    }

    /// Component `i` as a scalar, carrying row `i` of the Jacobian.
    pub fn get(&self, i: usize) -> DiffScalar<T> {
        let jacobian = self.jacobian.as_ref().map(|j| {
            let (cols, vals) = j.matrix().row(i);
            SparseRow {
                indices: cols.to_vec(),
                values: vals.to_vec(),
            }
        });
        DiffScalar::new(self.value[i], jacobian)
    }

    /// `‖value‖²`
    pub fn squared_norm(&self) -> T {
        self.value.iter().map(|&v| v * v).sum()
    }

    pub fn scaled(&self, factor: T) -> Self {
        let jacobian = self.jacobian.as_ref().map(|j| {
            let mut j = j.clone();
            j.scale(factor);
            j
        });
        Self {
            value: self.value.map(|v| v * factor),
            jacobian,
        }
    }

    fn combine(&self, a: T, other: &Self, b: T) -> Self {
        assert_eq!(
            self.len(),
            other.len(),
            "cannot combine vectors of length {} and {}",
            self.len(),
            other.len()
        );
        let value = DVector::from_iterator(
            self.len(),
            self.value
                .iter()
                .zip(other.value.iter())
                .map(|(&x, &y)| a * x + b * y),
        );
        let jacobian = match (&self.jacobian, &other.jacobian) {
            (Some(ja), Some(jb)) => Some(ja.linear_combination(a, jb, b)),
            (Some(ja), None) => {
                let mut j = ja.clone();
                j.scale(a);
                Some(j)
            }
            (None, Some(jb)) => {
                let mut j = jb.clone();
                j.scale(b);
                Some(j)
            }
            (None, None) => None,
        };
        Self { value, jacobian }
    }
}

impl<T: Real> Add<&DiffVector<T>> for &DiffVector<T> {
    type Output = DiffVector<T>;

    fn add(self, rhs: &DiffVector<T>) -> DiffVector<T> {
        self.combine(T::one(), rhs, T::one())
    }
}

impl<T: Real> Add for DiffVector<T> {
    type Output = DiffVector<T>;

    fn add(self, rhs: DiffVector<T>) -> DiffVector<T> {
        &self + &rhs
    }
}

impl<T: Real> Sub<&DiffVector<T>> for &DiffVector<T> {
    type Output = DiffVector<T>;

    fn sub(self, rhs: &DiffVector<T>) -> DiffVector<T> {
        self.combine(T::one(), rhs, -T::one())
    }
}

impl<T: Real> Sub for DiffVector<T> {
    type Output = DiffVector<T>;

    fn sub(self, rhs: DiffVector<T>) -> DiffVector<T> {
        &self - &rhs
    }
}

impl<T: Real> Mul<T> for &DiffVector<T> {
    type Output = DiffVector<T>;

    fn mul(self, rhs: T) -> DiffVector<T> {
        self.scaled(rhs)
    }
}

impl<T: Real> Mul<T> for DiffVector<T> {
    type Output = DiffVector<T>;

    fn mul(self, rhs: T) -> DiffVector<T> {
        self.scaled(rhs)
    }
}

impl<T: Real> Neg for DiffVector<T> {
    type Output = DiffVector<T>;

    fn neg(self) -> DiffVector<T> {
        self.scaled(-T::one())
    }
}
