//! Core linear-algebra traits for kspsolve.

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Inner products & norms.
pub trait InnerProduct<V> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd + From<f64>;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// Uniform shape queries for operators and vectors.
pub trait Indexing {
    /// Number of rows (or length for a vector).
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize {
        self.nrows()
    }
    /// Number of stored entries.
    fn nnz(&self) -> usize {
        self.nrows() * self.ncols()
    }
}

/// Random access to a single entry; absent entries read as zero.
pub trait MatrixGet<T> {
    fn get(&self, i: usize, j: usize) -> T;
}

/// Read-only access to the stored pattern and values of one row.
pub trait RowPattern<T> {
    /// Column indices stored in row `i`, strictly increasing.
    fn row_indices(&self, i: usize) -> &[usize];
    /// Values matching `row_indices(i)`.
    fn row_values(&self, i: usize) -> &[T];
}
