//! Matrix module: CSR storage, row ownership layouts and test-problem generators.

pub mod generators;
pub mod layout;
pub mod sparse;

pub use generators::{MatrixInfo, MatrixKind, diagonal, laplace_1d, matrix_info, random_sparse, rhs_vector};
pub use layout::Layout;
pub use sparse::{CsrMatrix, RowInserter, SparseMatrix};
