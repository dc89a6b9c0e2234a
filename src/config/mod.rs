//! Run-time configuration.

pub mod options;

pub use options::{KspOptions, MatrixOptions, PcOptions, SolverOptions};
