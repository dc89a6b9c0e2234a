//! Preconditioner context and configuration for Krylov solvers.
//!
//! `PcType` names the supported preconditioners the way PETSc's `-pc_type`
//! does, and [`build_pc`] turns a type plus [`PcOptions`] into a boxed
//! preconditioner ready for `setup`.
//!
//! # Supported Preconditioners
//!
//! - `jacobi`: diagonal scaling.
//! - `bjacobi`: block Jacobi with ILU(0) inside each block.
//! - `none`: identity.
//!
//! # Example
//!
//! ```rust
//! use kspsolve::context::pc_context::PcType;
//! let pc: PcType = "bjacobi".parse().unwrap();
//! assert_eq!(pc, PcType::BJacobi);
//! ```

use std::fmt;
use std::str::FromStr;

use num_traits::Float;

use crate::config::options::PcOptions;
use crate::core::traits::{Indexing, MatrixGet, RowPattern};
use crate::error::KError;
use crate::preconditioner::{BlockJacobi, Jacobi, PcNone, Preconditioner};

/// Preconditioner selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PcType {
    /// Diagonal scaling
    #[default]
    Jacobi,
    /// Block Jacobi, ILU(0) per block
    #[value(name = "bjacobi")]
    BJacobi,
    /// No preconditioning
    None,
}

impl PcType {
    pub const ALL: [PcType; 3] = [PcType::Jacobi, PcType::BJacobi, PcType::None];

    /// PETSc type name.
    pub fn as_str(self) -> &'static str {
        match self {
            PcType::Jacobi => "jacobi",
            PcType::BJacobi => "bjacobi",
            PcType::None => "none",
        }
    }

    /// Human-readable name used in reports.
    pub fn label(self) -> &'static str {
        match self {
            PcType::Jacobi => "Jacobi",
            PcType::BJacobi => "Block Jacobi",
            PcType::None => "None",
        }
    }
}

impl fmt::Display for PcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PcType {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jacobi" => Ok(PcType::Jacobi),
            "bjacobi" => Ok(PcType::BJacobi),
            "none" => Ok(PcType::None),
            other => Err(KError::InvalidArgument(format!("unknown preconditioner type '{other}'"))),
        }
    }
}

/// Side on which the preconditioner is applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PcSide {
    #[default]
    Left,
    Right,
}

impl fmt::Display for PcSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PcSide::Left => "LEFT",
            PcSide::Right => "RIGHT",
        })
    }
}

/// Build an unset-up preconditioner of the requested type.
pub fn build_pc<M, T>(pc_type: PcType, opts: &PcOptions) -> Result<Box<dyn Preconditioner<M, Vec<T>>>, KError>
where
    M: MatrixGet<T> + RowPattern<T> + Indexing + Sync + 'static,
    T: Float + Send + Sync + 'static,
{
    let pc: Box<dyn Preconditioner<M, Vec<T>>> = match pc_type {
        PcType::Jacobi => Box::new(Jacobi::<T>::new()),
        PcType::BJacobi => {
            if opts.bjacobi_blocks == 0 {
                return Err(KError::InvalidArgument("block jacobi needs at least one block".into()));
            }
            Box::new(BlockJacobi::<T>::new(opts.bjacobi_blocks))
        }
        PcType::None => Box::new(PcNone),
    };
    Ok(pc)
}
