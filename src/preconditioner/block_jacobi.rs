// Block-Jacobi preconditioner implementation

use std::fmt;
use std::ops::Range;

use num_traits::Float;

use crate::core::traits::{Indexing, RowPattern};
use crate::error::KError;
use crate::matrix::Layout;
use crate::preconditioner::Preconditioner;
use crate::preconditioner::ilu::Ilu0;

/// Block-Jacobi preconditioner.
///
/// The rows are split into `blocks` contiguous ownership ranges; each diagonal
/// block is factored with ILU(0) and the blocks are applied independently.
#[derive(Clone, Debug)]
pub struct BlockJacobi<T> {
    pub blocks: usize,
    layout: Option<Layout>,
    block_factors: Vec<Ilu0<T>>,
}

impl<T: Float + Send + Sync> BlockJacobi<T> {
    pub fn new(blocks: usize) -> Self {
        Self { blocks, layout: None, block_factors: Vec::new() }
    }

    /// Row ranges of the blocks, available after `setup`.
    pub fn block_ranges(&self) -> Vec<Range<usize>> {
        self.layout
            .as_ref()
            .map(|l| l.ranges().collect())
            .unwrap_or_default()
    }

    /// Apply: z = M⁻¹ r
    pub fn solve(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let layout = self
            .layout
            .as_ref()
            .ok_or(KError::Unsupported("block jacobi applied before setup"))?;
        if r.len() != layout.size() || z.len() != layout.size() {
            return Err(KError::DimensionMismatch(format!(
                "block jacobi set up for {} rows, applied to {} -> {}",
                layout.size(),
                r.len(),
                z.len()
            )));
        }
        let mut chunks = Vec::with_capacity(layout.parts());
        let mut rest = z;
        for range in layout.ranges() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            chunks.push((range, head));
            rest = tail;
        }
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            chunks
                .into_par_iter()
                .zip(self.block_factors.par_iter())
                .try_for_each(|((range, zb), ilu)| ilu.solve(&r[range], zb))
        }
        #[cfg(not(feature = "rayon"))]
        {
            chunks
                .into_iter()
                .zip(self.block_factors.iter())
                .try_for_each(|((range, zb), ilu)| ilu.solve(&r[range], zb))
        }
    }
}

impl<T: Float + Send + Sync> Default for BlockJacobi<T> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<T> fmt::Display for BlockJacobi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: bjacobi")?;
        writeln!(f, "  number of blocks = {}", self.blocks)?;
        write!(f, "  Local solver information for each block: ilu(0)")
    }
}

impl<M, V, T> Preconditioner<M, V> for BlockJacobi<T>
where
    M: RowPattern<T> + Indexing + Sync,
    V: AsRef<[T]> + AsMut<[T]>,
    T: Float + Send + Sync,
{
    /// Setup: factor each block with ILU(0)
    fn setup(&mut self, a: &M) -> Result<(), KError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(KError::DimensionMismatch(format!(
                "block jacobi needs a square matrix, got {} x {}",
                n,
                a.ncols()
            )));
        }
        let layout = Layout::split(n, self.blocks)?;
        let ranges: Vec<Range<usize>> = layout.ranges().collect();
        #[cfg(feature = "rayon")]
        let factors = {
            use rayon::prelude::*;
            ranges
                .into_par_iter()
                .map(|range| Ilu0::factor_block(a, range))
                .collect::<Result<Vec<_>, _>>()?
        };
        #[cfg(not(feature = "rayon"))]
        let factors = ranges
            .into_iter()
            .map(|range| Ilu0::factor_block(a, range))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("bjacobi: factored {} blocks of {} rows", factors.len(), n);
        self.block_factors = factors;
        self.layout = Some(layout);
        Ok(())
    }

    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError> {
        self.solve(r.as_ref(), z.as_mut())
    }
}
