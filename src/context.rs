//! # Run context
//! Everything a process needs to take part in the distributed
//! computation: communicator, grid extents and the transform
//! pipeline with its scratch buffers.
//!
//! Exactly one context exists per process. Operations that use
//! the scratch buffers take it by `&mut`, so two of them can
//! never be in flight at the same time.
use crate::comm::Comm;
use crate::error::Result;
use crate::fft::SpectralTransform;
use crate::field::{PhysicalField, VectorField};
use crate::grid::Grid;

/// Per process state of a run
pub struct RunContext<C: Comm> {
    /// Communicator
    pub comm: C,
    /// Global and local extents
    pub grid: Grid,
    /// Transform pipeline
    pub transform: SpectralTransform,
}

impl<C: Comm> RunContext<C> {
    /// Setup context for a grid of `n^3` points, split in
    /// `planes` kz chunks during transposes.
    ///
    /// # Errors
    /// `n` not compatible with the number of processes.
    pub fn new(comm: C, n: usize, planes: usize) -> Result<Self> {
        let grid = Grid::new(n, comm.size(), comm.rank())?;
        let transform = SpectralTransform::new(&grid, planes);
        tracing::debug!(
            "rank {}/{}: x planes {}..{}, ky planes {}..{}",
            grid.rank,
            grid.nprocs,
            grid.x0,
            grid.x0 + grid.nxl,
            grid.y0,
            grid.y0 + grid.nyl
        );
        Ok(Self {
            comm,
            grid,
            transform,
        })
    }

    /// Rank of this process
    pub fn rank(&self) -> usize {
        self.grid.rank
    }

    /// Spectral field in the layout of the time integrator
    pub fn spectral_field(&self) -> VectorField {
        VectorField::spectral(&self.grid)
    }

    /// Field in physical space
    pub fn physical_field(&self) -> PhysicalField {
        PhysicalField::physical(&self.grid)
    }

    /// Physical -> spectral
    ///
    /// # Errors
    /// See [`SpectralTransform::forward`]
    pub fn forward(&mut self, src: &PhysicalField, dst: &mut VectorField) -> Result<()> {
        self.transform.forward(&self.comm, &self.grid, src, dst)
    }

    /// Spectral -> physical
    ///
    /// # Errors
    /// See [`SpectralTransform::backward`]
    pub fn backward(&mut self, src: &VectorField, dst: &mut PhysicalField) -> Result<()> {
        self.transform.backward(&self.comm, &self.grid, src, dst)
    }
}
