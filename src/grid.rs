//! # Grid
//! Periodic box (2pi)^3 with `n` points per direction, slab
//! decomposed across `nprocs` processes.
//!
//! Physical space is real valued and distributed along x
//! (`XSlab`, local shape `[nxl, n, n]`). Spectral space holds
//! `nz = n/2 + 1` modes along z (real-input symmetry) and is
//! distributed along ky after the forward transform
//! (`YSlab`, local shape `[nyl, nz, n]`, kx contiguous).
use crate::error::{Error, Result};
use std::f64::consts::PI;

/// Global and local extents of the distributed grid
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Points per direction (physical space)
    pub n: usize,
    /// Number of modes along kz (`n/2 + 1`)
    pub nz: usize,
    /// Number of processes
    pub nprocs: usize,
    /// Rank of this process
    pub rank: usize,
    /// Local extent along x (physical / `XSlab`)
    pub nxl: usize,
    /// Local extent along ky (`YSlab`)
    pub nyl: usize,
    /// Global index of first local x plane
    pub x0: usize,
    /// Global index of first local ky plane
    pub y0: usize,
}

impl Grid {
    /// Setup grid for `nprocs` processes.
    ///
    /// # Errors
    /// If `n` is odd, smaller than 4 or not divisible
    /// by the number of processes.
    pub fn new(n: usize, nprocs: usize, rank: usize) -> Result<Self> {
        if n < 4 || n % 2 != 0 {
            return Err(Error::Topology(format!(
                "grid size must be even and >= 4, got {}",
                n
            )));
        }
        if nprocs == 0 || rank >= nprocs {
            return Err(Error::Topology(format!(
                "rank {} out of range for {} processes",
                rank, nprocs
            )));
        }
        if n % nprocs != 0 {
            return Err(Error::Topology(format!(
                "grid size {} not divisible by number of processes {}",
                n, nprocs
            )));
        }
        let nxl = n / nprocs;
        let nyl = n / nprocs;
        Ok(Self {
            n,
            nz: n / 2 + 1,
            nprocs,
            rank,
            nxl,
            nyl,
            x0: rank * nxl,
            y0: rank * nyl,
        })
    }

    /// Local shape of real data in physical space (x, y, z)
    pub fn shape_physical(&self) -> [usize; 3] {
        [self.nxl, self.n, self.n]
    }

    /// Local shape of spectral data before the transpose (x, ky, kz)
    pub fn shape_xslab(&self) -> [usize; 3] {
        [self.nxl, self.n, self.nz]
    }

    /// Local shape of spectral data after the transpose (ky, kz, kx)
    pub fn shape_yslab(&self) -> [usize; 3] {
        [self.nyl, self.nz, self.n]
    }

    /// Grid spacing
    #[allow(clippy::cast_precision_loss)]
    pub fn dx(&self) -> f64 {
        2. * PI / self.n as f64
    }

    /// Physical coordinate of global index `i`
    #[allow(clippy::cast_precision_loss)]
    pub fn coord(&self, i: usize) -> f64 {
        self.dx() * i as f64
    }

    /// Wavenumber of index `i` along a full (non-halved) axis
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn wavenumber(&self, i: usize) -> f64 {
        if i <= self.n / 2 {
            i as f64
        } else {
            i as f64 - self.n as f64
        }
    }

    /// Wavenumber vector `[kx, ky, kz]` of local `YSlab` index `(j, l, i)`
    #[allow(clippy::cast_precision_loss)]
    pub fn k_yslab(&self, j: usize, l: usize, i: usize) -> [f64; 3] {
        [
            self.wavenumber(i),
            self.wavenumber(self.y0 + j),
            l as f64,
        ]
    }

    /// Weight of a kz plane when summing over the half spectrum.
    ///
    /// Modes `0 < kz < n/2` stand for themselves and their
    /// complex conjugate partner.
    pub fn mode_weight(&self, l: usize) -> f64 {
        if l == 0 || l == self.n / 2 {
            1.
        } else {
            2.
        }
    }

    /// Number of grid points in the whole box
    #[allow(clippy::cast_precision_loss)]
    pub fn npoints(&self) -> f64 {
        (self.n as f64).powi(3)
    }
}

/// Squared norm of a wavenumber vector
pub fn k2(k: &[f64; 3]) -> f64 {
    k[0] * k[0] + k[1] * k[1] + k[2] * k[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_extents() {
        let grid = Grid::new(16, 4, 2).unwrap();
        assert_eq!(grid.nxl, 4);
        assert_eq!(grid.nyl, 4);
        assert_eq!(grid.x0, 8);
        assert_eq!(grid.y0, 8);
        assert_eq!(grid.nz, 9);
        assert_eq!(grid.shape_physical(), [4, 16, 16]);
        assert_eq!(grid.shape_xslab(), [4, 16, 9]);
        assert_eq!(grid.shape_yslab(), [4, 9, 16]);
    }

    #[test]
    fn test_grid_not_divisible() {
        assert!(matches!(Grid::new(12, 5, 0), Err(Error::Topology(_))));
        assert!(matches!(Grid::new(7, 1, 0), Err(Error::Topology(_))));
        assert!(matches!(Grid::new(8, 2, 2), Err(Error::Topology(_))));
    }

    #[test]
    fn test_wavenumbers() {
        let grid = Grid::new(8, 1, 0).unwrap();
        let k: Vec<f64> = (0..8).map(|i| grid.wavenumber(i)).collect();
        assert_eq!(k, vec![0., 1., 2., 3., 4., -3., -2., -1.]);
        assert_eq!(grid.mode_weight(0), 1.);
        assert_eq!(grid.mode_weight(2), 2.);
        assert_eq!(grid.mode_weight(4), 1.);
    }
}
