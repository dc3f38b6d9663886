//! Checkpoints of velocity components
//!
//! One file per component, dataset `u` of global shape
//! `[n, n, n]` in single precision, row-major (x, y, z).
//! Each rank owns the x-slab `x0..x0+nxl`. Ranks access the
//! file one after the other, separated by barriers, so no
//! parallel hdf5 build and no global array are needed.
#![cfg(feature = "hdf5")]
use crate::comm::Comm;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::io::{dataset_shape, read_slice, write_slice};
use ndarray::{s, Array3};
use std::path::Path;

/// Dataset name inside each checkpoint file
pub const DSET: &str = "u";

/// Write local slab of a physical component
///
/// # Errors
/// Shape mismatch or failed hdf5 call. The error of a
/// rank is returned after all ranks passed their turn.
#[allow(clippy::cast_possible_truncation)]
pub fn write_component<C: Comm, P: AsRef<Path>>(
    comm: &C,
    grid: &Grid,
    path: P,
    data: &Array3<f64>,
) -> Result<()> {
    if data.shape() != grid.shape_physical() {
        return Err(Error::Shape {
            expected: grid.shape_physical().to_vec(),
            found: data.shape().to_vec(),
        });
    }
    let single = data.mapv(|v| v as f32);
    let slice = s![grid.x0..grid.x0 + grid.nxl, .., ..];
    let full = vec![grid.n; 3];
    if grid.rank == 0 && path.as_ref().exists() {
        std::fs::remove_file(path.as_ref())?;
    }
    let mut result = Ok(());
    for r in 0..grid.nprocs {
        if r == grid.rank {
            result = write_slice(path.as_ref(), DSET, &single, slice, full.clone());
        }
        comm.barrier();
    }
    result.map_err(Error::from)
}

/// Read local slab of a physical component
///
/// # Errors
/// Missing file, wrong global shape, failed hdf5 call.
pub fn read_component<C: Comm, P: AsRef<Path>>(
    comm: &C,
    grid: &Grid,
    path: P,
) -> Result<Array3<f64>> {
    let shape = dataset_shape(path.as_ref(), DSET)?;
    if shape != [grid.n, grid.n, grid.n] {
        return Err(Error::Shape {
            expected: vec![grid.n; 3],
            found: shape,
        });
    }
    let slice = s![grid.x0..grid.x0 + grid.nxl, .., ..];
    let mut result = Err(Error::Runtime("slab not read".to_owned()));
    for r in 0..grid.nprocs {
        if r == grid.rank {
            result = read_slice::<f32, _, _, _>(path.as_ref(), DSET, slice)
                .map(|a| a.mapv(f64::from))
                .map_err(Error::from);
        }
        comm.barrier();
    }
    result
}
