//! # Spectral transform
//! Distributed 3D real-to-complex transform built from 1D
//! transforms (`rustfft`) along the local axes and one
//! transpose per direction.
//!
//! Forward (`XSlab` real -> `YSlab` complex):
//! 1. r2c along z (n -> n/2+1)
//! 2. c2c along y
//! 3. transpose, with c2c along x fused into each unpacked plane
//!
//! Backward is the reverse and scales by `1/n^3`. It works on a
//! copy, so the spectral input is left untouched.
use crate::comm::Comm;
use crate::error::{Error, Result};
use crate::field::{Decomp, PhysicalField, VectorField};
use crate::grid::Grid;
use crate::transpose::Transposer;
use crate::types::{czeros, Complex64};
use ndarray::{Array3, ArrayViewMut3, Axis, Zip};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Apply `fft` in place to all lanes along `axis` (1 or 2),
/// parallel over the planes of axis 0.
fn transform_lanes(fft: &Arc<dyn Fft<f64>>, mut data: ArrayViewMut3<Complex64>, axis: usize) {
    debug_assert!(axis == 1 || axis == 2);
    let len = data.shape()[axis];
    Zip::from(data.axis_iter_mut(Axis(0))).par_for_each(|mut plane| {
        let mut buffer = czeros(len);
        let mut scratch = czeros(fft.get_inplace_scratch_len());
        for mut lane in plane.lanes_mut(Axis(axis - 1)) {
            if let Some(slice) = lane.as_slice_mut() {
                fft.process_with_scratch(slice, &mut scratch);
            } else {
                buffer.iter_mut().zip(lane.iter()).for_each(|(b, v)| *b = *v);
                fft.process_with_scratch(&mut buffer, &mut scratch);
                lane.iter_mut().zip(buffer.iter()).for_each(|(v, b)| *v = *b);
            }
        }
    });
}

/// Forward transform pipeline and its inverse
pub struct SpectralTransform {
    fwd: Arc<dyn Fft<f64>>,
    bwd: Arc<dyn Fft<f64>>,
    transposer: Transposer,
    /// Complex work arrays in `XSlab`, one per component in flight
    xslab: Vec<Array3<Complex64>>,
    /// Copies of the spectral input of a backward transform
    yslab: Vec<Array3<Complex64>>,
    scale: f64,
}

impl SpectralTransform {
    /// Plan transforms of size `grid.n`. The transpose is
    /// split into `planes` kz chunks per component.
    pub fn new(grid: &Grid, planes: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            fwd: planner.plan_fft_forward(grid.n),
            bwd: planner.plan_fft_inverse(grid.n),
            transposer: Transposer::new(grid, planes),
            xslab: (0..3).map(|_| Array3::zeros(grid.shape_xslab())).collect(),
            yslab: (0..3).map(|_| Array3::zeros(grid.shape_yslab())).collect(),
            scale: 1. / grid.npoints(),
        }
    }

    fn reserve(&mut self, grid: &Grid, ncomp: usize) {
        while self.xslab.len() < ncomp {
            self.xslab.push(Array3::zeros(grid.shape_xslab()));
            self.yslab.push(Array3::zeros(grid.shape_yslab()));
        }
    }

    /// Physical -> spectral
    ///
    /// # Errors
    /// Wrong decomposition or shape, failed exchange.
    pub fn forward<C: Comm>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &PhysicalField,
        dst: &mut VectorField,
    ) -> Result<()> {
        self.forward_many(comm, grid, &[src], &mut [dst])
    }

    /// Spectral -> physical
    ///
    /// # Errors
    /// Wrong decomposition or shape, failed exchange.
    pub fn backward<C: Comm>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &VectorField,
        dst: &mut PhysicalField,
    ) -> Result<()> {
        self.backward_many(comm, grid, &[src], &mut [dst])
    }

    /// Transform several fields with a single pipelined exchange
    ///
    /// # Errors
    /// Wrong decomposition or shape of any field (checked
    /// before any work is done), failed exchange.
    pub fn forward_many<C: Comm>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &[&PhysicalField],
        dst: &mut [&mut VectorField],
    ) -> Result<()> {
        check_count(src.len(), dst.len())?;
        for f in src {
            f.expect_decomp(Decomp::XSlab)?;
            f.expect_shape(grid.shape_physical())?;
        }
        for f in dst.iter() {
            f.expect_decomp(Decomp::YSlab)?;
            f.expect_shape(grid.shape_yslab())?;
        }
        let ncomp = 3 * src.len();
        self.reserve(grid, ncomp);
        let Self {
            fwd,
            transposer,
            xslab,
            ..
        } = self;

        let inputs = src.iter().flat_map(|f| f.components());
        for (work, input) in xslab.iter_mut().zip(inputs) {
            r2c_z(fwd, input, work);
            transform_lanes(fwd, work.view_mut(), 1);
        }

        let work: Vec<&Array3<Complex64>> = xslab.iter().take(ncomp).collect();
        let mut out: Vec<&mut Array3<Complex64>> =
            dst.iter_mut().flat_map(|f| f.components_mut()).collect();
        let fwd = &*fwd;
        transposer.x_to_y(comm, grid, &work, &mut out, |v| transform_lanes(fwd, v, 2))
    }

    /// Transform several fields with a single pipelined exchange.
    /// The inputs are left unchanged.
    ///
    /// # Errors
    /// Wrong decomposition or shape of any field (checked
    /// before any work is done), failed exchange.
    pub fn backward_many<C: Comm>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &[&VectorField],
        dst: &mut [&mut PhysicalField],
    ) -> Result<()> {
        check_count(src.len(), dst.len())?;
        for f in src {
            f.expect_decomp(Decomp::YSlab)?;
            f.expect_shape(grid.shape_yslab())?;
        }
        for f in dst.iter() {
            f.expect_decomp(Decomp::XSlab)?;
            f.expect_shape(grid.shape_physical())?;
        }
        let ncomp = 3 * src.len();
        self.reserve(grid, ncomp);
        let Self {
            bwd,
            transposer,
            xslab,
            yslab,
            scale,
            ..
        } = self;

        let inputs = src.iter().flat_map(|f| f.components());
        for (copy, input) in yslab.iter_mut().zip(inputs) {
            Zip::from(copy).and(input).par_for_each(|c, &v| *c = v);
        }

        {
            let mut copies: Vec<&mut Array3<Complex64>> = yslab.iter_mut().take(ncomp).collect();
            let mut work: Vec<&mut Array3<Complex64>> = xslab.iter_mut().take(ncomp).collect();
            let bwd = &*bwd;
            transposer.y_to_x(comm, grid, &mut copies, &mut work, |v| {
                transform_lanes(bwd, v, 2);
            })?;
        }

        let outputs = dst.iter_mut().flat_map(|f| f.components_mut());
        for (work, output) in xslab.iter_mut().zip(outputs) {
            transform_lanes(bwd, work.view_mut(), 1);
            c2r_z(bwd, work, output, *scale);
        }
        Ok(())
    }
}

/// Real to complex along z, keeps `n/2+1` modes
fn r2c_z(fft: &Arc<dyn Fft<f64>>, input: &Array3<f64>, out: &mut Array3<Complex64>) {
    let n = input.shape()[2];
    Zip::from(out.outer_iter_mut())
        .and(input.outer_iter())
        .par_for_each(|mut out, input| {
            let mut buffer = czeros(n);
            let mut scratch = czeros(fft.get_inplace_scratch_len());
            for (mut o, i) in out.outer_iter_mut().zip(input.outer_iter()) {
                for (b, v) in buffer.iter_mut().zip(i.iter()) {
                    *b = Complex64::new(*v, 0.);
                }
                fft.process_with_scratch(&mut buffer, &mut scratch);
                for (o, b) in o.iter_mut().zip(buffer.iter()) {
                    *o = *b;
                }
            }
        });
}

/// Complex to real along z, restores the conjugate half
fn c2r_z(fft: &Arc<dyn Fft<f64>>, input: &Array3<Complex64>, out: &mut Array3<f64>, scale: f64) {
    let n = out.shape()[2];
    let nz = n / 2 + 1;
    Zip::from(out.outer_iter_mut())
        .and(input.outer_iter())
        .par_for_each(|mut out, input| {
            let mut buffer = czeros(n);
            let mut scratch = czeros(fft.get_inplace_scratch_len());
            for (mut o, i) in out.outer_iter_mut().zip(input.outer_iter()) {
                for k in 0..nz {
                    buffer[k] = i[k];
                }
                for k in nz..n {
                    buffer[k] = i[n - k].conj();
                }
                fft.process_with_scratch(&mut buffer, &mut scratch);
                for (o, b) in o.iter_mut().zip(buffer.iter()) {
                    *o = b.re * scale;
                }
            }
        });
}

fn check_count(nsrc: usize, ndst: usize) -> Result<()> {
    if nsrc == ndst {
        Ok(())
    } else {
        Err(Error::Shape {
            expected: vec![nsrc],
            found: vec![ndst],
        })
    }
}
