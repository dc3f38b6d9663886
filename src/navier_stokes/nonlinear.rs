//! # Nonlinear term
//! Rotational form `P(u x omega)`, evaluated pseudo-spectrally:
//! velocity and vorticity are transformed to physical space in
//! one batched pipeline, multiplied pointwise and transformed
//! back.
//!
//! The grid is shifted by `delta` before the products are
//! formed and shifted back afterwards, which randomizes the
//! aliasing error that survives the 2/3 rule.
use crate::comm::Comm;
use crate::context::RunContext;
use crate::dealias::{curl, dealias, project, shift};
use crate::error::Result;
use crate::field::{PhysicalField, VectorField};
use crate::grid::Grid;
use ndarray::Zip;

/// Work fields of the nonlinear term
pub struct Nonlinear {
    /// Shifted velocity (spectral)
    us: VectorField,
    /// Vorticity (spectral)
    omega: VectorField,
    /// Velocity (physical)
    u: PhysicalField,
    /// Vorticity, then `u x omega` (physical)
    w: PhysicalField,
}

impl Nonlinear {
    /// Allocate work fields
    pub fn new(grid: &Grid) -> Self {
        Self {
            us: VectorField::spectral(grid),
            omega: VectorField::spectral(grid),
            u: PhysicalField::physical(grid),
            w: PhysicalField::physical(grid),
        }
    }

    /// Nonlinear right hand side of `u` into `out`.
    ///
    /// Returns the local maxima of `|u_i|` in physical space.
    ///
    /// # Errors
    /// Wrong decomposition or shape, failed exchange.
    pub fn eval<C: Comm>(
        &mut self,
        ctx: &mut RunContext<C>,
        u: &VectorField,
        delta: [f64; 3],
        out: &mut VectorField,
    ) -> Result<[f64; 3]> {
        let RunContext {
            comm,
            grid,
            transform,
        } = ctx;
        let (comm, grid) = (&*comm, &*grid);
        let Self { us, omega, u: up, w } = self;

        us.assign(u)?;
        shift(grid, us, delta, 1.)?;
        curl(grid, us, omega)?;
        transform.backward_many(comm, grid, &[&*us, &*omega], &mut [&mut *up, &mut *w])?;
        let umax = up.max_abs();

        cross(up, w);

        transform.forward(comm, grid, w, out)?;
        shift(grid, out, delta, -1.)?;
        dealias(grid, out)?;
        project(grid, out)?;
        Ok(umax)
    }
}

/// `w <- u x w`
fn cross(u: &PhysicalField, w: &mut PhysicalField) {
    let PhysicalField { x, y, z, .. } = w;
    Zip::from(x)
        .and(y)
        .and(z)
        .and(&u.x)
        .and(&u.y)
        .and(&u.z)
        .par_for_each(|wx, wy, wz, &ux, &uy, &uz| {
            let (ox, oy, oz) = (*wx, *wy, *wz);
            *wx = uy * oz - uz * oy;
            *wy = uz * ox - ux * oz;
            *wz = ux * oy - uy * ox;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{run_ranks, SerialComm};
    use crate::statistics::energy;

    fn approx_eq(a: f64, b: f64, tol: f64) {
        if (a - b).abs() > tol {
            panic!("Large difference of values, got {} expected {}.", a, b)
        }
    }

    #[test]
    fn test_cross() {
        let grid = Grid::new(4, 1, 0).unwrap();
        let u = PhysicalField::from_fn(&grid, |_, _, _| [1., 0., 0.]);
        let mut w = PhysicalField::from_fn(&grid, |_, _, _| [0., 1., 0.]);
        cross(&u, &mut w);
        assert!(w.z.iter().all(|v| *v == 1.));
        assert!(w.x.iter().all(|v| *v == 0.));
        assert!(w.y.iter().all(|v| *v == 0.));
    }

    #[test]
    fn test_single_mode_is_exact_solution() {
        // a single Fourier mode with u || omega has no nonlinear term
        let mut ctx = RunContext::new(SerialComm, 8, 2).unwrap();
        let p = PhysicalField::from_fn(&ctx.grid, |_, _, z| [z.sin(), z.cos(), 0.]);
        let mut u = ctx.spectral_field();
        ctx.forward(&p, &mut u).unwrap();
        let mut nl = Nonlinear::new(&ctx.grid);
        let mut out = ctx.spectral_field();
        let umax = nl.eval(&mut ctx, &u, [0.1, 0.2, 0.3], &mut out).unwrap();
        assert!(umax[0] <= 1. + 1e-12 && umax[0] > 0.9);
        approx_eq(energy(&ctx.comm, &ctx.grid, &out).unwrap(), 0., 1e-20);
    }

    #[test]
    fn test_taylor_green_nonlinear_term() {
        let mut ctx = RunContext::new(SerialComm, 16, 4).unwrap();
        let p = PhysicalField::from_fn(&ctx.grid, |x, y, z| {
            [
                x.sin() * y.cos() * z.cos(),
                -x.cos() * y.sin() * z.cos(),
                0.,
            ]
        });
        let mut u = ctx.spectral_field();
        ctx.forward(&p, &mut u).unwrap();
        let mut nl = Nonlinear::new(&ctx.grid);
        let mut out = ctx.spectral_field();
        nl.eval(&mut ctx, &u, [0.; 3], &mut out).unwrap();
        // u . P(u x omega) = 0
        let mut dot = 0.;
        for (a, b) in u.components().iter().zip(out.components()) {
            for ((j, l, i), va) in a.indexed_iter() {
                dot += ctx.grid.mode_weight(l) * (va.conj() * b[[j, l, i]]).re;
            }
        }
        approx_eq(dot / ctx.grid.npoints().powi(2), 0., 1e-10);
        assert!(energy(&ctx.comm, &ctx.grid, &out).unwrap() > 1e-4);
    }

    fn nonlinear_energy<C: Comm>(comm: C, delta: [f64; 3]) -> f64 {
        let mut ctx = RunContext::new(comm, 8, 2).unwrap();
        let p = PhysicalField::from_fn(&ctx.grid, |x, y, z| {
            [y.sin() + z.cos(), (2. * x).cos(), x.sin() * y.sin()]
        });
        let mut u = ctx.spectral_field();
        ctx.forward(&p, &mut u).unwrap();
        let mut nl = Nonlinear::new(&ctx.grid);
        let mut out = ctx.spectral_field();
        nl.eval(&mut ctx, &u, delta, &mut out).unwrap();
        energy(&ctx.comm, &ctx.grid, &out).unwrap()
    }

    #[test]
    fn test_phase_shift_independent_of_ranks() {
        let delta = [0.05, 0.11, 0.02];
        let serial = nonlinear_energy(SerialComm, delta);
        assert!(serial > 0.);
        for e in run_ranks(2, |comm| nonlinear_energy(comm, delta)) {
            approx_eq(e, serial, 1e-10 * serial.max(1.));
        }
    }
}
