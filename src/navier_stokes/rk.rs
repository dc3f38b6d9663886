//! # Runge-Kutta stages
//! Stage combinations with integrating factor
//! `E(tau) = exp(-nu k^2 tau)`, so that the viscous term is
//! integrated exactly.
//!
//! Buffers: state `u`, work `w`, right hand side `r` (the
//! nonlinear and forcing terms of the latest stage).
//!
//! RK2 (Heun)
//! ```text
//! w = E(dt) (u + dt r(u))
//! u = E(dt) (u + dt/2 r(u)) + dt/2 r(w)
//! ```
//! RK3 (strong stability preserving, Shu-Osher form)
//! ```text
//! w = E(dt) (u + dt r(u))
//! w = 3/4 E(dt/2) u + 1/4 E(-dt/2) (w + dt r(w))
//! u = 1/3 E(dt) u + 2/3 E(dt/2) (w + dt r(w))
//! ```
use crate::error::Result;
use crate::field::{Decomp, VectorField};
use crate::grid::{k2, Grid};
use crate::types::Complex64;
use ndarray::Zip;

/// `dst <- f(k^2, dst, a, b)` for all modes
fn kernel<F>(grid: &Grid, dst: &mut VectorField, a: &VectorField, b: &VectorField, f: F) -> Result<()>
where
    F: Fn(f64, Complex64, Complex64, Complex64) -> Complex64 + Sync,
{
    for field in [&*dst, a, b] {
        field.expect_decomp(Decomp::YSlab)?;
        field.expect_shape(grid.shape_yslab())?;
    }
    let parts = dst.components_mut().into_iter().zip(a.components()).zip(b.components());
    for ((d, a), b) in parts {
        Zip::indexed(d).and(a).and(b).par_for_each(|(j, l, i), d, &a, &b| {
            let kk = k2(&grid.k_yslab(j, l, i));
            *d = f(kk, *d, a, b);
        });
    }
    Ok(())
}

/// RK2 first stage: predictor into `w`, partial update of `u`
///
/// # Errors
/// Wrong decomposition or shape.
pub fn rk2_predict(
    grid: &Grid,
    nu: f64,
    dt: f64,
    u: &mut VectorField,
    w: &mut VectorField,
    r: &VectorField,
) -> Result<()> {
    kernel(grid, w, u, r, |kk, _, u, r| (u + r * dt) * (-nu * kk * dt).exp())?;
    kernel(grid, u, r, r, |kk, u, r, _| (u + r * (0.5 * dt)) * (-nu * kk * dt).exp())
}

/// RK2 final stage, `u += dt/2 r`
///
/// # Errors
/// Wrong decomposition or shape.
pub fn rk2_correct(grid: &Grid, dt: f64, u: &mut VectorField, r: &VectorField) -> Result<()> {
    kernel(grid, u, r, r, |_, u, r, _| u + r * (0.5 * dt))
}

/// RK3 first stage into `w`
///
/// # Errors
/// Wrong decomposition or shape.
pub fn rk3_stage1(
    grid: &Grid,
    nu: f64,
    dt: f64,
    u: &VectorField,
    w: &mut VectorField,
    r: &VectorField,
) -> Result<()> {
    kernel(grid, w, u, r, |kk, _, u, r| (u + r * dt) * (-nu * kk * dt).exp())
}

/// RK3 second stage into `w`
///
/// # Errors
/// Wrong decomposition or shape.
pub fn rk3_stage2(
    grid: &Grid,
    nu: f64,
    dt: f64,
    u: &VectorField,
    w: &mut VectorField,
    r: &VectorField,
) -> Result<()> {
    kernel(grid, w, u, r, |kk, w, u, r| {
        let e = (-0.5 * nu * kk * dt).exp();
        u * (0.75 * e) + (w + r * dt) * (0.25 / e)
    })
}

/// RK3 final stage into `u`
///
/// # Errors
/// Wrong decomposition or shape.
pub fn rk3_stage3(
    grid: &Grid,
    nu: f64,
    dt: f64,
    u: &mut VectorField,
    w: &VectorField,
    r: &VectorField,
) -> Result<()> {
    kernel(grid, u, w, r, |kk, u, w, r| {
        let e = (-0.5 * nu * kk * dt).exp();
        u * (e * e / 3.) + (w + r * dt) * (2. * e / 3.)
    })
}
