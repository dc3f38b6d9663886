//! # Dealiasing and symmetry
//! Spectral space operations on `YSlab` fields (local index
//! order (ky, kz, kx)):
//! - [`dealias`]: 2/3 rule per axis
//! - [`impose_symmetry`]: mean and Nyquist modes zero, kz = 0
//!   plane conjugate symmetric
//! - [`project`]: remove the divergent part
//! - [`curl`], [`shift`]: building blocks of the nonlinear term
use crate::comm::Comm;
use crate::error::Result;
use crate::field::{Decomp, VectorField};
use crate::grid::{k2, Grid};
use crate::types::{Complex64, CZERO, IMAG};
use ndarray::{s, Array3, Zip};

/// First index of a full axis that is removed by the 2/3 rule
fn cutoff(n: usize) -> usize {
    (n + 2) / 3
}

/// Local ky rows `[lo, hi)` that overlap the global range `[a, b)`
fn local_rows(grid: &Grid, a: usize, b: usize) -> Option<(usize, usize)> {
    let lo = a.max(grid.y0);
    let hi = b.min(grid.y0 + grid.nyl);
    if lo < hi {
        Some((lo - grid.y0, hi - grid.y0))
    } else {
        None
    }
}

/// Dealias field (2/3 rule)
///
/// Zero all modes with `|kx| >= n/3`, `|ky| >= n/3` or
/// `kz >= n/3`. Nyquist modes are always removed.
///
/// # Errors
/// Field is not in `YSlab` decomposition.
pub fn dealias(grid: &Grid, field: &mut VectorField) -> Result<()> {
    field.expect_decomp(Decomp::YSlab)?;
    let n = grid.n;
    let kc = cutoff(n);
    let rows = local_rows(grid, kc, n - kc + 1);
    for c in field.components_mut() {
        c.slice_mut(s![.., kc.., ..]).fill(CZERO);
        c.slice_mut(s![.., .., kc..=n - kc]).fill(CZERO);
        if let Some((lo, hi)) = rows {
            c.slice_mut(s![lo..hi, .., ..]).fill(CZERO);
        }
    }
    Ok(())
}

/// Project onto divergence free fields, `v - k (k.v) / |k|^2`.
/// The mean mode is left untouched.
///
/// # Errors
/// Field is not in `YSlab` decomposition.
pub fn project(grid: &Grid, field: &mut VectorField) -> Result<()> {
    field.expect_decomp(Decomp::YSlab)?;
    let VectorField { x, y, z, .. } = field;
    Zip::indexed(x)
        .and(y)
        .and(z)
        .par_for_each(|(j, l, i), vx, vy, vz| {
            let k = grid.k_yslab(j, l, i);
            let kk = k2(&k);
            if kk > 0. {
                let kv = (*vx * k[0] + *vy * k[1] + *vz * k[2]) / kk;
                *vx -= kv * k[0];
                *vy -= kv * k[1];
                *vz -= kv * k[2];
            }
        });
    Ok(())
}

/// Vorticity `omega = i k x u`
///
/// # Errors
/// Either field is not in `YSlab` decomposition.
pub fn curl(grid: &Grid, u: &VectorField, omega: &mut VectorField) -> Result<()> {
    u.expect_decomp(Decomp::YSlab)?;
    omega.expect_decomp(Decomp::YSlab)?;
    // omega_c = i (k_a u_b - k_b u_a)
    let parts: [(usize, usize, &Array3<Complex64>, &Array3<Complex64>); 3] =
        [(1, 2, &u.z, &u.y), (2, 0, &u.x, &u.z), (0, 1, &u.y, &u.x)];
    for (w, (a, b, ub, ua)) in omega.components_mut().into_iter().zip(parts) {
        Zip::indexed(w)
            .and(ub)
            .and(ua)
            .par_for_each(|(j, l, i), w, &ub, &ua| {
                let k = grid.k_yslab(j, l, i);
                *w = IMAG * (ub * k[a] - ua * k[b]);
            });
    }
    Ok(())
}

/// Multiply by `exp(sign * i k.delta)`, a shift of the
/// physical field by `-sign * delta`.
///
/// # Errors
/// Field is not in `YSlab` decomposition.
pub fn shift(grid: &Grid, field: &mut VectorField, delta: [f64; 3], sign: f64) -> Result<()> {
    field.expect_decomp(Decomp::YSlab)?;
    if delta == [0.; 3] {
        return Ok(());
    }
    let VectorField { x, y, z, .. } = field;
    Zip::indexed(x)
        .and(y)
        .and(z)
        .par_for_each(|(j, l, i), vx, vy, vz| {
            let k = grid.k_yslab(j, l, i);
            let phase = sign * (k[0] * delta[0] + k[1] * delta[1] + k[2] * delta[2]);
            let e = Complex64::from_polar(1., phase);
            *vx *= e;
            *vy *= e;
            *vz *= e;
        });
    Ok(())
}

/// Enforce the constraints of a real physical field.
///
/// - mean mode (0, 0, 0) is zero
/// - Nyquist planes `kx = n/2`, `ky = n/2`, `kz = n/2` are zero
/// - kz = 0 plane: `v(-kx, -ky) = conj(v(kx, ky))`, enforced by
///   averaging each pair, after one all-gather of the plane
///
/// # Errors
/// Field is not in `YSlab` decomposition, failed exchange.
pub fn impose_symmetry<C: Comm>(comm: &C, grid: &Grid, field: &mut VectorField) -> Result<()> {
    field.expect_decomp(Decomp::YSlab)?;
    let n = grid.n;
    let rows = local_rows(grid, n / 2, n / 2 + 1);
    for c in field.components_mut() {
        c.slice_mut(s![.., n / 2, ..]).fill(CZERO);
        c.slice_mut(s![.., .., n / 2]).fill(CZERO);
        if let Some((lo, hi)) = rows {
            c.slice_mut(s![lo..hi, .., ..]).fill(CZERO);
        }
        if grid.y0 == 0 {
            c[[0, 0, 0]] = CZERO;
        }
    }

    // gather kz = 0 plane, layout [comp][ky][kx] per rank
    let (nyl, ncomp) = (grid.nyl, 3);
    let mut send = Vec::with_capacity(2 * ncomp * nyl * n);
    for c in field.components() {
        for v in c.slice(s![.., 0, ..]).iter() {
            send.push(v.re);
            send.push(v.im);
        }
    }
    let mut recv = vec![0.; send.len() * grid.nprocs];
    comm.all_gather(&send, &mut recv)?;
    let plane = |comp: usize, jg: usize, i: usize| {
        let (r, j) = (jg / nyl, jg % nyl);
        let idx = 2 * (((r * ncomp + comp) * nyl + j) * n + i);
        Complex64::new(recv[idx], recv[idx + 1])
    };

    for (comp, c) in field.components_mut().into_iter().enumerate() {
        let mut p = c.slice_mut(s![.., 0, ..]);
        for ((j, i), v) in p.indexed_iter_mut() {
            let jg = grid.y0 + j;
            let partner = plane(comp, (n - jg) % n, (n - i) % n);
            *v = 0.5 * (plane(comp, jg, i) + partner.conj());
        }
    }
    Ok(())
}
