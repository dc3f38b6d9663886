//! # Statistics
//! Global scalars of the flow, computed from local partial
//! sums (or maxima) and one reduction across all ranks.
//!
//! Spectral sums run over the half spectrum `kz >= 0`; modes
//! with `0 < kz < n/2` are weighted twice for their conjugate
//! partner. Partial sums are accumulated sequentially in local
//! index order, so results differ between process counts only
//! by the order of the final reduction.
use crate::comm::Comm;
use crate::error::Result;
use crate::field::{Decomp, PhysicalField, VectorField};
use crate::grid::{k2, Grid};

/// Sum of `local` over all ranks
///
/// # Errors
/// Failed exchange.
pub fn reduce_sum<C: Comm>(comm: &C, local: f64) -> Result<f64> {
    let mut global = [0.];
    comm.all_reduce_sum(&[local], &mut global)?;
    Ok(global[0])
}

/// Maximum of `local` over all ranks
///
/// # Errors
/// Failed exchange.
pub fn reduce_max<C: Comm>(comm: &C, local: f64) -> Result<f64> {
    let mut global = [0.];
    comm.all_reduce_max(&[local], &mut global)?;
    Ok(global[0])
}

/// Elementwise sum over all ranks
///
/// # Errors
/// Failed exchange.
pub fn reduce_sum_slice<C: Comm>(comm: &C, local: &[f64]) -> Result<Vec<f64>> {
    let mut global = vec![0.; local.len()];
    comm.all_reduce_sum(local, &mut global)?;
    Ok(global)
}

/// Elementwise maximum over all ranks
///
/// # Errors
/// Failed exchange.
pub fn reduce_max_slice<C: Comm>(comm: &C, local: &[f64]) -> Result<Vec<f64>> {
    let mut global = vec![0.; local.len()];
    comm.all_reduce_max(local, &mut global)?;
    Ok(global)
}

/// Local sum of `weight(k) * |u(k)|^2` over the half spectrum
fn local_sum<F>(grid: &Grid, u: &VectorField, weight: F) -> Result<f64>
where
    F: Fn(&[f64; 3]) -> f64,
{
    u.expect_decomp(Decomp::YSlab)?;
    u.expect_shape(grid.shape_yslab())?;
    let mut sum = 0.;
    for ((j, l, i), vx) in u.x.indexed_iter() {
        let k = grid.k_yslab(j, l, i);
        let w = weight(&k);
        if w != 0. {
            let e = vx.norm_sqr() + u.y[[j, l, i]].norm_sqr() + u.z[[j, l, i]].norm_sqr();
            sum += grid.mode_weight(l) * w * e;
        }
    }
    Ok(sum)
}

/// Shell index of a wavenumber, `round(|k|)`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn shell(k: &[f64; 3]) -> usize {
    k2(k).sqrt().round() as usize
}

/// Kinetic energy `1/2 <u.u>`
///
/// # Errors
/// Wrong decomposition or shape, failed exchange.
pub fn energy<C: Comm>(comm: &C, grid: &Grid, u: &VectorField) -> Result<f64> {
    let local = local_sum(grid, u, |_| 1.)?;
    Ok(reduce_sum(comm, local)? / (2. * grid.npoints().powi(2)))
}

/// Dissipation rate `nu <|grad u|^2>`
///
/// # Errors
/// Wrong decomposition or shape, failed exchange.
pub fn dissipation<C: Comm>(comm: &C, grid: &Grid, u: &VectorField, nu: f64) -> Result<f64> {
    let local = local_sum(grid, u, k2)?;
    Ok(nu * reduce_sum(comm, local)? / grid.npoints().powi(2))
}

/// Energy in the shells `1..=kf`
///
/// # Errors
/// Wrong decomposition or shape, failed exchange.
pub fn shell_energy<C: Comm>(comm: &C, grid: &Grid, u: &VectorField, kf: usize) -> Result<f64> {
    let local = local_sum(grid, u, |k| {
        let s = shell(k);
        if s >= 1 && s <= kf {
            1.
        } else {
            0.
        }
    })?;
    Ok(reduce_sum(comm, local)? / (2. * grid.npoints().powi(2)))
}

/// Energy spectrum, entry `s` holds the energy of shell `s`
///
/// # Errors
/// Wrong decomposition or shape, failed exchange.
#[allow(clippy::cast_precision_loss)]
pub fn spectrum<C: Comm>(comm: &C, grid: &Grid, u: &VectorField) -> Result<Vec<f64>> {
    u.expect_decomp(Decomp::YSlab)?;
    u.expect_shape(grid.shape_yslab())?;
    let nshell = shell(&[grid.n as f64 / 2.; 3]) + 1;
    let mut local = vec![0.; nshell];
    for ((j, l, i), vx) in u.x.indexed_iter() {
        let k = grid.k_yslab(j, l, i);
        let e = vx.norm_sqr() + u.y[[j, l, i]].norm_sqr() + u.z[[j, l, i]].norm_sqr();
        local[shell(&k)] += grid.mode_weight(l) * e;
    }
    let norm = 2. * grid.npoints().powi(2);
    Ok(reduce_sum_slice(comm, &local)?
        .into_iter()
        .map(|e| e / norm)
        .collect())
}

/// Global maximum of `|u_i|` per component. A component is
/// `NaN` on all ranks if any rank holds a non-finite value.
///
/// # Errors
/// Failed exchange.
pub fn max_abs<C: Comm>(comm: &C, u: &PhysicalField) -> Result<[f64; 3]> {
    reduce_max_abs(comm, u.max_abs())
}

/// Reduce local maxima of `|u_i|`, see [`max_abs`]
///
/// # Errors
/// Failed exchange.
pub fn reduce_max_abs<C: Comm>(comm: &C, local: [f64; 3]) -> Result<[f64; 3]> {
    let mut send = [0.; 6];
    for (i, m) in local.into_iter().enumerate() {
        if m.is_finite() {
            send[i] = m;
        } else {
            send[3 + i] = 1.;
        }
    }
    let global = reduce_max_slice(comm, &send)?;
    let mut umax = [0.; 3];
    for (i, m) in umax.iter_mut().enumerate() {
        *m = if global[3 + i] > 0. { f64::NAN } else { global[i] };
    }
    Ok(umax)
}

/// True on every rank if all coefficients of `u` are finite
/// on every rank
///
/// # Errors
/// Failed exchange.
pub fn all_finite<C: Comm>(comm: &C, u: &VectorField) -> Result<bool> {
    let flag = if u.is_finite() { 0. } else { 1. };
    Ok(reduce_max(comm, flag)? == 0.)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{run_ranks, SerialComm};
    use crate::fft::SpectralTransform;

    fn approx_eq(a: f64, b: f64) {
        let dif = 1e-10 * b.abs().max(1.);
        if (a - b).abs() > dif {
            panic!("Large difference of values, got {} expected {}.", a, b)
        }
    }

    fn taylor_green(comm: &impl Comm, grid: &Grid, amp: f64) -> VectorField {
        let mut tr = SpectralTransform::new(grid, 2);
        let p = PhysicalField::from_fn(grid, |x, y, z| {
            [
                amp * x.sin() * y.cos() * z.cos(),
                -amp * x.cos() * y.sin() * z.cos(),
                0.,
            ]
        });
        let mut u = VectorField::spectral(grid);
        tr.forward(comm, grid, &p, &mut u).unwrap();
        u
    }

    #[test]
    fn test_taylor_green_statistics() {
        let grid = Grid::new(8, 1, 0).unwrap();
        let amp = 2.;
        let u = taylor_green(&SerialComm, &grid, amp);
        approx_eq(energy(&SerialComm, &grid, &u).unwrap(), amp * amp / 8.);
        let nu = 0.01;
        approx_eq(
            dissipation(&SerialComm, &grid, &u, nu).unwrap(),
            nu * 3. * amp * amp / 4.,
        );
        approx_eq(shell_energy(&SerialComm, &grid, &u, 2).unwrap(), amp * amp / 8.);
        approx_eq(shell_energy(&SerialComm, &grid, &u, 1).unwrap(), 0.);
        let spec = spectrum(&SerialComm, &grid, &u).unwrap();
        approx_eq(spec[2], amp * amp / 8.);
        approx_eq(spec.iter().sum(), amp * amp / 8.);
    }

    #[test]
    fn test_energy_independent_of_ranks() {
        for nprocs in [2, 4] {
            let e = run_ranks(nprocs, |comm| {
                let grid = Grid::new(8, nprocs, comm.rank()).unwrap();
                let u = taylor_green(&comm, &grid, 1.5);
                energy(&comm, &grid, &u).unwrap()
            });
            for e in e {
                approx_eq(e, 1.5 * 1.5 / 8.);
            }
        }
    }

    #[test]
    fn test_reduction_splits() {
        let data: Vec<f64> = (0..24).map(|i| ((i * 7) % 11) as f64 - 3.5).collect();
        let total: f64 = data.iter().sum();
        let max = data.iter().cloned().fold(f64::MIN, f64::max);
        for nprocs in 1..=4 {
            let data = &data;
            let results = run_ranks(nprocs, |comm| {
                // uneven split, last rank takes the rest
                let chunk = data.len() / nprocs;
                let start = comm.rank() * chunk;
                let end = if comm.rank() + 1 == nprocs {
                    data.len()
                } else {
                    start + chunk
                };
                let part = &data[start..end];
                let sum = reduce_sum(&comm, part.iter().sum()).unwrap();
                let m = reduce_max(&comm, part.iter().cloned().fold(f64::MIN, f64::max)).unwrap();
                (sum, m)
            });
            for (sum, m) in results {
                approx_eq(sum, total);
                assert_eq!(m, max);
            }
        }
    }

    #[test]
    fn test_max_abs() {
        let results = run_ranks(2, |comm| {
            let grid = Grid::new(8, 2, comm.rank()).unwrap();
            let p = PhysicalField::from_fn(&grid, |x, y, _| [x, -y, 0.5]);
            max_abs(&comm, &p).unwrap()
        });
        let grid = Grid::new(8, 1, 0).unwrap();
        for m in results {
            assert_eq!(m, [grid.coord(7), grid.coord(7), 0.5]);
        }
    }

    #[test]
    fn test_max_abs_nan_on_all_ranks() {
        let results = run_ranks(2, |comm| {
            let grid = Grid::new(8, 2, comm.rank()).unwrap();
            let mut p = PhysicalField::from_fn(&grid, |x, _, _| [x, 1., 1.]);
            if comm.rank() == 1 {
                p.y[[0, 3, 3]] = f64::NAN;
            }
            max_abs(&comm, &p).unwrap()
        });
        for m in results {
            assert!(m[0].is_finite());
            assert!(m[1].is_nan());
            assert_eq!(m[2], 1.);
        }
    }

    #[test]
    fn test_all_finite_agrees_on_all_ranks() {
        let results = run_ranks(2, |comm| {
            let grid = Grid::new(8, 2, comm.rank()).unwrap();
            let mut u = taylor_green(&comm, &grid, 1.);
            let before = all_finite(&comm, &u).unwrap();
            if comm.rank() == 0 {
                u.z[[1, 2, 3]].re = f64::INFINITY;
            }
            (before, all_finite(&comm, &u).unwrap())
        });
        for (before, after) in results {
            assert!(before);
            assert!(!after);
        }
    }
}
