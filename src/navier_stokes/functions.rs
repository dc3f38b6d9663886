//! Initial conditions
use crate::comm::Comm;
use crate::config::InitialCondition;
use crate::context::RunContext;
use crate::dealias::{dealias, impose_symmetry, project};
use crate::error::Result;
use crate::field::{PhysicalField, VectorField};
use crate::statistics::energy;
use ndarray::{s, Array2};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// Fill `u` with the initial condition `init`
///
/// # Errors
/// Failed transform or exchange.
pub fn apply_initial_condition<C: Comm>(
    ctx: &mut RunContext<C>,
    init: &InitialCondition,
    u: &mut VectorField,
) -> Result<()> {
    match *init {
        InitialCondition::Zero => {
            u.set_zero();
            Ok(())
        }
        InitialCondition::TaylorGreen { amplitude } => apply_taylor_green(ctx, u, amplitude),
        InitialCondition::Random { energy, seed } => apply_random(ctx, u, energy, seed),
    }
}

/// Taylor-Green vortex
///
/// `u = A sin(x) cos(y) cos(z)`, `v = -A cos(x) sin(y) cos(z)`, `w = 0`
///
/// # Errors
/// Failed transform.
pub fn apply_taylor_green<C: Comm>(
    ctx: &mut RunContext<C>,
    u: &mut VectorField,
    amp: f64,
) -> Result<()> {
    let p = PhysicalField::from_fn(&ctx.grid, |x, y, z| {
        [
            amp * x.sin() * y.cos() * z.cos(),
            -amp * x.cos() * y.sin() * z.cos(),
            0.,
        ]
    });
    ctx.forward(&p, u)
}

/// Random solenoidal field of kinetic energy `target`
///
/// Uniform noise in physical space, one generator per global
/// x plane (seeded `seed + x`), so the field does not depend
/// on the number of processes. The noise is projected,
/// dealiased and rescaled.
///
/// # Errors
/// Failed transform or exchange.
pub fn apply_random<C: Comm>(
    ctx: &mut RunContext<C>,
    u: &mut VectorField,
    target: f64,
    seed: u64,
) -> Result<()> {
    let grid = &ctx.grid;
    let mut p = PhysicalField::physical(grid);
    let dist = Uniform::new(-1., 1.);
    for i in 0..grid.nxl {
        let mut rng = StdRng::seed_from_u64(seed + (grid.x0 + i) as u64);
        for c in p.components_mut() {
            let plane: Array2<f64> = Array2::random_using((grid.n, grid.n), dist, &mut rng);
            c.slice_mut(s![i, .., ..]).assign(&plane);
        }
    }
    ctx.forward(&p, u)?;
    project(&ctx.grid, u)?;
    dealias(&ctx.grid, u)?;
    impose_symmetry(&ctx.comm, &ctx.grid, u)?;
    let e = energy(&ctx.comm, &ctx.grid, u)?;
    if e > 0. {
        let factor = (target / e).sqrt();
        for c in u.components_mut() {
            c.mapv_inplace(|v| v * factor);
        }
    }
    Ok(())
}
