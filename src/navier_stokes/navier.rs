//! # Direct numerical simulation
//! Forced homogeneous isotropic turbulence in a periodic box
//!
//! # Example
//! Decaying Taylor-Green vortex on a single process
//! ```
//! use spectral_hit::comm::SerialComm;
//! use spectral_hit::config::{InitialCondition, RunConfig};
//! use spectral_hit::navier_stokes::Navier3D;
//! use spectral_hit::Integrate;
//!
//! let config = RunConfig {
//!     n: 8,
//!     forcing: false,
//!     viscosity: Some(0.1),
//!     init: InitialCondition::TaylorGreen { amplitude: 1. },
//!     ..RunConfig::default()
//! };
//! let mut navier = Navier3D::new(SerialComm, config).unwrap();
//! let e0 = navier.energy().unwrap();
//! navier.update().unwrap();
//! assert!(navier.energy().unwrap() < e0);
//! ```
use super::cfl::StepControl;
use super::forcing::{self, Forcing, ForcingLaw};
use super::functions::apply_initial_condition;
use super::nonlinear::Nonlinear;
use super::rk;
use crate::comm::Comm;
use crate::config::{RunConfig, Scheme};
use crate::context::RunContext;
use crate::dealias::{dealias, impose_symmetry};
use crate::error::{Error, Result};
use crate::field::VectorField;
use crate::statistics::{all_finite, max_abs, reduce_max_abs, shell_energy};
use crate::Integrate;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Input of a right hand side evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// State `u`
    State,
    /// Work field `uw`
    Work,
}

/// Solve 3-dimensional incompressible Navier-Stokes equations
/// in rotational form, with energy injection at low wavenumbers
pub struct Navier3D<C: Comm> {
    /// Communicator, grid and transforms
    pub ctx: RunContext<C>,
    /// Parameters of the run
    pub config: RunConfig,
    /// Velocity (spectral, `YSlab`)
    pub u: VectorField,
    /// Intermediate stage
    uw: VectorField,
    /// Right hand side of the latest stage
    rhs: VectorField,
    /// Work fields of the nonlinear term
    nonlinear: Nonlinear,
    /// Forcing law
    pub forcing: Forcing,
    /// Step size policy
    pub step_control: StepControl,
    /// Kinematic viscosity
    pub nu: f64,
    /// Time
    pub time: f64,
    /// Time step size of the latest step, before the first
    /// step the size the initial state allows
    pub dt: f64,
    /// Number of steps taken
    pub timestep: usize,
    /// Forcing coefficient of the latest step
    pub cf: f64,
    /// Global velocity maxima at the beginning of the latest
    /// step, of the initial state before the first step
    pub umax: [f64; 3],
    /// Phase shifts, same sequence on every rank
    rng: StdRng,
    /// diagnostics like energy, dissipation, ...
    pub diagnostics: HashMap<String, Vec<f64>>,
}

impl<C: Comm> Navier3D<C> {
    /// Setup solver and initial state.
    ///
    /// The velocity is read from `read_u/v/w` if given, else
    /// set by `config.init`.
    ///
    /// # Errors
    /// Invalid configuration, grid size not divisible by the
    /// number of processes, unreadable input files.
    pub fn new(comm: C, config: RunConfig) -> Result<Self> {
        config.validate()?;
        let ctx = RunContext::new(comm, config.n, config.planes)?;
        let grid = &ctx.grid;
        let nu = config.nu();
        let mut navier = Self {
            u: VectorField::spectral(grid),
            uw: VectorField::spectral(grid),
            rhs: VectorField::spectral(grid),
            nonlinear: Nonlinear::new(grid),
            forcing: Forcing::new(config.forcing, config.energy_input),
            step_control: StepControl::new(config.cfl, config.max_dt, grid.dx()),
            nu,
            time: 0.,
            dt: 0.,
            timestep: 0,
            cf: 0.,
            umax: [0.; 3],
            rng: StdRng::seed_from_u64(config.seed),
            diagnostics: HashMap::new(),
            ctx,
            config,
        };

        if let Some(paths) = navier.config.read_paths() {
            let paths = paths.map(std::path::Path::to_path_buf);
            navier.read(&paths)?;
        } else {
            let Self { ctx, config, u, .. } = &mut navier;
            apply_initial_condition(ctx, &config.init, u)?;
        }
        let Self { ctx, u, .. } = &mut navier;
        dealias(&ctx.grid, u)?;
        impose_symmetry(&ctx.comm, &ctx.grid, u)?;

        let mut p = navier.ctx.physical_field();
        navier.ctx.backward(&navier.u, &mut p)?;
        navier.umax = max_abs(&navier.ctx.comm, &p)?;
        navier.dt = navier.step_control.select(
            navier.umax,
            navier.config.time,
            navier.nrank(),
            navier.time,
        )?;

        if navier.nrank() == 0 {
            tracing::info!(
                "n = {}, processes = {}, scheme = {:?}, nu = {:.4e}, Re = {:.4e}, forcing = {:?}",
                navier.config.n,
                navier.ctx.grid.nprocs,
                navier.config.scheme,
                navier.nu,
                1. / navier.nu,
                navier.forcing,
            );
        }
        Ok(navier)
    }

    /// Return current rank
    pub fn nrank(&self) -> usize {
        self.ctx.rank()
    }

    /// Return total number of processes
    pub fn nprocs(&self) -> usize {
        self.ctx.grid.nprocs
    }

    /// Reset time
    pub fn reset_time(&mut self) {
        self.time = 0.;
        self.timestep = 0;
    }

    /// Phase shift of the next right hand side, uniform in
    /// `[0, dx)^3`, or zero if phase shifting is disabled
    fn delta(&mut self) -> [f64; 3] {
        if !self.config.phase_shift {
            return [0.; 3];
        }
        let dx = self.ctx.grid.dx();
        let rng = &mut self.rng;
        [
            rng.gen_range(0.0..dx),
            rng.gen_range(0.0..dx),
            rng.gen_range(0.0..dx),
        ]
    }

    /// Nonlinear and forcing terms of `source` into `rhs`.
    /// Returns the local velocity maxima.
    fn eval_rhs(&mut self, source: Source) -> Result<[f64; 3]> {
        let delta = self.delta();
        let Self {
            ctx,
            u,
            uw,
            rhs,
            nonlinear,
            cf,
            config,
            ..
        } = self;
        let input = match source {
            Source::State => &*u,
            Source::Work => &*uw,
        };
        let umax = nonlinear.eval(ctx, input, delta, rhs)?;
        forcing::apply(&ctx.grid, input, rhs, *cf, config.kf)?;
        Ok(umax)
    }

    /// Dealias and symmetrize a stage result
    fn enforce(ctx: &RunContext<C>, field: &mut VectorField) -> Result<()> {
        dealias(&ctx.grid, field)?;
        impose_symmetry(&ctx.comm, &ctx.grid, field)
    }

    /// First stage of every scheme: forcing coefficient, right
    /// hand side of the state and step size
    fn begin_step(&mut self) -> Result<()> {
        let ef = shell_energy(&self.ctx.comm, &self.ctx.grid, &self.u, self.config.kf)?;
        self.cf = self.forcing.coefficient(ef);
        let local = self.eval_rhs(Source::State)?;
        self.umax = reduce_max_abs(&self.ctx.comm, local)?;
        self.dt = self.step_control.select(
            self.umax,
            self.config.time - self.time,
            self.nrank(),
            self.time,
        )?;
        Ok(())
    }

    /// Fail on every rank if a step left a non-finite
    /// coefficient on any rank
    fn check_state(&self) -> Result<()> {
        if all_finite(&self.ctx.comm, &self.u)? {
            Ok(())
        } else {
            Err(Error::NumericalInstability {
                quantity: "velocity",
                rank: self.nrank(),
                time: self.time + self.dt,
            })
        }
    }

    fn step_rk2(&mut self) -> Result<()> {
        self.begin_step()?;
        let (nu, dt) = (self.nu, self.dt);
        {
            let Self { ctx, u, uw, rhs, .. } = self;
            rk::rk2_predict(&ctx.grid, nu, dt, u, uw, rhs)?;
            Self::enforce(ctx, uw)?;
        }
        self.eval_rhs(Source::Work)?;
        let Self { ctx, u, rhs, .. } = self;
        rk::rk2_correct(&ctx.grid, dt, u, rhs)?;
        Self::enforce(ctx, u)
    }

    fn step_rk3(&mut self) -> Result<()> {
        self.begin_step()?;
        let (nu, dt) = (self.nu, self.dt);
        {
            let Self { ctx, u, uw, rhs, .. } = self;
            rk::rk3_stage1(&ctx.grid, nu, dt, u, uw, rhs)?;
            Self::enforce(ctx, uw)?;
        }
        self.eval_rhs(Source::Work)?;
        {
            let Self { ctx, u, uw, rhs, .. } = self;
            rk::rk3_stage2(&ctx.grid, nu, dt, u, uw, rhs)?;
            Self::enforce(ctx, uw)?;
        }
        self.eval_rhs(Source::Work)?;
        let Self { ctx, u, uw, rhs, .. } = self;
        rk::rk3_stage3(&ctx.grid, nu, dt, u, uw, rhs)?;
        Self::enforce(ctx, u)
    }
}

impl<C: Comm> Integrate for Navier3D<C> {
    /// Update 1 timestep
    fn update(&mut self) -> Result<()> {
        match self.config.scheme {
            Scheme::Rk2 => self.step_rk2()?,
            Scheme::Rk3 => self.step_rk3()?,
        }
        self.check_state()?;
        self.time += self.dt;
        self.timestep += 1;
        tracing::debug!(
            "rank {}: step {}, t = {:.6}, dt = {:.4e}, cf = {:.4e}",
            self.nrank(),
            self.timestep,
            self.time,
            self.dt,
            self.cf
        );
        Ok(())
    }

    fn get_time(&self) -> f64 {
        self.time
    }

    fn callback(&mut self) -> Result<()> {
        self.write_statistics()
    }

    fn exit(&mut self) -> bool {
        // identical on every rank
        self.config
            .max_steps
            .map_or(false, |max| self.timestep >= max)
    }

    fn nrank(&self) -> usize {
        self.nrank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{run_ranks, SerialComm};
    use crate::config::InitialCondition;

    fn approx_eq(a: f64, b: f64) {
        let dif = 1e-8 * b.abs().max(1e-3);
        if (a - b).abs() > dif {
            panic!("Large difference of values, got {} expected {}.", a, b)
        }
    }

    fn config(scheme: Scheme, forcing: bool, init: InitialCondition) -> RunConfig {
        RunConfig {
            n: 8,
            scheme,
            forcing,
            init,
            viscosity: Some(0.05),
            max_dt: 0.02,
            planes: 2,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_zero_field_stays_zero() {
        for scheme in [Scheme::Rk2, Scheme::Rk3] {
            for forcing in [false, true] {
                let config = config(scheme, forcing, InitialCondition::Zero);
                let mut navier = Navier3D::new(SerialComm, config).unwrap();
                for _ in 0..3 {
                    navier.update().unwrap();
                }
                assert_eq!(navier.u, VectorField::spectral(&navier.ctx.grid));
                assert_eq!(navier.cf, 0.);
                assert_eq!(navier.dt, 0.02);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        for scheme in [Scheme::Rk2, Scheme::Rk3] {
            let init = InitialCondition::Random {
                energy: 0.5,
                seed: 4,
            };
            let run = || {
                let mut navier = Navier3D::new(SerialComm, config(scheme, true, init.clone())).unwrap();
                for _ in 0..3 {
                    navier.update().unwrap();
                }
                (navier.u, navier.time)
            };
            let (u1, t1) = run();
            let (u2, t2) = run();
            assert_eq!(t1, t2);
            assert_eq!(u1, u2);
        }
    }

    #[test]
    fn test_taylor_green_decays() {
        for scheme in [Scheme::Rk2, Scheme::Rk3] {
            let init = InitialCondition::TaylorGreen { amplitude: 1. };
            let mut navier = Navier3D::new(SerialComm, config(scheme, false, init)).unwrap();
            let mut e_prev = navier.energy().unwrap();
            approx_eq(e_prev, 0.125);
            for _ in 0..5 {
                navier.update().unwrap();
                let e = navier.energy().unwrap();
                assert!(e < e_prev, "energy grows: {} -> {}", e_prev, e);
                e_prev = e;
            }
            // short times: viscous decay exp(-6 nu t) dominates
            let expected = 0.125 * (-6. * navier.nu * navier.time).exp();
            assert!((e_prev - expected).abs() < 1e-3 * expected);
        }
    }

    #[test]
    fn test_constant_power_input() {
        let init = InitialCondition::TaylorGreen { amplitude: 1. };
        let mut config = config(Scheme::Rk3, true, init);
        config.energy_input = 0.3;
        let mut navier = Navier3D::new(SerialComm, config).unwrap();
        let ef = shell_energy(&navier.ctx.comm, &navier.ctx.grid, &navier.u, 2).unwrap();
        navier.update().unwrap();
        approx_eq(2. * navier.cf * ef, 0.3);
    }

    #[test]
    fn test_step_ends_at_end_time() {
        let init = InitialCondition::TaylorGreen { amplitude: 1. };
        let mut config = config(Scheme::Rk2, false, init);
        config.time = 0.05;
        let mut navier = Navier3D::new(SerialComm, config).unwrap();
        for _ in 0..3 {
            navier.update().unwrap();
        }
        approx_eq(navier.time, 0.05);
        assert!(navier.dt < 0.02);
    }

    #[test]
    fn test_nan_is_numerical_instability() {
        let init = InitialCondition::TaylorGreen { amplitude: 1. };
        let mut navier = Navier3D::new(SerialComm, config(Scheme::Rk3, true, init)).unwrap();
        navier.u.x[[0, 1, 1]].re = f64::NAN;
        assert!(matches!(
            navier.update(),
            Err(Error::NumericalInstability { .. })
        ));
    }

    #[test]
    fn test_nan_on_one_rank_fails_everywhere() {
        let results = run_ranks(2, |comm| {
            let init = InitialCondition::TaylorGreen { amplitude: 1. };
            let mut navier = Navier3D::new(comm, config(Scheme::Rk2, false, init)).unwrap();
            if navier.nrank() == 1 {
                navier.u.y[[0, 1, 1]].im = f64::NAN;
            }
            matches!(navier.update(), Err(Error::NumericalInstability { .. }))
        });
        assert!(results.into_iter().all(|failed| failed));
    }

    #[test]
    fn test_overflow_in_step_is_numerical_instability() {
        for scheme in [Scheme::Rk2, Scheme::Rk3] {
            let init = InitialCondition::TaylorGreen { amplitude: 1e160 };
            let mut navier = Navier3D::new(SerialComm, config(scheme, false, init)).unwrap();
            assert!(navier.u.is_finite());
            assert!(matches!(
                navier.update(),
                Err(Error::NumericalInstability { .. })
            ));
        }
    }

    #[test]
    fn test_overflow_fails_on_all_ranks() {
        let results = run_ranks(2, |comm| {
            let init = InitialCondition::TaylorGreen { amplitude: 1e160 };
            let mut navier = Navier3D::new(comm, config(Scheme::Rk3, false, init)).unwrap();
            matches!(navier.update(), Err(Error::NumericalInstability { .. }))
        });
        assert!(results.into_iter().all(|failed| failed));
    }

    #[test]
    fn test_initial_maxima_and_step() {
        let init = InitialCondition::TaylorGreen { amplitude: 1. };
        let navier = Navier3D::new(SerialComm, config(Scheme::Rk3, false, init)).unwrap();
        approx_eq(navier.umax[0], 1.);
        approx_eq(navier.umax[1], 1.);
        assert!(navier.umax[2] < 1e-12);
        let bound = navier.step_control.bound(navier.umax).unwrap();
        approx_eq(navier.dt, bound.min(0.02));
        assert_eq!(navier.time, 0.);
    }

    fn final_energy<C: Comm>(comm: C) -> f64 {
        let init = InitialCondition::Random {
            energy: 0.5,
            seed: 11,
        };
        let mut navier = Navier3D::new(comm, config(Scheme::Rk3, true, init)).unwrap();
        for _ in 0..3 {
            navier.update().unwrap();
        }
        navier.energy().unwrap()
    }

    #[test]
    fn test_ranks_match_serial() {
        let serial = final_energy(SerialComm);
        for nprocs in [2, 4] {
            for e in run_ranks(nprocs, final_energy) {
                approx_eq(e, serial);
            }
        }
    }

    #[test]
    fn test_max_steps() {
        let mut config = config(Scheme::Rk2, false, InitialCondition::Zero);
        config.max_steps = Some(2);
        let mut navier = Navier3D::new(SerialComm, config).unwrap();
        navier.update().unwrap();
        assert!(!navier.exit());
        navier.update().unwrap();
        assert!(navier.exit());
    }

    #[test]
    fn test_grid_not_divisible() {
        let results = run_ranks(3, |comm| {
            let config = config(Scheme::Rk2, false, InitialCondition::Zero);
            matches!(Navier3D::new(comm, config), Err(Error::Topology(_)))
        });
        assert!(results.into_iter().all(|failed| failed));
    }
}
