//! # Run configuration
//! Parameters of a run, read once from a toml file.
//!
//! ```toml
//! cfl = 0.5
//! time = 10.0
//! resolution = 1.0
//! forcing = true
//! stats_every = 10
//! n = 64
//! scheme = "rk3"
//! statfile = "stats.dat"
//! write_u = "u.h5"
//! write_v = "v.h5"
//! write_w = "w.h5"
//!
//! [init]
//! type = "random"
//! energy = 0.5
//! seed = 7
//! ```
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Time stepping scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Two stage Runge-Kutta (Heun) with integrating factor
    Rk2,
    /// Three stage strong stability preserving Runge-Kutta
    /// with integrating factor
    #[default]
    Rk3,
}

/// Initial condition, used when no input files are given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitialCondition {
    /// Fluid at rest
    Zero,
    /// `u = A sin x cos y cos z`, `v = -A cos x sin y cos z`, `w = 0`
    TaylorGreen {
        /// Amplitude `A`
        amplitude: f64,
    },
    /// Random solenoidal field of given kinetic energy
    Random {
        /// Kinetic energy after rescaling
        energy: f64,
        /// Seed of the random number generator
        seed: u64,
    },
}

impl Default for InitialCondition {
    fn default() -> Self {
        Self::TaylorGreen { amplitude: 1. }
    }
}

/// Parameters of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Courant number
    pub cfl: f64,
    /// End time
    pub time: f64,
    /// Resolution `k_max * eta`, sets the default viscosity
    pub resolution: f64,
    /// Turn energy injection on or off
    pub forcing: bool,
    /// Write statistics every `stats_every` steps
    pub stats_every: usize,
    /// Initial condition files (all or none)
    #[serde(default)]
    pub read_u: Option<PathBuf>,
    /// See `read_u`
    #[serde(default)]
    pub read_v: Option<PathBuf>,
    /// See `read_u`
    #[serde(default)]
    pub read_w: Option<PathBuf>,
    /// Checkpoint files written at the end (all or none)
    #[serde(default)]
    pub write_u: Option<PathBuf>,
    /// See `write_u`
    #[serde(default)]
    pub write_v: Option<PathBuf>,
    /// See `write_u`
    #[serde(default)]
    pub write_w: Option<PathBuf>,
    /// Statistics output, appended by rank 0
    #[serde(default = "default_statfile")]
    pub statfile: PathBuf,
    /// Grid points per direction
    #[serde(default = "default_n")]
    pub n: usize,
    /// Time stepping scheme
    #[serde(default)]
    pub scheme: Scheme,
    /// Forcing acts on shells `1..=kf`
    #[serde(default = "default_kf")]
    pub kf: usize,
    /// Injected power (energy dissipation rate at steady state)
    #[serde(default = "default_energy_input")]
    pub energy_input: f64,
    /// Kinematic viscosity, derived from `resolution` if absent
    #[serde(default)]
    pub viscosity: Option<f64>,
    /// Upper bound of the time step
    #[serde(default = "default_max_dt")]
    pub max_dt: f64,
    /// Number of kz chunks per component in the transpose
    #[serde(default = "default_planes")]
    pub planes: usize,
    /// Seed of the phase shift sequence
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Random phase shift in the nonlinear term
    #[serde(default = "default_phase_shift")]
    pub phase_shift: bool,
    /// Stop after this many steps
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// Initial condition (ignored if `read_*` is set)
    #[serde(default)]
    pub init: InitialCondition,
}

fn default_statfile() -> PathBuf {
    PathBuf::from("stats.dat")
}

fn default_n() -> usize {
    32
}

fn default_kf() -> usize {
    2
}

fn default_energy_input() -> f64 {
    1.
}

fn default_max_dt() -> f64 {
    0.01
}

fn default_planes() -> usize {
    4
}

fn default_seed() -> u64 {
    1
}

fn default_phase_shift() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cfl: 0.5,
            time: 1.,
            resolution: 1.,
            forcing: true,
            stats_every: 10,
            read_u: None,
            read_v: None,
            read_w: None,
            write_u: None,
            write_v: None,
            write_w: None,
            statfile: default_statfile(),
            n: default_n(),
            scheme: Scheme::default(),
            kf: default_kf(),
            energy_input: default_energy_input(),
            viscosity: None,
            max_dt: default_max_dt(),
            planes: default_planes(),
            seed: default_seed(),
            phase_shift: default_phase_shift(),
            max_steps: None,
            init: InitialCondition::default(),
        }
    }
}

impl RunConfig {
    /// Read and validate configuration file
    ///
    /// # Errors
    /// File not readable, invalid toml or invalid parameter.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration
    ///
    /// # Errors
    /// Invalid toml or invalid parameter.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check all parameters
    ///
    /// # Errors
    /// Names the first offending key.
    pub fn validate(&self) -> Result<()> {
        positive("cfl", self.cfl)?;
        positive("time", self.time)?;
        positive("resolution", self.resolution)?;
        positive("max_dt", self.max_dt)?;
        positive("energy_input", self.energy_input)?;
        if let Some(nu) = self.viscosity {
            positive("viscosity", nu)?;
        }
        if self.stats_every == 0 {
            return Err(Error::config("stats_every", "must be at least 1"));
        }
        if self.n < 4 || self.n % 2 != 0 {
            return Err(Error::config(
                "n",
                format!("must be even and >= 4, got {}", self.n),
            ));
        }
        if self.kf == 0 || 3 * self.kf >= self.n {
            return Err(Error::config(
                "kf",
                format!("must be in 1..{} (dealiased range), got {}", (self.n + 2) / 3, self.kf),
            ));
        }
        if self.planes == 0 {
            return Err(Error::config("planes", "must be at least 1"));
        }
        if self.max_steps == Some(0) {
            return Err(Error::config("max_steps", "must be at least 1"));
        }
        match self.init {
            InitialCondition::TaylorGreen { amplitude } if !amplitude.is_finite() => {
                return Err(Error::config("init", "amplitude must be finite"));
            }
            InitialCondition::Random { energy, .. } if !(energy.is_finite() && energy >= 0.) => {
                return Err(Error::config("init", "energy must be finite and >= 0"));
            }
            _ => (),
        }
        check_triple("read_u", [&self.read_u, &self.read_v, &self.read_w])?;
        check_triple("write_u", [&self.write_u, &self.write_v, &self.write_w])?;
        Ok(())
    }

    /// Input files, if all three are given
    pub fn read_paths(&self) -> Option<[&Path; 3]> {
        triple([&self.read_u, &self.read_v, &self.read_w])
    }

    /// Checkpoint files, if all three are given
    pub fn write_paths(&self) -> Option<[&Path; 3]> {
        triple([&self.write_u, &self.write_v, &self.write_w])
    }

    /// Reynolds number from resolution and injected power,
    /// `Re = (sqrt(2)/3 n / resolution)^(4/3) eps^(-1/3)`
    #[allow(clippy::cast_precision_loss)]
    pub fn reynolds(&self) -> f64 {
        (2f64.sqrt() / 3. * self.n as f64 / self.resolution).powf(4. / 3.)
            * self.energy_input.powf(-1. / 3.)
    }

    /// Kinematic viscosity
    pub fn nu(&self) -> f64 {
        self.viscosity.unwrap_or_else(|| 1. / self.reynolds())
    }
}

fn positive(key: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0. {
        Ok(())
    } else {
        Err(Error::config(key, format!("must be positive, got {}", value)))
    }
}

fn triple(paths: [&Option<PathBuf>; 3]) -> Option<[&Path; 3]> {
    match paths {
        [Some(u), Some(v), Some(w)] => Some([u.as_path(), v.as_path(), w.as_path()]),
        _ => None,
    }
}

fn check_triple(key: &'static str, paths: [&Option<PathBuf>; 3]) -> Result<()> {
    let given = paths.iter().filter(|p| p.is_some()).count();
    if given != 0 && given != 3 {
        return Err(Error::config(key, "give files for all three components or none"));
    }
    if given == 3 && !cfg!(feature = "hdf5") {
        return Err(Error::config(key, "built without hdf5 support"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "cfl = 0.5\ntime = 2.0\nresolution = 1.5\nforcing = false\nstats_every = 5\n";

    #[test]
    fn test_parse_minimal() {
        let config = RunConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.n, 32);
        assert_eq!(config.scheme, Scheme::Rk3);
        assert_eq!(config.init, InitialCondition::TaylorGreen { amplitude: 1. });
        assert!(config.read_paths().is_none());
        assert!(config.phase_shift);
    }

    #[test]
    fn test_parse_full() {
        let content = format!(
            "{}n = 16\nscheme = \"rk2\"\nviscosity = 0.01\nmax_steps = 3\n[init]\ntype = \"random\"\nenergy = 0.25\nseed = 9\n",
            MINIMAL
        );
        let config = RunConfig::from_toml(&content).unwrap();
        assert_eq!(config.n, 16);
        assert_eq!(config.scheme, Scheme::Rk2);
        assert_eq!(config.nu(), 0.01);
        assert_eq!(config.max_steps, Some(3));
        assert_eq!(
            config.init,
            InitialCondition::Random {
                energy: 0.25,
                seed: 9
            }
        );
    }

    #[test]
    fn test_missing_key() {
        let content = "cfl = 0.5\ntime = 2.0\n";
        assert!(matches!(RunConfig::from_toml(content), Err(Error::Toml(_))));
        let content = format!("{}unknown = 1\n", MINIMAL);
        assert!(matches!(RunConfig::from_toml(&content), Err(Error::Toml(_))));
    }

    #[test]
    fn test_validation_names_key() {
        let check = |config: RunConfig, expected: &str| match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key, expected),
            other => panic!("expected config error for {}, got {:?}", expected, other),
        };
        check(RunConfig { cfl: -1., ..RunConfig::default() }, "cfl");
        check(RunConfig { n: 30, kf: 10, ..RunConfig::default() }, "kf");
        check(RunConfig { n: 7, ..RunConfig::default() }, "n");
        check(RunConfig { stats_every: 0, ..RunConfig::default() }, "stats_every");
        check(
            RunConfig {
                read_u: Some("u.h5".into()),
                ..RunConfig::default()
            },
            "read_u",
        );
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_reynolds() {
        let config = RunConfig {
            n: 96,
            resolution: 1.,
            energy_input: 1.,
            ..RunConfig::default()
        };
        let re = (2f64.sqrt() * 32.).powf(4. / 3.);
        assert!((config.reynolds() - re).abs() < 1e-9 * re);
        assert!((config.nu() - 1. / re).abs() < 1e-12);
    }
}
