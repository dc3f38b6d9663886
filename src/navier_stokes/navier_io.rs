//! Implement io routines for `Navier3D`
use super::Navier3D;
use crate::comm::Comm;
use crate::error::{Error, Result};
use crate::statistics;
use std::io::Write;
use std::path::PathBuf;

impl<C: Comm> Navier3D<C> {
    /// Kinetic energy
    ///
    /// # Errors
    /// Failed exchange.
    pub fn energy(&self) -> Result<f64> {
        statistics::energy(&self.ctx.comm, &self.ctx.grid, &self.u)
    }

    /// Dissipation rate
    ///
    /// # Errors
    /// Failed exchange.
    pub fn dissipation(&self) -> Result<f64> {
        statistics::dissipation(&self.ctx.comm, &self.ctx.grid, &self.u, self.nu)
    }

    /// Energy per wavenumber shell
    ///
    /// # Errors
    /// Failed exchange.
    pub fn spectrum(&self) -> Result<Vec<f64>> {
        statistics::spectrum(&self.ctx.comm, &self.ctx.grid, &self.u)
    }

    /// Collect statistics, log them and append them to `statfile`
    /// (rank 0). Line format:
    ///
    /// `time energy dissipation umax_x umax_y umax_z cf dt`
    ///
    /// At t = 0 `umax` and `dt` belong to the initial state and
    /// `cf` is zero.
    ///
    /// # Errors
    /// Non-finite energy, failed exchange, `statfile` not writable.
    pub fn write_statistics(&mut self) -> Result<()> {
        let (energy, dissipation) = (self.energy()?, self.dissipation()?);
        if !energy.is_finite() {
            return Err(Error::NumericalInstability {
                quantity: "energy",
                rank: self.nrank(),
                time: self.time,
            });
        }
        let spectrum = self.spectrum()?;

        for (key, value) in [
            ("time", self.time),
            ("energy", energy),
            ("dissipation", dissipation),
            ("cf", self.cf),
            ("dt", self.dt),
        ] {
            self.diagnostics
                .entry(key.to_string())
                .or_insert_with(Vec::new)
                .push(value);
        }

        if self.nrank() == 0 {
            tracing::info!(
                "time = {:6.4}    E = {:5.3e}    D = {:5.3e}    umax = {:5.3e}    dt = {:4.2e}",
                self.time,
                energy,
                dissipation,
                self.umax.iter().cloned().fold(0., f64::max),
                self.dt,
            );
            tracing::debug!("spectrum = {:?}", spectrum);
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.config.statfile)?;
            let [ux, uy, uz] = self.umax;
            writeln!(
                file,
                "{} {} {} {} {} {} {} {}",
                self.time, energy, dissipation, ux, uy, uz, self.cf, self.dt
            )?;
        }
        Ok(())
    }

    /// Write checkpoint files `write_u/v/w`, if configured
    ///
    /// # Errors
    /// Failed transform or hdf5 call.
    pub fn write_checkpoint(&mut self) -> Result<()> {
        if let Some(paths) = self.config.write_paths() {
            let paths = paths.map(std::path::Path::to_path_buf);
            self.write(&paths)?;
        }
        Ok(())
    }

    /// Write velocity to one file per component
    ///
    /// # Errors
    /// Failed transform or hdf5 call.
    #[cfg(feature = "hdf5")]
    pub fn write(&mut self, paths: &[PathBuf; 3]) -> Result<()> {
        use crate::field::io::write_component;
        let mut p = self.ctx.physical_field();
        self.ctx.backward(&self.u, &mut p)?;
        for (path, c) in paths.iter().zip(p.components()) {
            write_component(&self.ctx.comm, &self.ctx.grid, path, c)?;
        }
        if self.nrank() == 0 {
            tracing::info!(" ==> {:?}", paths);
        }
        Ok(())
    }

    /// Read velocity from one file per component
    ///
    /// # Errors
    /// Missing file, wrong shape, failed hdf5 call.
    #[cfg(feature = "hdf5")]
    pub fn read(&mut self, paths: &[PathBuf; 3]) -> Result<()> {
        use crate::field::io::read_component;
        let mut p = self.ctx.physical_field();
        for (path, c) in paths.iter().zip(p.components_mut()) {
            *c = read_component(&self.ctx.comm, &self.ctx.grid, path)?;
        }
        self.ctx.forward(&p, &mut self.u)?;
        if self.nrank() == 0 {
            tracing::info!(" <== {:?}", paths);
        }
        Ok(())
    }

    /// Checkpoints need the `hdf5` feature
    ///
    /// # Errors
    /// Always.
    #[cfg(not(feature = "hdf5"))]
    pub fn write(&mut self, _paths: &[PathBuf; 3]) -> Result<()> {
        Err(Error::config("write_u", "checkpoints need the `hdf5` feature"))
    }

    /// Checkpoints need the `hdf5` feature
    ///
    /// # Errors
    /// Always.
    #[cfg(not(feature = "hdf5"))]
    pub fn read(&mut self, _paths: &[PathBuf; 3]) -> Result<()> {
        Err(Error::config("read_u", "checkpoints need the `hdf5` feature"))
    }
}
