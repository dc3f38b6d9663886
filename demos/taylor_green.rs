//! Decaying Taylor-Green vortex on a single process
//!
//! cargo run --release --example taylor_green
use spectral_hit::comm::SerialComm;
use spectral_hit::config::{InitialCondition, RunConfig, Scheme};
use spectral_hit::integrate;
use spectral_hit::navier_stokes::Navier3D;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let config = RunConfig {
        n: 32,
        time: 2.,
        forcing: false,
        viscosity: Some(1. / 400.),
        scheme: Scheme::Rk3,
        stats_every: 20,
        statfile: "taylor_green.dat".into(),
        init: InitialCondition::TaylorGreen { amplitude: 1. },
        ..RunConfig::default()
    };
    let mut navier = Navier3D::new(SerialComm, config).unwrap();
    integrate(&mut navier, 2., Some(20)).unwrap();
    let spectrum = navier.spectrum().unwrap();
    for (k, e) in spectrum.iter().enumerate() {
        println!("{:3} {:10.4e}", k, e);
    }
}
