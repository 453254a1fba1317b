//! Command-line entry point of the sampler.
//!
//! Reads the run parameters from a key–value config file, resumes from a
//! geometry checkpoint when asked (falling back to a fresh strip when the
//! checkpoint is absent), registers the standard observables, and runs
//! the Monte Carlo simulation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::SubscriberBuilder;

use cdt2d::config::Config;
use cdt2d::core::universe::Universe;
use cdt2d::observables::hausdorff::Hausdorff;
use cdt2d::observables::volume_profile::VolumeProfile;
use cdt2d::simulation::Simulation;

#[derive(Parser)]
#[command(name = "cdt2d")]
#[command(about = "Monte Carlo sampler for 2D causal dynamical triangulations")]
struct Cmd {
    /// Path to the key-value config file.
    config: PathBuf,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();

    let config = Config::from_file(&cmd.config)
        .with_context(|| format!("loading config `{}`", cmd.config.display()))?;
    info!(
        lambda = config.lambda,
        target_volume = config.target_volume,
        slices = config.slices,
        seed = config.seed,
        sphere = config.sphere,
        "configured"
    );

    let universe = build_universe(&config);
    let mut simulation = Simulation::new(
        universe,
        config.lambda,
        config.target_volume,
        config.seed,
        config.file_id.clone(),
    );
    simulation.add_observable(Box::new(VolumeProfile));
    simulation.add_observable(Box::new(Hausdorff));

    simulation.run(config.measurements)?;
    info!("done");
    Ok(())
}

/// Imports the checkpoint geometry when requested and present; any
/// import problem falls back to a fresh strip.
fn build_universe(config: &Config) -> Universe {
    if config.import_geometry {
        let path = Path::new("geom").join(Universe::checkpoint_filename(
            config.target_volume,
            config.slices,
            config.seed,
            config.sphere,
        ));
        match Universe::import_geometry(&path, config.sphere, config.target_volume) {
            Ok(universe) => return universe,
            Err(error) => {
                warn!(%error, "no usable geometry checkpoint, building a fresh universe");
            }
        }
    }
    Universe::new(config.slices, config.sphere, config.target_volume)
}
