#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless runner that advances the agents of a scenario file and writes
//! their states as JSON lines.

mod config;

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use floorsim_system_movement::Simulation;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ScenarioFile;

/// Runs a pedestrian floor simulation without rendering.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario description in TOML format.
    scenario: PathBuf,

    /// Simulated seconds, overriding the scenario file.
    #[arg(long)]
    duration: Option<f64>,

    /// Seconds between two recorded snapshots, overriding the scenario file.
    #[arg(long)]
    sample_interval: Option<f64>,

    /// Writes the snapshots to a file instead of standard output.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

/// Entry point for the floor simulation command-line interface.
fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("floorsim=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let scenario = ScenarioFile::load(&args.scenario)?;
    let duration = args.duration.unwrap_or(scenario.duration);
    let sample_interval = args.sample_interval.unwrap_or(scenario.sample_interval);
    anyhow::ensure!(sample_interval > 0.0, "sample interval must be positive");

    let mut simulation = scenario.build(duration)?;
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let dt = scenario.motion.time_step;
    let mut next_sample = 0.0;
    let mut events = 0_usize;
    let mut faults = 0_usize;
    while simulation.time() < duration {
        if simulation.time() + dt * 0.5 >= next_sample {
            write_snapshots(&mut out, &simulation)?;
            next_sample += sample_interval;
        }
        let report = simulation.advance(dt);
        events += report.events.len();
        for (agent, fault) in report.faults {
            faults += 1;
            error!(agent = agent.get(), %fault, "agent stopped");
        }
    }
    write_snapshots(&mut out, &simulation)?;
    out.flush().context("failed to flush snapshots")?;

    info!(
        simulated = simulation.time(),
        agents = simulation.agents().len(),
        events,
        faults,
        "simulation finished"
    );
    Ok(())
}

fn write_snapshots(out: &mut dyn Write, simulation: &Simulation) -> Result<()> {
    for snapshot in simulation.snapshots() {
        serde_json::to_writer(&mut *out, &snapshot).context("failed to encode snapshot")?;
        writeln!(out).context("failed to write snapshot")?;
    }
    Ok(())
}
