// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Headless runner: fills the world with a random particle soup, advances it for a number of
// steps and reports the counters and timings.

use anyhow::{anyhow, Context, Result};
use colored::*;
use glam::Vec3;
use log::info;
use periodic_table::SpeciesTable;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use simulation::prelude::*;
use std::env;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: valence(.exe) [--config=file.toml] [--particles=N] [--steps=N] \
                     [--seed=N] [--threads=N] [--species=H,C,N,O] [--report=N]";

struct Options {
    config: Option<String>,
    particles: usize,
    steps: u64,
    seed: Option<u64>,
    threads: Option<usize>,
    species: Vec<String>,
    report: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            particles: 2000,
            steps: 600,
            seed: None,
            threads: None,
            species: ["H", "H", "H", "C", "N", "O", "O"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            report: 100,
        }
    }
}

fn parse_value<T: std::str::FromStr>(arg: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value in {arg}\n{USAGE}"))
}

fn parse_args() -> Result<Options> {
    let mut options = Options::default();
    for arg in env::args().skip(1) {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(anyhow!("unexpected argument {arg}\n{USAGE}"));
        };
        match key {
            "--config" => options.config = Some(value.to_string()),
            "--particles" => options.particles = parse_value(&arg, value)?,
            "--steps" => options.steps = parse_value(&arg, value)?,
            "--seed" => options.seed = Some(parse_value(&arg, value)?),
            "--threads" => options.threads = Some(parse_value(&arg, value)?),
            "--report" => options.report = parse_value::<u64>(&arg, value)?.max(1),
            "--species" => {
                options.species = value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            _ => return Err(anyhow!("unknown option {key}\n{USAGE}")),
        }
    }
    Ok(options)
}

fn populate(sim: &mut Simulation, options: &Options, seed: u64) -> Result<()> {
    let table = sim.species_table();
    let ids = options
        .species
        .iter()
        .map(|symbol| {
            table
                .by_symbol(symbol)
                .ok_or_else(|| anyhow!("unknown species {symbol}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        return Err(anyhow!("no species to spawn"));
    }

    let (min, max) = (sim.config().world_min, sim.config().world_max);
    let mut rng = SmallRng::seed_from_u64(seed);
    for _ in 0..options.particles {
        let species = ids[rng.gen_range(0..ids.len())];
        let position = Vec3::new(
            rng.gen_range(min.x..max.x),
            rng.gen_range(min.y..max.y),
            rng.gen_range(min.z..max.z),
        );
        let velocity = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
        sim.queue_spawn(species, position, velocity)?;
    }
    Ok(())
}

fn run() -> Result<()> {
    let options = parse_args()?;

    let mut config = match &options.config {
        Some(path) => SimulationConfig::from_toml_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = options.seed {
        config.seed = seed;
    }
    if let Some(threads) = options.threads {
        config.worker_threads = threads;
    }
    let view = ViewRect::new(config.world_min.truncate(), config.world_max.truncate());
    let seed = config.seed;

    let mut sim = Simulation::new(SpeciesTable::standard(), config)?;
    populate(&mut sim, &options, seed)?;
    info!("queued {} particles", options.particles);

    println!(
        "{}",
        format!(
            "Running {} steps with {} particles (seed {:#x})...",
            options.steps, options.particles, seed
        )
        .green()
    );
    println!();

    let mut frame = RenderFrame::default();
    let mut stepping = Duration::ZERO;
    let mut compacting = Duration::ZERO;
    for step in 1..=options.steps {
        let start = Instant::now();
        sim.step();
        stepping += start.elapsed();

        let start = Instant::now();
        sim.compact_into(&view, &mut frame);
        compacting += start.elapsed();

        if step % options.report == 0 || step == options.steps {
            let counters = sim.counters();
            println!(
                "step {:>6}: {:>6} particles, {:>6} bonds, {:>5} molecules, {:>6} visible",
                step,
                sim.particle_count(),
                sim.bonds().len(),
                sim.molecule_count(),
                frame.stats.visible_particles
            );
            if counters.last_step.grid_overflows > 0 {
                println!(
                    "{}",
                    format!("  {} grid overflows", counters.last_step.grid_overflows).red()
                );
            }
        }
    }

    let total = sim.counters().total;
    let steps = options.steps.max(1) as u32;
    println!();
    println!("{}", format!("Stepping: {:?} per step", stepping / steps).yellow());
    println!("{}", format!("Compaction: {:?} per step", compacting / steps).yellow());
    println!(
        "bonds formed {}, broken {}; spawned {}, rejected {}; grid overflows {}; resets {}",
        total.bonds_formed,
        total.bonds_broken,
        total.particles_spawned,
        total.spawns_rejected,
        total.grid_overflows,
        total.numeric_resets
    );

    info!("finished at step {}", sim.counters().step);
    Ok(())
}

fn main() {
    logging::Logging::new(vec!["valence", "valence-simulation", "valence-periodic-table"]).init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        for cause in err.chain().skip(1) {
            eprintln!("because: {}", cause);
        }
        std::process::exit(1);
    }
}
