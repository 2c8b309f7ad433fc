#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a formation scenario headlessly.

mod patrol;
mod scenario;
mod trace;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use formation_core::{Command, FollowerId, Steering};
use formation_kinematic::KinematicAgent;
use formation_world::{self as world, query, World};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use patrol::Patrol;
use scenario::Scenario;
use trace::{TraceFormat, TraceLine};

#[derive(Debug, Parser)]
#[command(name = "formation", about = "Drives a formation through a waypoint patrol")]
struct Args {
    /// Scenario file describing the formation and its waypoints.
    scenario: PathBuf,
    /// Overrides the number of ticks to simulate.
    #[arg(long)]
    ticks: Option<u64>,
    /// Overrides the random seed used for visual leader selection.
    #[arg(long)]
    seed: Option<u64>,
    /// Maximum level of log messages written to stderr.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
    /// Encoding of the position trace.
    #[arg(long, value_enum, default_value_t = TraceFormat::Text)]
    format: TraceFormat,
    /// Overrides how many ticks pass between trace lines; zero disables the trace.
    #[arg(long)]
    report_every: Option<u64>,
}

/// Entry point for the formation command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level)?;

    let mut scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("could not load scenario {}", args.scenario.display()))?;
    if let Some(ticks) = args.ticks {
        scenario.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        scenario.config.rng_seed = seed;
    }
    if let Some(report_every) = args.report_every {
        scenario.report_every = report_every;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let arrivals = run(&scenario, args.format, &mut out)?;
    out.flush().context("could not flush trace output")?;
    info!("simulation finished after {} ticks with {arrivals} arrivals", scenario.ticks);
    Ok(())
}

fn init_logging(level: LevelFilter) -> Result<()> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .context("could not install terminal logger")
}

fn build_world(scenario: &Scenario) -> World {
    let leader = KinematicAgent::new(scenario.leader.position)
        .with_yaw(scenario.leader.yaw)
        .with_path_latency(scenario.leader.path_latency);
    let follower_position = scenario.leader.position;
    World::new(
        scenario.config,
        Some(Box::new(leader)),
        Box::new(move |_: FollowerId| {
            Some(Box::new(KinematicAgent::new(follower_position)) as Box<dyn Steering>)
        }),
    )
}

/// Runs the scenario and returns the number of arrivals observed.
fn run(scenario: &Scenario, format: TraceFormat, out: &mut impl Write) -> Result<u32> {
    let mut world = build_world(scenario);
    let mut patrol = Patrol::new(
        scenario.waypoints.clone(),
        scenario.formation,
        scenario.schedule.clone(),
    );

    let mut pending = vec![Command::SpawnFormation {
        formation: scenario.formation,
        teleport: scenario.teleport,
    }];
    pending.extend(patrol.advance());

    let tick = scenario.tick();
    let mut events = Vec::new();
    for index in 1..=scenario.ticks {
        events.clear();
        for command in pending.drain(..) {
            world::apply(&mut world, command, &mut events);
        }
        world::apply(&mut world, Command::Tick { dt: tick }, &mut events);
        patrol.observe(&events, &mut pending);

        if scenario.report_every > 0 && index % scenario.report_every == 0 {
            TraceLine::capture(&world, index).write(format, out)?;
        }
    }

    if !query::formation_arrived(&world) {
        info!("formation still travelling when the run ended");
    }
    Ok(patrol.arrivals())
}
