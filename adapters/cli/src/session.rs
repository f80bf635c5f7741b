use std::time::Duration;

use monument_core::{Command, Event};
use monument_rendering::Hud;
use monument_world::{apply, query, World};

use crate::{snapshot_transfer::ProgressSnapshot, stream::BlockStream};

/// Fixed frame step used by headless simulations.
pub(crate) const FRAME: Duration = Duration::from_millis(16);

/// Outcome of a headless simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SimulationReport {
    /// Frames simulated until the world settled.
    pub frames: u64,
    /// Simulated time.
    pub elapsed: Duration,
}

/// Streams totals into the world and ticks until the stream is exhausted and
/// every block has landed.
///
/// A progress line is printed every `report_every` frames; zero disables it.
pub(crate) fn simulate(
    world: &mut World,
    stream: &mut BlockStream,
    report_every: u64,
) -> SimulationReport {
    let mut events = Vec::new();
    let mut frames = 0_u64;
    loop {
        frames += 1;
        if let Some(command) = stream.advance(FRAME) {
            apply(world, command, &mut events);
        }
        apply(world, Command::Tick { dt: FRAME }, &mut events);
        log_events(world, events.drain(..));

        if report_every > 0 && frames % report_every == 0 {
            println!("{}", hud(world).caption());
        }
        if stream.is_finished() && query::is_settled(world) {
            break;
        }
    }

    SimulationReport {
        frames,
        elapsed: Duration::from_secs_f64(FRAME.as_secs_f64() * frames as f64),
    }
}

/// Instantly places a persisted snapshot, returning the number of blocks restored.
pub(crate) fn restore(world: &mut World, snapshot: &ProgressSnapshot) -> u64 {
    let mut events = Vec::new();
    apply(
        world,
        Command::RestoreBlocks {
            total: snapshot.total,
            ranges: snapshot.ranges.clone(),
        },
        &mut events,
    );
    let restored = events
        .iter()
        .find_map(|event| match event {
            Event::BlocksRestored { count } => Some(*count),
            _ => None,
        })
        .unwrap_or(0);
    log_events(world, events.into_iter());
    restored
}

/// Progress overlay for the world's current state.
pub(crate) fn hud(world: &World) -> Hud {
    Hud {
        active_name: query::active_structure_name(world).map(str::to_owned),
        active_icon: query::active_structure_icon(world).map(str::to_owned),
        active_progress: query::active_structure_progress(world).unwrap_or(1.0),
        placed: query::total_placed_count(world),
        total: query::total_slots(world),
    }
}

/// One line per structure: icon, name, placed and landed counts.
pub(crate) fn summary_lines(world: &World) -> Vec<String> {
    let mut lines: Vec<String> = query::structures(world)
        .iter()
        .map(|structure| {
            format!(
                "{} {:<24} {:>5}/{:<5} placed, {:>5} landed",
                structure.icon(),
                structure.display_name(),
                structure.placed(),
                structure.capacity(),
                structure.landed()
            )
        })
        .collect();
    lines.push(format!(
        "total: {}/{} placed, {} landed",
        query::total_placed_count(world),
        query::total_slots(world),
        query::landed_count(world)
    ));
    lines
}

fn log_events(world: &World, events: impl Iterator<Item = Event>) {
    for event in events {
        match event {
            Event::StructureStarted { structure } => {
                if let Some(started) = query::structure(world, structure) {
                    log::info!(
                        "construction started: {} {}",
                        started.icon(),
                        started.display_name()
                    );
                }
            }
            Event::BatchAttached { key, capacity } => {
                log::debug!("batch attached: {key:?} ({capacity} instances)");
            }
            Event::BlocksRestored { count } => log::info!("restored {count} blocks"),
            _ => {}
        }
    }
}
