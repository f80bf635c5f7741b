#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for the monument construction engine.

mod session;
mod snapshot_transfer;
mod stream;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use glam::Vec3;
use monument_core::{Command, EraIndex, MilestoneBlockRange, StructureDescriptor};
use monument_rendering::{Color, OrbitCamera, Presentation, RenderingBackend, Scene};
use monument_rendering_macroquad::MacroquadBackend;
use monument_world::{apply, query, EngineConfig, World};

use crate::{snapshot_transfer::ProgressSnapshot, stream::BlockStream};

/// Procedural monument construction engine.
#[derive(Debug, Parser)]
#[command(name = "monument", version, about)]
struct CliArgs {
    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Structure catalog file (JSON); the built-in catalog is used when omitted.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Overrides the configured random seed.
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Streams growing block totals through the engine until every block lands.
    Simulate(SimulateArgs),
    /// Instantly places a persisted block total.
    Restore(RestoreArgs),
    /// Produces a progress snapshot string.
    Encode(EncodeArgs),
    /// Prints the built-in structure catalog as JSON.
    ExportCatalog,
    /// Opens a window and watches construction live.
    View(ViewArgs),
}

#[derive(Debug, Args)]
struct StreamArgs {
    /// Blocks earned per second.
    #[arg(long, default_value_t = 40.0)]
    rate: f64,
    /// Blocks earned per era.
    #[arg(long, default_value_t = 400)]
    blocks_per_era: u64,
    /// Snapshot string to resume from.
    #[arg(long)]
    snapshot: Option<String>,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Cumulative block total to reach.
    #[arg(long, default_value_t = 1000)]
    target: u64,
    /// Frames between progress lines; zero disables them.
    #[arg(long, default_value_t = 120)]
    report_every: u64,
    #[command(flatten)]
    stream: StreamArgs,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct RestoreArgs {
    /// Snapshot string produced by `encode` or `simulate`.
    #[arg(long)]
    snapshot: Option<String>,
    /// Plain block total restored in the current era.
    #[arg(long)]
    total: Option<u64>,
}

#[derive(Debug, Args)]
struct EncodeArgs {
    /// Cumulative block total.
    #[arg(long)]
    total: u64,
    /// Era range as `start:end:era`; repeat for each range.
    #[arg(long = "range", value_parser = parse_range)]
    ranges: Vec<MilestoneBlockRange>,
}

#[derive(Debug, Args)]
struct ViewArgs {
    /// Cumulative block total at which live streaming stops.
    #[arg(long)]
    target: Option<u64>,
    /// Renders as fast as possible instead of waiting for the display.
    #[arg(long)]
    no_vsync: bool,
    /// Logs frame timings once per second.
    #[arg(long)]
    show_fps: bool,
    /// Draws block outlines from the first frame.
    #[arg(long)]
    wireframe: bool,
    #[command(flatten)]
    stream: StreamArgs,
}

/// Entry point for the monument command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();

    match &args.command {
        CliCommand::Simulate(simulate) => run_simulate(&args, simulate),
        CliCommand::Restore(restore) => run_restore(&args, restore),
        CliCommand::Encode(encode) => run_encode(encode),
        CliCommand::ExportCatalog => {
            let json = monument_catalog::to_json_string(&monument_catalog::reference_catalog())
                .context("failed to serialise the built-in catalog")?;
            println!("{json}");
            Ok(())
        }
        CliCommand::View(view) => run_view(&args, view),
    }
}

fn run_simulate(args: &CliArgs, simulate: &SimulateArgs) -> Result<()> {
    let mut world = build_world(args)?;
    let mut stream = open_stream(&simulate.stream, simulate.target)?;
    if stream.total() > 0 {
        let restored = session::restore(&mut world, stream.snapshot());
        log::info!("resumed from {} blocks ({restored} placed)", stream.total());
    }

    let report = session::simulate(&mut world, &mut stream, simulate.report_every);
    for line in session::summary_lines(&world) {
        println!("{line}");
    }
    println!(
        "settled after {} frames ({:.1}s simulated)",
        report.frames,
        report.elapsed.as_secs_f64()
    );
    let snapshot = stream
        .snapshot()
        .encode()
        .context("failed to encode the progress snapshot")?;
    println!("{snapshot}");
    Ok(())
}

fn run_restore(args: &CliArgs, restore: &RestoreArgs) -> Result<()> {
    let snapshot = match (&restore.snapshot, restore.total) {
        (Some(encoded), _) => {
            ProgressSnapshot::decode(encoded).context("failed to decode the progress snapshot")?
        }
        (None, Some(total)) => ProgressSnapshot {
            total,
            ranges: Vec::new(),
        },
        (None, None) => ProgressSnapshot::default(),
    };

    let mut world = build_world(args)?;
    let restored = session::restore(&mut world, &snapshot);
    println!("restored {restored} of {} blocks", snapshot.total);
    for line in session::summary_lines(&world) {
        println!("{line}");
    }
    Ok(())
}

fn run_encode(encode: &EncodeArgs) -> Result<()> {
    let snapshot = ProgressSnapshot {
        total: encode.total,
        ranges: encode.ranges.clone(),
    };
    let encoded = snapshot
        .encode()
        .context("failed to encode the progress snapshot")?;
    let _ = ProgressSnapshot::decode(&encoded)
        .context("era ranges must be ordered and non-overlapping")?;
    println!("{encoded}");
    Ok(())
}

fn run_view(args: &CliArgs, view: &ViewArgs) -> Result<()> {
    let mut world = build_world(args)?;
    let target = view
        .target
        .unwrap_or_else(|| query::total_slots(&world) as u64);
    let mut stream = open_stream(&view.stream, target)?;

    let mut scene = Scene::new();
    let mut events = Vec::new();
    if stream.total() > 0 {
        apply(
            &mut world,
            Command::RestoreBlocks {
                total: stream.total(),
                ranges: stream.snapshot().ranges.clone(),
            },
            &mut events,
        );
    }
    scene.apply_events(&events);
    let _ = scene.sync(query::batch_manager(&world));
    scene.hud = session::hud(&world);
    events.clear();

    let camera = OrbitCamera::new(Vec3::new(0.0, 4.0, 0.0), 70.0, 38.0, 0.08)
        .context("invalid default camera")?;
    let presentation = Presentation::new("Monument", Color::from_rgb_u8(24, 22, 30), camera, scene);
    let backend = MacroquadBackend::new()
        .with_vsync(!view.no_vsync)
        .with_show_fps(view.show_fps)
        .with_wireframe(view.wireframe);

    backend.run(presentation, move |dt, _input, scene| {
        if let Some(command) = stream.advance(dt) {
            apply(&mut world, command, &mut events);
        }
        apply(&mut world, Command::Tick { dt }, &mut events);
        scene.apply_events(&events);
        events.clear();
        let _ = scene.sync(query::batch_manager(&world));
        scene.hud = session::hud(&world);
    })
}

/// Opens a block stream that resumes from the snapshot argument when one is given.
fn open_stream(args: &StreamArgs, target: u64) -> Result<BlockStream> {
    ensure!(
        args.rate > 0.0,
        "block rate must be positive (received {})",
        args.rate
    );
    let snapshot = match &args.snapshot {
        Some(encoded) => {
            ProgressSnapshot::decode(encoded).context("failed to decode the progress snapshot")?
        }
        None => ProgressSnapshot::default(),
    };
    Ok(BlockStream::resume(snapshot, args.rate, args.blocks_per_era, target))
}

fn build_world(args: &CliArgs) -> Result<World> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    let catalog = load_catalog(args.catalog.as_deref())?;
    World::new(&config, catalog).context("engine configuration is invalid")
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read engine configuration {}", path.display()))?;
    EngineConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load engine configuration {}", path.display()))
}

fn load_catalog(path: Option<&Path>) -> Result<Vec<StructureDescriptor>> {
    match path {
        Some(path) => monument_catalog::from_path(path)
            .with_context(|| format!("failed to load structure catalog {}", path.display())),
        None => Ok(monument_catalog::reference_catalog()),
    }
}

fn parse_range(value: &str) -> Result<MilestoneBlockRange, String> {
    let fields: Vec<&str> = value.split(':').collect();
    let [start, end, era] = fields.as_slice() else {
        return Err(format!("expected start:end:era, received '{value}'"));
    };
    let parse = |field: &str| {
        field
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("'{field}' is not a non-negative integer"))
    };
    let era = u32::try_from(parse(*era)?).map_err(|_| format!("era '{era}' is too large"))?;
    Ok(MilestoneBlockRange::new(parse(*start)?, parse(*end)?, EraIndex::new(era)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn ranges_parse_from_colon_triples() {
        assert_eq!(
            parse_range("0:820:1"),
            Ok(MilestoneBlockRange::new(0, 820, EraIndex::new(1)))
        );
        assert!(parse_range("0:820").is_err());
        assert!(parse_range("a:820:1").is_err());
    }

    #[test]
    fn restore_requires_a_source() {
        assert!(CliArgs::try_parse_from(["monument", "restore"]).is_err());
        assert!(CliArgs::try_parse_from(["monument", "restore", "--total", "5"]).is_ok());
        assert!(CliArgs::try_parse_from([
            "monument",
            "restore",
            "--total",
            "5",
            "--snapshot",
            "monument:v1:5:W10"
        ])
        .is_err());
    }

    #[test]
    fn encode_collects_repeated_ranges() {
        let args = CliArgs::try_parse_from([
            "monument",
            "encode",
            "--total",
            "900",
            "--range",
            "0:820:0",
            "--range",
            "820:900:1",
        ])
        .expect("valid arguments");
        match args.command {
            CliCommand::Encode(encode) => assert_eq!(encode.ranges.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
