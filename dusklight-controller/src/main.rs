//! Dusklight strip controller
//!
//! Usage: cargo run -p dusklight-controller -- --config dusklight.json
//! Then send `<topic> <payload>` lines to the listen address, e.g.
//! `printf 'LEDStatus 1\n' | nc 127.0.0.1 1883`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dusklight_gradient_lib::{Phase, PhaseBoundary};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

mod broker;
mod clock;
mod config;
mod controller;
mod storage;
mod strip;

use broker::LineBroker;
use clock::WallClock;
use config::{Config, LogLevel};
use controller::Controller;
use storage::JsonFileStore;
use strip::LogStrip;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "dusklight.json")]
    config: PathBuf,

    /// Pin the time of day (H:MM) instead of reading the system clock.
    #[arg(short, long)]
    time: Option<PhaseBoundary>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the frame of the stored parameters without driving anything.
    Render {
        /// Phase to render; defaults to the phase at the current time.
        #[arg(short, long, value_enum)]
        phase: Option<PhaseArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Day,
    Night,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Day => Self::Day,
            PhaseArg::Night => Self::Night,
        }
    }
}

/// Install the stderr sink at the most verbose level; the configured level
/// is applied once the config has been read.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(LogLevel::Debug.as_tracing_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    log::set_max_level(LogLevel::default().as_level_filter());
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let config = Config::load_or_default(&args.config);
    config.log_level.apply();

    if args.init_config {
        return config.save(&args.config);
    }

    let clock = args.time.map_or(WallClock::Local, WallClock::Fixed);
    let storage = JsonFileStore::open(&config.state_file)?;
    info!("Storage: using {}", storage.path().display());
    let controller = Controller::new(&config, storage, LogStrip::new(), clock.now())
        .context("building parameter sets")?;

    match args.command {
        Some(Command::Render { phase }) => {
            let phase = phase
                .map(Phase::from)
                .unwrap_or_else(|| controller.parameters().active_phase());
            print_frame(&controller, phase);
            Ok(())
        }
        None => run(&config, clock, controller),
    }
}

fn print_frame(controller: &Controller<JsonFileStore, LogStrip>, phase: Phase) {
    let frame = controller.preview(phase);
    println!("{phase} phase, {} pixels", frame.len());
    println!("{:>4} {:>4} {:>4} {:>4} {:>4}", "#", "R", "G", "B", "W");
    for (i, px) in frame.iter().enumerate() {
        println!("{:>4} {:>4} {:>4} {:>4} {:>4}", i + 1, px.r, px.g, px.b, px.w);
    }
}

fn run(
    config: &Config,
    clock: WallClock,
    mut controller: Controller<JsonFileStore, LogStrip>,
) -> Result<()> {
    let mut broker = LineBroker::bind(&config.listen_addr)?;
    info!("Broker: listening on {}", broker.local_addr()?);
    let interval = Duration::from_millis(config.poll_interval_ms);
    info!("All systems running!");

    loop {
        for message in broker.poll() {
            controller.handle_message(&message.topic, &message.payload, &mut broker);
        }
        controller.poll_clock(clock.now(), &mut broker);
        std::thread::sleep(interval);
    }
}
