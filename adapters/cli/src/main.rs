#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a seeded Bastion match headlessly.

mod scenario;
mod session;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use bastion_presentation::TemplateLibrary;
use bastion_transport::SignalingConfig;
use bastion_world::Config;
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::{scenario::Scenario, session::Session};

#[derive(Parser, Debug)]
#[command(name = "bastion", version, about = "Headless Bastion combat simulation")]
struct Cli {
    /// Match configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Template manifest (TOML). Without one, templates are named after their keys.
    #[arg(long)]
    templates: Option<PathBuf>,
    /// Seed for the creep wave.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Number of creeps in the wave.
    #[arg(long, default_value_t = 6)]
    creeps: usize,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
    /// Upper bound on simulated ticks.
    #[arg(long, default_value_t = 1_200)]
    max_ticks: u64,
    /// Mirror every command batch to a loopback peer and verify it stays in sync.
    #[arg(long)]
    mirror: bool,
    /// Most verbose log level to print.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

/// Contents of a match configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MatchFile {
    world: Config,
    signaling: SignalingConfig,
}

/// Entry point for the Bastion command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.into())?;

    let file = match &cli.config {
        Some(path) => load_match_file(path)?,
        None => MatchFile::default(),
    };
    let library = match &cli.templates {
        Some(path) => TemplateLibrary::from_manifest_path(path)
            .with_context(|| format!("failed to load templates from {}", path.display()))?,
        None => TemplateLibrary::with_defaults(file.world.health_bars()),
    };

    let signaling = cli.mirror.then_some(file.signaling);
    let mut session = Session::new(file.world, library, signaling)?;
    println!("{}", session.banner());

    let scenario = Scenario::generate(cli.seed, cli.creeps);
    let outcome = session.run(&scenario, Duration::from_millis(cli.tick_ms), cli.max_ticks)?;

    log::info!("processed {} events", outcome.events);
    println!(
        "{} after {} ticks: {} kills, {} currency",
        if outcome.completed {
            "wave cleared"
        } else {
            "wave still standing"
        },
        outcome.ticks,
        outcome.kills,
        outcome.currency
    );
    Ok(())
}

fn init_logging(level: log::LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("failed to install logger")
}

fn load_match_file(path: &Path) -> Result<MatchFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read match configuration at {}", path.display()))?;
    parse_match_file(&contents)
        .with_context(|| format!("failed to parse match configuration at {}", path.display()))
}

fn parse_match_file(contents: &str) -> Result<MatchFile> {
    let file: MatchFile = toml::from_str(contents)?;
    file.signaling.validate()?;
    Ok(file)
}
