//! BlackBox CLI - demos and diagnostics for the BlackBox LED/sensor device

mod backend;
mod demos;
mod inspect;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backend::Backend;
use blackbox_core::domain::LedMap;
use blackbox_core::Session;
use demos::paint::Grid;
use demos::DemoKind;
use settings::Settings;

#[derive(Parser)]
#[command(name = "blackbox")]
#[command(about = "BlackBox LED/sensor device CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: platform config dir)
    #[arg(long, env = "BLACKBOX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch all LEDs off
    Black,

    /// Radial rainbow synced to the sensor scan
    Hsl {
        /// Stop after this many frames (default: until Ctrl+C)
        #[arg(short, long)]
        frames: Option<u64>,
    },

    /// Color sweep over the 10x10 or 40x40 grid
    Paint {
        #[arg(short, long, value_enum, default_value = "10")]
        grid: Grid,

        /// Stop after this many frames (default: until Ctrl+C)
        #[arg(short, long)]
        frames: Option<u64>,
    },

    /// Print the sensor readings after a full scan
    Read {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Number of scans to print
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Print the LED position map
    Positions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a demo on the emulator and render the displayed frame
    Preview {
        #[arg(short, long, value_enum, default_value = "paint10")]
        demo: DemoKind,

        /// Frames to run before rendering
        #[arg(short, long, default_value = "25")]
        frames: u64,
    },
}

fn init_logging() -> Result<()> {
    let log_format = std::env::var("BLACKBOX_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("blackbox=info"))
        .context("Failed to create env filter")?;

    // Logs go to stderr so JSON output on stdout stays clean
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn open_backend(config: Option<&Path>) -> Result<Backend> {
    let settings = Settings::load(config)?;
    Backend::open(&settings)
}

async fn run_demo(session: &Session, demo: DemoKind, frames: Option<u64>) -> Result<u64> {
    match demo {
        DemoKind::Black => demos::black::run(session).await,
        DemoKind::Hsl => demos::hsl::run(session, frames).await,
        DemoKind::Paint10 => demos::paint::run(session, Grid::Ten, frames).await,
        DemoKind::Paint40 => demos::paint::run(session, Grid::Forty, frames).await,
    }
}

/// Open a session, run one demo, always close
async fn demo_command(config: Option<&Path>, demo: DemoKind, frames: Option<u64>) -> Result<u64> {
    let backend = open_backend(config)?;
    let session = backend.session().await?;
    let result = run_demo(&session, demo, frames).await;
    session.close().await;
    result
}

async fn read_command(config: Option<&Path>, json: bool, count: u32) -> Result<()> {
    let backend = open_backend(config)?;
    let session = backend.session().await?;

    for scan in 0..count {
        let grid = match inspect::full_scan(&session).await {
            Ok(grid) => grid,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        if json {
            let output = json!({
                "scan": scan,
                "backend": session.backend_name(),
                "rows": grid.rows(),
            });
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!(
                "{}",
                format!("Sensor scan {} ({})", scan + 1, session.backend_name())
                    .cyan()
                    .bold()
            );
            println!("{}", inspect::sensor_table(&grid));
        }
    }

    session.close().await;
    Ok(())
}

async fn preview_command(config: Option<&Path>, demo: DemoKind, frames: u64) -> Result<()> {
    let backend = open_backend(config)?;
    let Some(emulator) = backend.emulator().cloned() else {
        anyhow::bail!("Preview needs the emulator backend (set BBEMU or backend = \"emulator\")");
    };

    let session = backend.session().await?;
    let result = run_demo(&session, demo, Some(frames)).await;
    if result.is_ok() {
        // Let the emulator display the last committed frame
        sleep(emulator.config().frame_period() * 2).await;
    }
    session.close().await;
    let shown = result?;

    println!(
        "{}",
        format!(
            "Emulator after {} frames ({} displayed)",
            shown,
            emulator.frames_shown()
        )
        .cyan()
        .bold()
    );
    println!(
        "{}",
        inspect::render_frame(&emulator.displayed_frame(), &LedMap::new())
    );
    Ok(())
}

fn positions_command(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&inspect::led_positions())?);
        return Ok(());
    }

    println!("{}", "LED positions (40x40)".cyan().bold());
    println!("{}", inspect::positions_table(inspect::led_positions()));
    println!();
    println!("{}", inspect::position_map(&LedMap::new()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    info!("BlackBox CLI v{}", blackbox_core::VERSION);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Black => {
            demo_command(config, DemoKind::Black, None).await?;
            println!("{}", "✓ All LEDs off".green().bold());
        }

        Commands::Hsl { frames } => {
            let shown = demo_command(config, DemoKind::Hsl, frames).await?;
            println!("{}", format!("✓ {} frames shown", shown).green().bold());
        }

        Commands::Paint { grid, frames } => {
            let demo = match grid {
                Grid::Ten => DemoKind::Paint10,
                Grid::Forty => DemoKind::Paint40,
            };
            let shown = demo_command(config, demo, frames).await?;
            println!("{}", format!("✓ {} frames shown", shown).green().bold());
        }

        Commands::Read { json, count } => read_command(config, json, count).await?,

        Commands::Positions { json } => positions_command(json)?,

        Commands::Preview { demo, frames } => preview_command(config, demo, frames).await?,
    }

    Ok(())
}
