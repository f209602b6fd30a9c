//! dozed: always-on-display / doze orchestration daemon
//!
//! Watches screen power transitions and, per the user's doze policy, switches
//! the pickup, proximity and ambient sensors on and off and drives the panel's
//! doze brightness controls.
//!
//! Screen transitions and sensor readings arrive on stdin as an event feed
//! (see `feed`); actuation goes to the panel device files configured in
//! ~/.config/dozed/doze.toml.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod actuators;
mod config;
mod error;
mod feed;
mod orchestrator;
mod screen;
mod sensors;
mod service;
mod shared;

use actuators::queued::QueuedActuator;
use actuators::sysfs::SysfsActuator;
use actuators::{DozeActuator, LoggingActuator};
use config::{Config, ReloadingPolicy, POLICY_RELOAD_INTERVAL};
use screen::ScreenBroadcaster;
use sensors::virtual_service::VirtualSensorService;
use service::DozeService;

// === CLI ===

#[derive(Parser)]
#[command(name = "dozed")]
#[command(about = "Always-on-display and doze gesture daemon")]
struct Cli {
    /// Config file (default: ~/.config/dozed/doze.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon, reading the event feed from stdin
    Run {
        /// Log actuator writes instead of touching device files
        #[arg(long)]
        dry_run: bool,
    },
    /// Open the config file in your editor, creating it from the template
    Config,
    /// Print the current policy snapshot as JSON
    Policy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config) => {
            edit_config(cli.config)?;
        }
        Some(Commands::Policy) => {
            let policy = Config::load_from(cli.config.as_deref()).policy;
            println!("{}", serde_json::to_string_pretty(&policy)?);
        }
        Some(Commands::Run { dry_run }) => {
            run_daemon(cli.config, dry_run).await?;
        }
        None => {
            run_daemon(cli.config, false).await?;
        }
    }

    Ok(())
}

/// Edit the config file, then check that the daemon can parse it
fn edit_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path
        .or_else(Config::path)
        .context("Could not determine config directory")?;
    if Config::write_template(&path)? {
        println!("Created {} from the bundled template", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "nano".to_string());
    let status = std::process::Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to start {}", editor))?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", editor, status);
    }

    match Config::read(&path) {
        Ok(config) => println!(
            "{}: ok, {} sensor(s) declared",
            path.display(),
            config.sensors.present.len()
        ),
        Err(e) => eprintln!("Warning: {:#}. dozed will run with defaults.", e),
    }
    Ok(())
}

/// Run the doze daemon until stdin closes or Ctrl-C
async fn run_daemon(config_path: Option<PathBuf>, dry_run: bool) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting dozed");

    let config = Config::load_from(config_path.as_deref());

    let sensors = Arc::new(
        config
            .sensors
            .present
            .iter()
            .fold(VirtualSensorService::new(), |service, sensor| {
                service.with_sensor(sensor.id.clone(), sensor.max_range)
            }),
    );
    tracing::info!("Sensors present: {}", sensors.sensor_ids().join(", "));

    let device: Arc<dyn DozeActuator> = if dry_run {
        Arc::new(LoggingActuator)
    } else {
        Arc::new(SysfsActuator::new(config.actuator.clone()))
    };
    let actuator = Arc::new(QueuedActuator::spawn(device));

    let policy = Arc::new(ReloadingPolicy::new(config_path, config.policy.clone()));
    let reloader = policy.spawn_reloader(POLICY_RELOAD_INTERVAL);

    let screen = Arc::new(ScreenBroadcaster::new());
    let service = DozeService::start(
        sensors.clone(),
        &config.sensors,
        actuator.clone(),
        policy,
        screen.clone(),
    );

    let targets = feed::FeedTargets {
        screen: &screen,
        sensors: &sensors,
        sensor_ids: &config.sensors,
    };

    let lines = feed::spawn_reader(std::io::BufReader::new(std::io::stdin()))
        .context("Failed to start the event feed reader")?;

    tokio::select! {
        result = feed::run(lines, targets) => {
            if let Err(e) = result {
                tracing::error!("Event feed failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    service.stop().await;
    reloader.abort();
    actuator.close().await;
    tracing::info!("dozed stopped");
    Ok(())
}
