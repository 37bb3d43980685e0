use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

use mqtt_notify::config::Config;
use mqtt_notify::credentials::SecretServiceStore;
use mqtt_notify::daemon::{self, DispatchStats, Shutdown};
use mqtt_notify::decoder;
use mqtt_notify::display::DesktopSurface;
use mqtt_notify::registry::NotificationRegistry;

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if cli.log_stderr {
        builder.target(env_logger::Target::Stderr).init();
        return Ok(());
    }

    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mqtt-notify")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("mqtt-notify.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Run) => {
            config.validate().context("Invalid configuration")?;
            handle_run_command(config).await
        }
        Some(Commands::Show { payload }) => handle_show_command(payload, config),
        Some(Commands::CheckConfig) => {
            config.validate().context("Invalid configuration")?;
            handle_check_config_command(config)
        }
    }
}

async fn handle_run_command(config: &Config) -> Result<()> {
    println!(
        "{} {}:{} topic '{}'",
        "Bridging".cyan(),
        config.broker,
        config.port,
        config.topic
    );

    let store = SecretServiceStore::new(config.credential.service.clone());
    let stats = daemon::run_bridge(config, &store, Shutdown::listen())
        .await
        .context("Bridge failed")?;

    print_summary(&stats);
    Ok(())
}

fn handle_show_command(payload: &str, config: &Config) -> Result<()> {
    info!("Showing payload locally: {}", payload);
    let request = decoder::decode(payload.as_bytes()).context("Payload rejected")?;

    // Closures are not tracked for a one-shot notification
    let mut surface = DesktopSurface::new(config.app_name.clone());
    let mut registry = NotificationRegistry::new(config.icon.clone());

    let outcome = registry
        .handle(&mut surface, &request)
        .context("Failed to display notification")?;

    println!("{} {}", "Shown:".green(), outcome.id());
    Ok(())
}

fn handle_check_config_command(config: &Config) -> Result<()> {
    println!("{}", "Configuration OK".green());
    println!("  broker: {}:{} (tls: {}, insecure: {})", config.broker, config.port, config.tls, config.insecure);
    println!("  topic:  {}", config.topic);
    println!("  user:   {}", config.user);
    if let Some(icon) = &config.icon {
        println!("  icon:   {}", icon);
    }
    Ok(())
}

fn print_summary(stats: &DispatchStats) {
    println!(
        "{} {} received, {} displayed, {} rejected, {} display failures, {} dismissed, {} reconnects",
        "Stopped:".yellow(),
        stats.received,
        stats.displayed(),
        stats.rejected,
        stats.display_failures,
        stats.dismissed,
        stats.reconnects
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; `run` and `check-config` refuse to start if it is invalid
    let config = Config::discover(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&cli, &config).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
