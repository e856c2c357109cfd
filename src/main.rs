//! Binary entry point for tally.
//!
//! Runs the ingestion server and the window scheduler, or performs one-off
//! maintenance commands against the configured backends.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tally::config::TallyConfig;
use tally::observability::{self, InitOptions};
use tally::services::{
    BackendFactory, DedupWindow, RequestAcceptor, TickReport, WindowScheduler, shutdown_channel,
};
use tally::server;

/// Tally - windowed distinct-identifier counting.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "TALLY_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP ingestion server and the window scheduler.
    Serve {
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,

        /// Window length in milliseconds.
        #[arg(long)]
        window_ms: Option<u64>,
    },

    /// Drain the configured store once and publish its count.
    Tick,

    /// Show configuration.
    Config {
        /// Print the effective configuration as TOML.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Serve { .. });
    let mut observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = run_command(cli.command, config).await;
    observability.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration and applies CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<TallyConfig> {
    let mut config = TallyConfig::load(cli.config.as_deref())?;

    if let Commands::Serve { port, window_ms } = &cli.command {
        if let Some(port) = port {
            config = config.with_port(*port);
        }
        if let Some(ms) = window_ms {
            config = config.with_window_interval(Duration::from_millis(*ms));
        }
    }

    config.validate()?;
    Ok(config)
}

/// Runs the selected command.
async fn run_command(command: Commands, config: TallyConfig) -> anyhow::Result<()> {
    match command {
        Commands::Serve { .. } => cmd_serve(config).await,
        Commands::Tick => cmd_tick(config).await,
        Commands::Config { show } => cmd_config(&config, show),
    }
}

/// Serve command.
async fn cmd_serve(config: TallyConfig) -> anyhow::Result<()> {
    let backends = BackendFactory::create_all(&config).context("creating backends")?;
    let window = Arc::new(DedupWindow::new(backends.store));
    let acceptor = Arc::new(RequestAcceptor::new(Arc::clone(&window)));
    let scheduler = Arc::new(WindowScheduler::new(
        window,
        backends.emitter,
        config.window_interval,
    ));

    let (trigger, shutdown) = shutdown_channel();
    let listener = server::bind(&config.server.host, config.server.port).await?;
    let scheduler_task = scheduler.spawn(shutdown.clone());
    let server_task = tokio::spawn(server::serve(listener, server::router(acceptor), shutdown));

    let signal = trigger.trigger_after(tokio::signal::ctrl_c()).await;
    match &signal {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }

    let served = server_task.await.context("server task panicked")?;
    scheduler_task.await.context("scheduler task panicked")?;
    served?;
    signal.context("waiting for Ctrl+C")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Tick command.
async fn cmd_tick(config: TallyConfig) -> anyhow::Result<()> {
    let backends = BackendFactory::create_all(&config).context("creating backends")?;
    let window = Arc::new(DedupWindow::new(backends.store));
    let scheduler = WindowScheduler::new(window, backends.emitter, config.window_interval);

    let report = tokio::task::spawn_blocking(move || scheduler.tick())
        .await
        .context("tick task panicked")?;

    match report {
        TickReport::Published(emitted) => {
            println!("{}", emitted.message());
            Ok(())
        },
        TickReport::PublishFailed { emitted, cause } => Err(anyhow::anyhow!(
            "drained {} identifiers but publish failed: {cause}",
            emitted.count
        )),
        TickReport::DrainFailed { cause } => Err(anyhow::anyhow!("drain failed: {cause}")),
        TickReport::Skipped => Err(anyhow::anyhow!("another drain is in progress")),
    }
}

/// Config command.
fn cmd_config(config: &TallyConfig, show: bool) -> anyhow::Result<()> {
    if show {
        print!("{}", config.to_toml()?);
    } else {
        match tally::config::default_config_path() {
            Some(path) => println!("Default config path: {}", path.display()),
            None => println!("No default config path on this platform"),
        }
        println!("Use --show to print the effective configuration");
    }
    Ok(())
}
