//! # clio
//!
//! Command-line entry point for the Clio report server.
//!
//! ## Commands
//!
//! - `clio serve` - compile the catalog and serve it (the default)
//! - `clio check` - load and compile the catalog, then exit
//! - `clio routes` - print every `METHOD PATH` the catalog registers
//!
//! ## Configuration
//!
//! The configuration file is YAML, TOML or JSON, chosen by extension:
//!
//! - `-c/--config` or `CLIO_CONFIG` - file path (default: `clio.yml`)
//! - `CLIO__<KEY>` - overrides any key, e.g. `CLIO__PORT=8080` or
//!   `CLIO__LOGGING__LEVEL=debug`

#![doc(html_root_url = "https://docs.rs/clio/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clio_config::{ClioConfig, ConfigLoader, LogFormat, LoggingConfig};
use clio_server::{ResourceCompiler, RouteTable, Server, UpstreamRenderer};
use clio_telemetry::{init_logging, install_metrics, LogConfig};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "CLIO";

/// Clio - serves a catalog of reports over HTTP.
#[derive(Debug, Parser)]
#[command(name = "clio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, env = "CLIO_CONFIG", default_value = "clio.yml")]
    pub config: PathBuf,

    /// Subcommand to execute; `serve` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the report catalog.
    Serve(ServeArgs),
    /// Validate the configuration and catalog without serving.
    Check,
    /// Print the routes the catalog registers.
    Routes,
}

/// Options for `clio serve`.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Bind host, overriding the configuration.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port, overriding the configuration.
    #[arg(long)]
    pub port: Option<u16>,
}

/// Runs the selected command.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => serve(&cli.config, ServeArgs::default()).await,
        Some(Commands::Serve(args)) => serve(&cli.config, args).await,
        Some(Commands::Check) => {
            let config = load_config(&cli.config)?;
            let routes = compile(&config)?;
            println!(
                "{}: {} reports, {} routes",
                cli.config.display(),
                routes.resources().count(),
                routes.len()
            );
            Ok(())
        }
        Some(Commands::Routes) => {
            let config = load_config(&cli.config)?;
            for line in route_lines(&compile(&config)?) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Loads the configuration file with `CLIO__*` environment overrides.
pub fn load_config(path: &std::path::Path) -> Result<ClioConfig> {
    ConfigLoader::new()
        .with_file(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?
        .with_env_prefix(ENV_PREFIX)
        .load()
        .with_context(|| format!("invalid configuration {}", path.display()))
}

/// Maps the logging section onto the subscriber settings.
pub fn log_config(logging: &LoggingConfig) -> LogConfig {
    LogConfig {
        level: logging.level.clone(),
        json_format: logging.format == LogFormat::Json,
        directory: logging.directory.clone(),
        ..LogConfig::default()
    }
}

/// Formats every route as `METHOD PATH`, sorted by path.
pub fn route_lines(routes: &RouteTable) -> Vec<String> {
    routes
        .routes()
        .map(|(method, path, _)| format!("{:<4} {path}", method.as_str()))
        .collect()
}

fn compile(config: &ClioConfig) -> Result<RouteTable> {
    ResourceCompiler::from_config(config)
        .compile(&config.reports)
        .context("failed to compile report catalog")
}

async fn serve(path: &std::path::Path, args: ServeArgs) -> Result<()> {
    let mut config = load_config(path)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate().context("invalid server options")?;

    init_logging(&log_config(&config.logging)).context("failed to initialize logging")?;
    let metrics = install_metrics().context("failed to install metrics recorder")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        "Starting Clio"
    );

    let routes = compile(&config)?;
    let renderer = Arc::new(
        UpstreamRenderer::new(&config.renderer).context("failed to create renderer client")?,
    );
    tracing::info!(url = renderer.url(), "Using rendering service");

    Server::from_config(&config, routes, renderer, Some(metrics))
        .context("failed to create server")?
        .run()
        .await
        .context("server error")
}
