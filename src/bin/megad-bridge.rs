// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `megad-bridge`: listen for `MegaD` notifications and print port changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use megad_lib::{DeviceRegistry, EventBus, LogSink, Server, Settings};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bridge between `MegaD` controllers and line-oriented JSON consumers.
#[derive(Parser)]
#[command(name = "megad-bridge", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, env = "MEGAD_CONFIG", default_value = "megad.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notification listener and print every port change as JSON.
    Serve {
        /// Override the configured listen address.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Poll every configured device once and report whether it answered.
    Check,

    /// Validate the configuration and list the configured devices.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { listen } => cmd_serve(&cli.config, listen).await?,
        Commands::Check => cmd_check(&cli.config).await?,
        Commands::Config => cmd_config(&cli.config)?,
    }

    Ok(())
}

async fn cmd_serve(config_path: &Path, listen: Option<String>) -> Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(listen) = listen {
        settings.listen = listen;
    }
    let addr = settings.listen_addr()?;

    let bus = EventBus::new();
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
            }
        }
    });

    let server = Server::from_settings(&settings, Arc::new(bus));
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    info!(devices = settings.devices.len(), "Starting MegaD bridge");
    server.registry().discover_all().await;

    let poller = settings
        .poll_interval()
        .and_then(|interval| server.spawn_poller(interval, shutdown.clone()));

    server
        .serve(addr, shutdown)
        .await
        .with_context(|| format!("listener on {addr} failed"))?;

    if let Some(poller) = poller {
        poller.await?;
    }
    Ok(())
}

async fn cmd_check(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    let registry = DeviceRegistry::new(&settings, Arc::new(LogSink));

    for device in registry.discover_all().await {
        if !settings.check_online_on_discovery {
            device.check_online().await;
        }
        let status = if device.is_online() { "online" } else { "offline" };
        println!("{:<15} {:<20} {status}", device.ip(), device.name());
        for (index, state) in device.port_states() {
            let state = state.map_or("unknown", |s| s.as_str());
            println!("    port {index:>3}: {state}");
        }
    }
    Ok(())
}

fn cmd_config(config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)?;
    println!("Configuration at '{}' is valid.", config_path.display());
    println!("listen: {}", settings.listen);
    for device in &settings.devices {
        println!(
            "{:<15} {:<20} {} port(s)",
            device.ip,
            device.name,
            device.ports.len()
        );
    }
    Ok(())
}

fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path).with_context(|| format!("loading {}", path.display()))
}
