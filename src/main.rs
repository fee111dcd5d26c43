//! Deck Bridge - key-deck plugin backend
//!
//! Launched by the surface host with its WebSocket port and registration
//! token; talks to the DAW over a pair of MIDI ports.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deck_bridge::bridge::{BridgeActor, DawOutput, DisconnectedDaw, ProfileLibrary};
use deck_bridge::config::AppConfig;
use deck_bridge::daw::{self, MidiDawOutput};
use deck_bridge::engine::SyncEngine;
use deck_bridge::host::{self, HostOutput, HostTranslator, Registration};
use deck_bridge::paths::AppPaths;

/// Deck Bridge - sync a key deck with the DAW over MIDI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host WebSocket port
    #[arg(long)]
    port: Option<u16>,

    /// Registration token assigned by the host
    #[arg(long = "pluginUUID")]
    plugin_uuid: Option<String>,

    /// Name of the registration event
    #[arg(long = "registerEvent", default_value = "registerPlugin")]
    register_event: String,

    /// Host and device description (JSON)
    #[arg(long)]
    info: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write the log file as JSON lines
    #[arg(long)]
    log_json: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

/// The host passes long flags with a single dash (`-port 28196`)
fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let single_dash_long = i > 0 && arg.len() > 2 && arg.starts_with('-') && !arg.starts_with("--");
            if single_dash_long {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse_from(normalize_args(std::env::args()));

    let paths = AppPaths::detect(args.config.clone());
    let _log_guard = init_logging(&args.log_level, &paths, args.log_json)?;

    info!("Starting Deck Bridge v{}...", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration file: {} ({})",
        paths.config.display(),
        if paths.is_portable { "portable" } else { "installed" }
    );

    let config = AppConfig::load_or_default(&paths.config).await?;

    if args.list_ports {
        return daw::list_ports(&config.midi.input_port, &config.midi.output_port);
    }

    let registration = Registration {
        port: args.port.context("missing -port")?,
        plugin_uuid: args.plugin_uuid.context("missing -pluginUUID")?,
        register_event: args.register_event,
    };
    if let Some(info) = &args.info {
        debug!("Host info: {}", info);
    }

    let profiles = ProfileLibrary::load_or_empty(&paths.profiles()).await;

    run_app(config, profiles, registration).await?;

    info!("Deck Bridge shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, profiles: ProfileLibrary, registration: Registration) -> Result<()> {
    let daw_output: Box<dyn DawOutput> = match MidiDawOutput::connect(&config.midi.output_port) {
        Ok(output) => Box::new(output),
        Err(e) => {
            warn!("⚠️  DAW output unavailable, commands will be dropped: {:#}", e);
            Box::new(DisconnectedDaw)
        }
    };

    let (host_output, outgoing) = HostOutput::channel();
    let engine = SyncEngine::new(config.engine_config());
    let (bridge, actor_task) = BridgeActor::spawn(
        engine,
        daw_output,
        Arc::new(host_output),
        Box::new(profiles),
    );

    // Kept alive for the lifetime of the app; dropping closes the port
    let _daw_input = match daw::connect_input(&config.midi.input_port, config.surface.clone(), bridge.clone()) {
        Ok(input) => {
            info!("✅ Listening to DAW on {}", input.port_name);
            Some(input)
        }
        Err(e) => {
            warn!("⚠️  DAW input unavailable, no feedback will arrive: {:#}", e);
            None
        }
    };

    let translator = HostTranslator::new(config.host.clone(), config.surface.clone());
    let host_loop = host::run(registration, translator, bridge.clone(), outgoing);

    let result = tokio::select! {
        result = host_loop => result,
        _ = shutdown_signal() => Ok(()),
    };

    info!("Shutting down...");
    bridge.shutdown();
    if let Err(e) = actor_task.await {
        warn!("Bridge actor ended abnormally: {}", e);
    }

    result
}

fn init_logging(level: &str, paths: &AppPaths, json: bool) -> Result<WorkerGuard> {
    paths.ensure_directories()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, "deck-bridge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer.clone())
        }))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer.clone())
        }))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
