// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the auth-sidecar project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the authentication and access-control sidecar.
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use auth_sidecar::config::Config;
use auth_sidecar::server::{build_rocket, AppState};

/// Authentication and access-control sidecar for reverse proxies.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file (YAML format)
    #[arg(short, long, env = "AUTH_SIDECAR_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Minimum log level (error, warn, info, debug, trace)
    #[arg(long, env = "AUTH_SIDECAR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory of static frontend assets to serve alongside the API
    /// (template rendering itself is out of scope; this only sets where a
    /// reverse proxy or external renderer would look).
    #[arg(long, env = "AUTH_SIDECAR_FRONTEND_DIR")]
    frontend_dir: Option<PathBuf>,
}

#[rocket::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("auth-sidecar: fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", &args.log_level);
    }
    env_logger::init();

    if let Some(dir) = &args.frontend_dir {
        info!("serving static frontend assets from {}", dir.display());
    }

    let config = Config::from_file(&args.config)?;
    let listen = config.listen.clone();
    let state = AppState::new(&config)?;

    spawn_reload_task(state.clone(), args.config.clone());

    let rocket = build_rocket(state)?
        .configure(rocket::Config {
            address: listen.addr.parse()?,
            port: listen.port,
            ..rocket::Config::default()
        });

    rocket.launch().await?;
    Ok(())
}

/// On Unix, reload the configuration on SIGHUP: a refused reload (e.g. it
/// would leave zero active authenticators) is logged and the previous state
/// is kept in place untouched (§4.4).
#[cfg(unix)]
fn spawn_reload_task(state: Arc<AppState>, config_path: PathBuf) {
    tokio::spawn(async move {
        let mut stream = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("could not install SIGHUP handler: {err}");
                return;
            }
        };

        loop {
            stream.recv().await;
            info!("SIGHUP received, reloading configuration from {}", config_path.display());
            match Config::from_file(&config_path) {
                Ok(config) => match state.reload(&config) {
                    Ok(()) => info!("configuration reloaded"),
                    Err(err) => error!("configuration reload refused, keeping previous state: {err}"),
                },
                Err(err) => error!("failed to read configuration for reload: {err}"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_task(_state: Arc<AppState>, _config_path: PathBuf) {
    warn!("configuration reload on signal is only supported on unix; restart the process to reload");
}
