// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use tether_engine::{EchoEngine, Engine, ProcessEngine};
use tether_server::{EngineConfig, EngineKind, ServerConfig};
use tether_session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = tether_server::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve {
        bind: None,
        engine_cmd: Vec::new(),
    }) {
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Commands::Serve { bind, engine_cmd } => {
            if let Some(bind) = bind {
                config.http.bind = bind;
            }
            if !engine_cmd.is_empty() {
                config.engine = EngineConfig {
                    kind: EngineKind::Process,
                    command: engine_cmd,
                };
            }
            run_server(config).await
        }
    }
}

async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let engine = build_engine(&config.engine)?;
    let manager = Arc::new(SessionManager::new(engine));
    tether_server::serve(config, manager).await
}

fn build_engine(config: &EngineConfig) -> anyhow::Result<Arc<dyn Engine>> {
    match config.kind {
        EngineKind::Echo => {
            info!("using built-in echo engine");
            Ok(Arc::new(EchoEngine))
        }
        EngineKind::Process => {
            anyhow::ensure!(
                !config.command.is_empty(),
                "engine.kind is 'process' but engine.command is empty"
            );
            info!(command = ?config.command, "using process engine");
            Ok(Arc::new(ProcessEngine::new(config.command.clone())))
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("TETHER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
