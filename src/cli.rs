// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tether",
    version,
    about = "Streaming adapter between an agent engine and a chat UI"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). TETHER_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Explicit config file, merged over the default search-path layers.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP/SSE server (the default when no subcommand is given).
    Serve {
        /// Override `http.bind` from the config, e.g. `127.0.0.1:9000`.
        #[arg(long)]
        bind: Option<String>,

        /// Engine program + arguments; implies `engine.kind: process`.
        #[arg(long = "engine-cmd", num_args = 1.., value_name = "CMD")]
        engine_cmd: Vec<String>,
    },

    /// Print the effective configuration as YAML and exit.
    ShowConfig,
}
