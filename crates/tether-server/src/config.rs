// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Server configuration loaded from YAML.
//!
//! Configuration is YAML. Layers are **deep-merged** — each file only needs
//! the fields it overrides.
//!
//! Search order (later overrides earlier):
//! 1. `/etc/tether/server.yaml`
//! 2. `~/.config/tether/server.yaml`
//! 3. `.tether/server.yaml` (workspace-local)
//! 4. Path given to [`load`] explicitly.
//!
//! Defaults are safe: loopback bind, built-in echo engine, 1 MiB body cap.
//!
//! # Example full config
//! ```yaml
//! http:
//!   bind: "127.0.0.1:8787"
//!   cors_allow_any: true
//!
//! engine:
//!   kind: process
//!   command: ["my-agent", "--output-format", "stream-json"]
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_body() -> usize {
    1024 * 1024
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// `host:port` to listen on. Default: `127.0.0.1:8787` (loopback only).
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Answer CORS preflights permissively so a browser UI served from a
    /// different origin can talk to the adapter. On by default; turn off when
    /// the UI is served from this same origin.
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,

    /// Maximum request body size in bytes (default: 1 MiB).
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_allow_any: true,
            max_body_bytes: default_max_body(),
        }
    }
}

/// Which engine backend sessions run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Built-in echo engine; no external dependencies. For wiring tests.
    Echo,
    /// External NDJSON-speaking process (see `engine.command`).
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_kind")]
    pub kind: EngineKind,

    /// Program and arguments for `kind: process`.
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_engine_kind() -> EngineKind {
    EngineKind::Echo
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            command: Vec::new(),
        }
    }
}

// ── Loader ────────────────────────────────────────────────────────────────────

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.push(PathBuf::from("/etc/tether/server.yaml"));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/tether/server.yaml"));
    }
    paths.push(PathBuf::from(".tether/server.yaml"));
    paths
}

pub fn load(extra: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_file(&mut merged, &path)?;
        }
    }
    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_file(&mut merged, p)?;
    }

    let config: ServerConfig = if matches!(&merged, serde_yaml::Value::Mapping(m) if m.is_empty())
    {
        ServerConfig::default()
    } else {
        serde_yaml::from_value(merged).context("interpreting merged config")?
    };
    Ok(config)
}

fn merge_file(merged: &mut serde_yaml::Value, path: &Path) -> anyhow::Result<()> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let layer: serde_yaml::Value =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    merge_yaml(merged, layer);
    Ok(())
}

fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
