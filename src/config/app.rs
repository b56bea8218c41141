// src/config/app.rs
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

pub const ENV_CONFIG_PATH: &str = "STATS_CONFIG_PATH";
pub const ENV_DEBUG_ROUTES: &str = "STATS_DEBUG_ROUTES";
pub const ENV_METRICS: &str = "STATS_METRICS";
pub const ENV_CORS: &str = "STATS_CORS";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mount `/debug/window`.
    #[serde(default)]
    pub debug_routes: bool,
    /// Install the Prometheus recorder and mount `/metrics`.
    #[serde(default)]
    pub metrics_enabled: bool,
    /// Permissive CORS for browser dashboards.
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug_routes: false,
            metrics_enabled: false,
            cors_permissive: true,
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults, then the TOML file, then env overrides:
    /// 1) $STATS_CONFIG_PATH (must exist)
    /// 2) config/app.toml (optional)
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
                }
                Self::load_from_file(&pb)?
            }
            Err(_) => {
                let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
                if pb.exists() {
                    Self::load_from_file(&pb)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_flag(ENV_DEBUG_ROUTES) {
            self.debug_routes = v;
        }
        if let Some(v) = env_flag(ENV_METRICS) {
            self.metrics_enabled = v;
        }
        if let Some(v) = env_flag(ENV_CORS) {
            self.cors_permissive = v;
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    let parsed = parse_flag(&raw);
    if parsed.is_none() {
        warn!(var = name, value = %raw, "ignoring unrecognised boolean env value");
    }
    parsed
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
