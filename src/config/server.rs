// src/config/server.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::aggregate::FanOutSettings;

pub const ENV_CONFIG_PATH: &str = "NUMBERS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/numbers.toml";

const ENV_ADDR: &str = "NUMBERS_ADDR";
const ENV_DEADLINE_MS: &str = "NUMBERS_DEADLINE_MS";
const ENV_WORKERS: &str = "NUMBERS_WORKERS";
const ENV_ATTEMPT_TIMEOUT_MS: &str = "NUMBERS_ATTEMPT_TIMEOUT_MS";
const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_deadline_ms() -> u64 {
    // leaves ~50ms of a 500ms budget for sorting and encoding
    450
}
fn default_workers() -> usize {
    200
}
fn default_attempt_timeout_ms() -> u64 {
    450
}

/// Process-wide settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Total budget per request, measured from the start of handling.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Fixed worker-pool size; also the idle connection pool per host.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-attempt network timeout (connect + whole request).
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default)]
    pub debug_routes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            deadline_ms: default_deadline_ms(),
            workers: default_workers(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            debug_routes: false,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (if any), then env overrides.
    /// 1) $NUMBERS_CONFIG_PATH (must exist)
    /// 2) config/numbers.toml
    pub fn load() -> Result<Self> {
        let mut cfg = match config_path()? {
            Some(p) => Self::load_from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        Ok(cfg.sanitized())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var(ENV_ADDR) {
            if !v.trim().is_empty() {
                self.listen_addr = v.trim().to_string();
            }
        }
        if let Some(v) = parse_env::<u64>(ENV_DEADLINE_MS)? {
            self.deadline_ms = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_WORKERS)? {
            self.workers = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_ATTEMPT_TIMEOUT_MS)? {
            self.attempt_timeout_ms = v;
        }
        if let Ok(v) = env::var(ENV_DEBUG_ROUTES) {
            self.debug_routes = matches!(v.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Zero values fall back to defaults; an attempt may not outlive the request.
    pub fn sanitized(mut self) -> Self {
        if self.deadline_ms == 0 {
            self.deadline_ms = default_deadline_ms();
        }
        if self.workers == 0 {
            self.workers = default_workers();
        }
        if self.attempt_timeout_ms == 0 {
            self.attempt_timeout_ms = default_attempt_timeout_ms();
        }
        self.attempt_timeout_ms = self.attempt_timeout_ms.min(self.deadline_ms);
        self
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn fan_out(&self) -> FanOutSettings {
        FanOutSettings {
            deadline: self.deadline(),
            workers: self.workers,
        }
    }
}

fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(fallback.exists().then_some(fallback))
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        _ => Ok(None),
    }
}
