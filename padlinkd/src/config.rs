//! Daemon configuration.
//!
//! Layered: built-in defaults, then `config.json` in the data directory (if
//! present), then environment variables. Each setting has a `PADLINK_*`
//! variable; the older `DISCORD_*` and `ROM_*` names are accepted as fallbacks.

use crate::paths::AppPaths;
use padlink::input::DrainPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 240;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("no program configured; set PADLINK_ROM_FILE (or ROM_FILE)")]
    MissingRomFile,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Chat transport credential. Carried for the bridge; never logged.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default)]
    pub guild: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_rom_folder")]
    pub rom_folder: PathBuf,
    #[serde(default)]
    pub rom_file: Option<String>,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub queue_policy: DrainPolicy,
}

fn default_rom_folder() -> PathBuf {
    PathBuf::from(".")
}

fn default_listen() -> String {
    padlink::protocol::DEFAULT_ADDR.to_string()
}

fn default_fps() -> u32 {
    padlink::daemon::FPS
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            token: None,
            guild: None,
            channel: None,
            rom_folder: default_rom_folder(),
            rom_file: None,
            listen: default_listen(),
            fps: default_fps(),
            queue_policy: DrainPolicy::default(),
        }
    }
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("guild", &self.guild)
            .field("channel", &self.channel)
            .field("rom_folder", &self.rom_folder)
            .field("rom_file", &self.rom_file)
            .field("listen", &self.listen)
            .field("fps", &self.fps)
            .field("queue_policy", &self.queue_policy)
            .finish()
    }
}

impl DaemonConfig {
    /// Resolve configuration from the data directory and the process
    /// environment.
    pub fn load(paths: &AppPaths) -> Result<Self, ConfigError> {
        let mut cfg = Self::from_file_or_default(&paths.config_file())?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment values. `lookup` returns a variable's value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |primary: &str, legacy: Option<&str>| -> Option<String> {
            lookup(primary)
                .or_else(|| legacy.and_then(&lookup))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("PADLINK_TOKEN", Some("DISCORD_TOKEN")) {
            self.token = Some(v);
        }
        if let Some(v) = var("PADLINK_GUILD", Some("DISCORD_GUILD")) {
            self.guild = Some(v);
        }
        if let Some(v) = var("PADLINK_CHANNEL", Some("DISCORD_CHANNEL")) {
            self.channel = Some(v);
        }
        if let Some(v) = var("PADLINK_ROM_FOLDER", Some("ROM_FOLDER")) {
            self.rom_folder = PathBuf::from(v);
        }
        if let Some(v) = var("PADLINK_ROM_FILE", Some("ROM_FILE")) {
            self.rom_file = Some(v);
        }
        if let Some(v) = var("PADLINK_LISTEN", None) {
            self.listen = v;
        }
        if let Some(v) = var("PADLINK_FPS", None) {
            let fps: u32 = v.parse().map_err(|e| ConfigError::Invalid {
                key: "PADLINK_FPS",
                value: v.clone(),
                reason: format!("{e}"),
            })?;
            self.fps = fps;
        }
        if let Some(v) = var("PADLINK_QUEUE_POLICY", None) {
            self.queue_policy = DrainPolicy::parse(&v).ok_or_else(|| ConfigError::Invalid {
                key: "PADLINK_QUEUE_POLICY",
                value: v.clone(),
                reason: "expected fifo or lifo".to_string(),
            })?;
        }

        self.fps = self.fps.clamp(MIN_FPS, MAX_FPS);
        Ok(())
    }

    /// `rom_folder/rom_file`, the only thing the daemon core consumes.
    pub fn program_path(&self) -> Result<PathBuf, ConfigError> {
        let file = self
            .rom_file
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or(ConfigError::MissingRomFile)?;
        Ok(self.rom_folder.join(file))
    }
}
