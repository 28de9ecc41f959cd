//! Host configuration (`config.toml`).
//!
//! Every section uses `#[serde(default)]`, so a partial file only overrides what it
//! names. Directories default to `<data_dir>/retrohost/<kind>`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub paths: PathConfig,
    pub user: UserConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub input: InputConfig,
    pub session: SessionConfig,
}

/// Directories served to cores and used for host files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// `GET_SYSTEM_DIRECTORY` (BIOS files).
    pub system: PathBuf,
    /// `GET_SAVE_DIRECTORY` and battery saves (`<saves>/<core>/<game>.srm`).
    pub saves: PathBuf,
    /// Save states and their screenshots.
    pub states: PathBuf,
    /// Core option files.
    pub options: PathBuf,
    /// `GET_CORE_ASSETS_DIRECTORY`.
    pub core_assets: PathBuf,
    /// `GET_PLAYLIST_DIRECTORY`.
    pub playlists: PathBuf,
    /// When set, cores are copied here before loading.
    pub scratch: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub username: String,
    /// `retro_language` value reported by `GET_LANGUAGE`.
    pub language: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub enabled: bool,
    pub overscan: bool,
    /// Reported by `GET_TARGET_REFRESH_RATE`.
    pub target_refresh_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub max_users: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Snapshots kept for rewind; 0 disables rewind.
    pub rewind_capacity: usize,
    /// Frames between rewind snapshots.
    pub rewind_interval: u32,
    /// Write a PNG next to each save state.
    pub screenshot_on_save: bool,
    /// Load and write `.srm` battery saves automatically.
    pub autosave_sram: bool,
    /// Reported by `GET_JIT_CAPABLE`.
    pub jit_capable: bool,
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("retrohost")
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = data_root();
        Self {
            system: base.join("system"),
            saves: base.join("saves"),
            states: base.join("states"),
            options: base.join("options"),
            core_assets: base.join("assets"),
            playlists: base.join("playlists"),
            scratch: None,
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: "retrohost".to_string(),
            language: 0,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overscan: false,
            target_refresh_rate: 60.0,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_users: crate::input::DEFAULT_MAX_USERS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rewind_capacity: 0,
            rewind_interval: 1,
            screenshot_on_save: true,
            autosave_sram: true,
            jit_capable: false,
        }
    }
}

impl HostConfig {
    /// Default location: `<config_dir>/retrohost/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retrohost")
            .join("config.toml")
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io)
    }

    /// Save state path for `slot`: `<states>/<core>/<game>.state<slot>`.
    pub fn state_path(&self, core: &str, game: &str, slot: u32) -> PathBuf {
        self.paths
            .states
            .join(core)
            .join(format!("{game}.state{slot}"))
    }

    /// Battery save path: `<saves>/<core>/<game>.srm`.
    pub fn sram_path(&self, core: &str, game: &str) -> PathBuf {
        self.paths.saves.join(core).join(format!("{game}.srm"))
    }

    /// Point every directory below `root`; handy for tests and portable installs.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.paths = PathConfig {
            system: root.join("system"),
            saves: root.join("saves"),
            states: root.join("states"),
            options: root.join("options"),
            core_assets: root.join("assets"),
            playlists: root.join("playlists"),
            scratch: None,
        };
        config
    }
}
