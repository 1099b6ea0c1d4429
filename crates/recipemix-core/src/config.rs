use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    balance::BalanceOptions,
    compile::CompileSettings,
    effects::{WavePreset, builtin_wave_presets},
};

pub const CONFIG_PATH_ENV: &str = "RECIPEMIX_CONFIG_PATH";
pub const CONFIG_FILE_NAME: &str = "recipemix.config.toml";
pub const DEFAULT_LOG_FILTER: &str = "info,recipemix_core=debug";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixConfig {
    pub content: ContentConfig,
    pub balance: BalanceOptions,
    pub output: OutputConfig,
    pub export: ExportConfig,
    pub diagnostics: DiagnosticsConfig,
    /// Extra wave presets; entries override the built-in ones by name.
    pub wave_presets: BTreeMap<String, WavePreset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentConfig {
    pub content_dir: PathBuf,
    pub mix_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub codec: String,
    pub bitrate: String,
    pub channels: u32,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    pub ffmpeg_binary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            mix_dir: PathBuf::from("mixes"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "mp3".to_string(),
            codec: "libmp3lame".to_string(),
            bitrate: "128k".to_string(),
            channels: 2,
            sample_rate: 44_100,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: DEFAULT_LOG_FILTER.to_string(),
            trace_file_prefix: "recipemix".to_string(),
        }
    }
}

impl MixConfig {
    /// Loads the discovered config file, failing when none exists.
    pub fn load() -> Result<Self> {
        let config_path = discover_config_path().with_context(|| {
            format!("failed to locate {CONFIG_FILE_NAME}; looked in cwd and parent directory")
        })?;
        Self::load_from(&config_path)
    }

    /// Like [`MixConfig::load`], but falls back to defaults when no file is
    /// found. A file that exists and fails to parse is still an error.
    pub fn load_or_default() -> Result<Self> {
        match discover_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => {
                debug!("no config file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;

        let config: MixConfig = toml::from_str(&content).with_context(|| {
            format!("failed to parse config TOML from {}", config_path.display())
        })?;
        info!(path = %config_path.display(), "config loaded");
        Ok(config)
    }

    /// Built-in presets merged with the configured ones.
    #[must_use]
    pub fn wave_presets(&self) -> BTreeMap<String, WavePreset> {
        let mut presets = builtin_wave_presets();
        presets.extend(
            self.wave_presets
                .iter()
                .map(|(name, preset)| (name.to_ascii_lowercase(), preset.clone())),
        );
        presets
    }

    #[must_use]
    pub fn compile_settings(&self) -> CompileSettings {
        CompileSettings {
            content_dir: self.content.content_dir.clone(),
            wave_presets: self.wave_presets(),
        }
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    let cwd = env::current_dir().context("failed to resolve current directory")?;
    let candidates = [
        cwd.join(CONFIG_FILE_NAME),
        cwd.join("..").join(CONFIG_FILE_NAME),
    ];

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow::anyhow!("{CONFIG_FILE_NAME} not found"))
}
