use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::media::types::OutputFormat;

pub const DEFAULT_FPS: u32 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Image,
    Video,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Fit,
    CenterCrop,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// Seek to each sample position and decode the closest frame.
    #[default]
    FastSeek,
    /// Continuous demux/decode, looping at end of stream.
    StreamDecode,
}

/// Which camera API surfaces get substituted frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiPriority {
    #[default]
    Auto,
    Legacy,
    Session,
    Analysis,
}

/// `"auto"` reads orientation from image metadata; a number of degrees fixes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OrientationRepr", into = "OrientationRepr")]
pub enum OrientationPolicy {
    #[default]
    Auto,
    Fixed(u16),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OrientationRepr {
    Degrees(u16),
    Name(String),
}

impl TryFrom<OrientationRepr> for OrientationPolicy {
    type Error = String;

    fn try_from(repr: OrientationRepr) -> Result<Self, Self::Error> {
        match repr {
            OrientationRepr::Degrees(d) if d % 90 == 0 => Ok(OrientationPolicy::Fixed(d % 360)),
            OrientationRepr::Degrees(d) => Err(format!("orientation {} is not a multiple of 90", d)),
            OrientationRepr::Name(name) => match name.trim().to_ascii_lowercase().as_str() {
                "auto" => Ok(OrientationPolicy::Auto),
                other => other
                    .parse::<u16>()
                    .map_err(|_| format!("unknown orientation {:?}", name))
                    .and_then(|d| OrientationRepr::Degrees(d).try_into()),
            },
        }
    }
}

impl From<OrientationPolicy> for OrientationRepr {
    fn from(policy: OrientationPolicy) -> Self {
        match policy {
            OrientationPolicy::Auto => OrientationRepr::Name("auto".to_string()),
            OrientationPolicy::Fixed(d) => OrientationRepr::Degrees(d),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    pub source_kind: SourceKind,
    pub source_locator: Option<String>,
    /// Tried when `source_locator` cannot be opened.
    pub proxy_locator: Option<String>,
    pub scale_mode: ScaleMode,
    /// 0 keeps the requested width.
    pub manual_width: u32,
    /// 0 keeps the requested height.
    pub manual_height: u32,
    pub fps: u32,
    pub orientation: OrientationPolicy,
    pub mirror: bool,
    pub output_format: OutputFormat,
    pub decode_strategy: DecodeStrategy,
    pub api_priority: ApiPriority,
    /// Paint preview surfaces for the session and analysis APIs.
    pub inject_preview: bool,
    pub hardware_decode: bool,
    pub verbose: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_kind: SourceKind::default(),
            source_locator: None,
            proxy_locator: None,
            scale_mode: ScaleMode::default(),
            manual_width: 0,
            manual_height: 0,
            fps: DEFAULT_FPS,
            orientation: OrientationPolicy::default(),
            mirror: false,
            output_format: OutputFormat::default(),
            decode_strategy: DecodeStrategy::default(),
            api_priority: ApiPriority::default(),
            inject_preview: false,
            hardware_decode: false,
            verbose: false,
        }
    }
}

/// The part of a config that decides which source is loaded and how it is
/// pre-processed. Frame rate and output format are deliberately absent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceSignature {
    pub kind: SourceKind,
    pub locator: String,
    pub scale_mode: ScaleMode,
    pub orientation: OrientationPolicy,
    pub mirror: bool,
    pub strategy: DecodeStrategy,
}

impl SourceConfig {
    /// `None` when substitution is off or no source is configured.
    pub fn signature(&self) -> Option<SourceSignature> {
        if !self.enabled {
            return None;
        }
        let locator = self.source_locator.as_deref()?.trim();
        if locator.is_empty() {
            return None;
        }
        Some(SourceSignature {
            kind: self.source_kind,
            locator: locator.to_string(),
            scale_mode: self.scale_mode,
            orientation: self.orientation,
            mirror: self.mirror,
            strategy: self.decode_strategy,
        })
    }

    pub fn is_equivalent(&self, other: &SourceConfig) -> bool {
        self.signature() == other.signature()
    }
}

/// Source of the current configuration. Read on demand; implementations
/// decide how fresh the value is.
pub trait SettingsStore: Send + Sync {
    fn read(&self) -> SourceConfig;
}

/// Settings kept in a JSON file and re-read on every call.
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<SourceConfig> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse {}", self.path.display()))
    }

    pub fn write(&self, config: &SourceConfig) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, text).with_context(|| format!("write {}", self.path.display()))
    }
}

impl SettingsStore for JsonSettingsStore {
    fn read(&self) -> SourceConfig {
        if !self.path.exists() {
            log::debug!("{} not found, using defaults", self.path.display());
            return SourceConfig::default();
        }
        self.load().unwrap_or_else(|e| {
            log::warn!("settings unreadable, using defaults: {:#}", e);
            SourceConfig::default()
        })
    }
}

/// In-memory settings.
#[derive(Default)]
pub struct StaticSettings {
    config: RwLock<SourceConfig>,
}

impl StaticSettings {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn set(&self, config: SourceConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn update(&self, f: impl FnOnce(&mut SourceConfig)) {
        f(&mut self.config.write().unwrap_or_else(|e| e.into_inner()));
    }
}

impl SettingsStore for StaticSettings {
    fn read(&self) -> SourceConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
