use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReelError, ReelResult};

/// File name searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "reel.config.toml";

/// Export defaults, overridden per job by CLI flags.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
    pub keyframe_interval: u32,
    /// Settle wait after each seek, in milliseconds.
    pub settle_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            bitrate: 8_000_000,
            keyframe_interval: 30,
            settle_ms: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Extra directories searched for font files before the system ones.
    pub font_dirs: Vec<PathBuf>,
    /// Family used when a text layer names one that cannot be found.
    pub default_font_family: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_dirs: Vec::new(),
            default_font_family: "Inter".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg_path: PathBuf,
    /// libx264 `-preset` value.
    pub preset: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            preset: "medium".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct ReelConfig {
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl ReelConfig {
    pub fn from_toml_str(contents: &str) -> ReelResult<Self> {
        toml::from_str(contents).map_err(|e| ReelError::Config(e.to_string()))
    }

    pub fn load_from_file(path: &Path) -> ReelResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load `reel.config.toml` from `dir` if present, defaults otherwise.
    /// A file that exists but fails to parse is an error.
    pub fn discover(dir: &Path) -> ReelResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
