use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KinetixError, KinetixResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub duration_ms: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background: "#000000".to_string(),
            duration_ms: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub looping: bool,
    pub playback_rate: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            looping: true,
            playback_rate: 1.0,
        }
    }
}

/// How the export pipeline drives the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Play at wall-clock speed and capture what is on screen.
    Realtime,
    /// Seek frame by frame; output is independent of machine speed.
    #[default]
    Offline,
}

/// Container/codec of an exported video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Webm,
    Gif,
    Apng,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
            OutputFormat::Gif => "gif",
            OutputFormat::Apng => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Webm => "video/webm",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Apng => "image/apng",
        }
    }

    /// Guess the format from a file extension (`mp4`, `webm`, `gif`, `png`/`apng`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(OutputFormat::Mp4),
            "webm" => Some(OutputFormat::Webm),
            "gif" => Some(OutputFormat::Gif),
            "png" | "apng" => Some(OutputFormat::Apng),
            _ => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = KinetixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .ok_or_else(|| KinetixError::InvalidArgument(format!("unknown output format '{}'", s)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub fps: f64,
    pub mode: ExportMode,
    pub format: OutputFormat,
    /// Output resolution relative to the canvas (1.0 = original, 0.5 = data saver).
    pub quality_scale: f64,
    /// Frames allowed in flight to the encoder before capture blocks.
    pub initial_credits: u32,
    /// Pause after each frame hand-off in offline mode.
    pub frame_yield_ms: u64,
    pub keyframe_interval: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            mode: ExportMode::Offline,
            format: OutputFormat::Mp4,
            quality_scale: 1.0,
            initial_credits: 3,
            frame_yield_ms: 10,
            keyframe_interval: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FontEntry {
    pub family: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FontsConfig {
    pub fonts: Vec<FontEntry>,
    /// Look in the usual OS font directories when a family is not configured.
    pub search_system: bool,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            fonts: Vec::new(),
            search_system: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KinetixConfig {
    pub canvas: CanvasConfig,
    pub playback: PlaybackConfig,
    pub export: ExportConfig,
    pub fonts: FontsConfig,
}

impl KinetixConfig {
    pub fn load_from_file(path: &Path) -> KinetixResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| KinetixError::config(e.to_string(), path))
    }

    pub fn save_to_file(&self, path: &Path) -> KinetixResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| KinetixError::config(e.to_string(), path))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
