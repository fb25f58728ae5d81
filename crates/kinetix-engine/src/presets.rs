//! Canvas size presets used by the canvas-settings editor.

use serde::{Deserialize, Serialize};

/// Timeline lengths offered as one-click presets, in seconds.
pub const DURATION_PRESETS_SECS: [u32; 5] = [5, 10, 15, 30, 60];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "21:9")]
    Ultrawide,
    #[serde(rename = "4:5")]
    Social,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 7] = [
        AspectRatio::Widescreen,
        AspectRatio::Vertical,
        AspectRatio::Square,
        AspectRatio::Standard,
        AspectRatio::Portrait,
        AspectRatio::Ultrawide,
        AspectRatio::Social,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Standard => "4:3",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Ultrawide => "21:9",
            AspectRatio::Social => "4:5",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            AspectRatio::Widescreen => 16.0 / 9.0,
            AspectRatio::Vertical => 9.0 / 16.0,
            AspectRatio::Square => 1.0,
            AspectRatio::Standard => 4.0 / 3.0,
            AspectRatio::Portrait => 3.0 / 4.0,
            AspectRatio::Ultrawide => 21.0 / 9.0,
            AspectRatio::Social => 4.0 / 5.0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label() == label)
    }

    /// Whether a `width`×`height` canvas already has (roughly) this ratio.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        height > 0 && (width as f64 / height as f64 - self.value()).abs() < 0.05
    }

    /// New canvas size with this ratio, keeping the current short edge
    /// (snapped to 720, 1080 or 2160 when close).
    pub fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        let base = snap_short_edge(width.min(height) as f64);
        let ratio = self.value();
        if ratio >= 1.0 {
            ((base * ratio).round() as u32, base as u32)
        } else {
            (base as u32, (base / ratio).round() as u32)
        }
    }
}

fn snap_short_edge(edge: f64) -> f64 {
    let mut base = edge;
    if (base - 1080.0).abs() < 50.0 {
        base = 1080.0;
    }
    if (base - 720.0).abs() < 50.0 {
        base = 720.0;
    }
    if (base - 2160.0).abs() < 100.0 {
        base = 2160.0;
    }
    base
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPreset {
    #[serde(rename = "480p")]
    Sd,
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
    #[serde(rename = "4K")]
    Uhd,
}

impl ResolutionPreset {
    pub const ALL: [ResolutionPreset; 4] = [
        ResolutionPreset::Sd,
        ResolutionPreset::Hd,
        ResolutionPreset::FullHd,
        ResolutionPreset::Uhd,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionPreset::Sd => "480p",
            ResolutionPreset::Hd => "720p",
            ResolutionPreset::FullHd => "1080p",
            ResolutionPreset::Uhd => "4K",
        }
    }

    /// Length of the short edge.
    pub fn base(&self) -> u32 {
        match self {
            ResolutionPreset::Sd => 480,
            ResolutionPreset::Hd => 720,
            ResolutionPreset::FullHd => 1080,
            ResolutionPreset::Uhd => 2160,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label().eq_ignore_ascii_case(label))
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        (width.min(height) as i64 - self.base() as i64).abs() < 10
    }

    /// New canvas size at this resolution, keeping the current ratio.
    pub fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        let base = self.base() as f64;
        if height == 0 || width == 0 {
            return ((base * 16.0 / 9.0).round() as u32, base as u32);
        }
        let ratio = width as f64 / height as f64;
        if ratio >= 1.0 {
            ((base * ratio).round() as u32, base as u32)
        } else {
            (base as u32, (base / ratio).round() as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_keeps_short_edge() {
        assert_eq!(AspectRatio::Vertical.apply(1920, 1080), (1080, 1920));
        assert_eq!(AspectRatio::Square.apply(1920, 1080), (1080, 1080));
        assert_eq!(AspectRatio::Ultrawide.apply(1280, 720), (1680, 720));
        assert_eq!(AspectRatio::Social.apply(1080, 1080), (1080, 1350));
    }

    #[test]
    fn test_ratio_snaps_near_standard_edges() {
        assert_eq!(AspectRatio::Widescreen.apply(1100, 1100), (1920, 1080));
        assert_eq!(AspectRatio::Widescreen.apply(2100, 2100), (3840, 2160));
        assert_eq!(AspectRatio::Square.apply(500, 500), (500, 500));
    }

    #[test]
    fn test_resolution_keeps_ratio() {
        assert_eq!(ResolutionPreset::Hd.apply(1920, 1080), (1280, 720));
        assert_eq!(ResolutionPreset::Uhd.apply(1080, 1920), (2160, 3840));
        assert_eq!(ResolutionPreset::Sd.apply(1000, 1000), (480, 480));
    }

    #[test]
    fn test_matching_and_labels() {
        assert!(AspectRatio::Widescreen.matches(1920, 1080));
        assert!(!AspectRatio::Square.matches(1920, 1080));
        assert!(ResolutionPreset::FullHd.matches(1080, 1920));
        assert_eq!(AspectRatio::from_label("4:5"), Some(AspectRatio::Social));
        assert_eq!(ResolutionPreset::from_label("4k"), Some(ResolutionPreset::Uhd));
        assert_eq!(
            serde_json::to_string(&ResolutionPreset::FullHd).unwrap(),
            "\"1080p\""
        );
    }
}
