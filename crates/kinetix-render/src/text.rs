//! Text rendering module.
//! Uses fontdue for CPU-based font rasterization.
//!
//! Fonts come from the configuration or from the usual system font
//! directories. When no font can be found at all, text is laid out with
//! block glyphs (0.6 em advance) so measurement, hit-testing and layout stay
//! well defined on headless machines.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use fontdue::{Font, FontSettings};
use kinetix_core::config::FontsConfig;
use kinetix_core::frame::FrameBuffer;
use kinetix_core::{Color, KinetixError, KinetixResult, PixelFormat};
use serde::{Deserialize, Serialize};

/// Line advance relative to the font size.
pub const LINE_HEIGHT: f32 = 1.2;

/// Largest text block, in pixels, that is ever rasterized in one piece.
pub const MAX_RASTER_PIXELS: u64 = 1 << 24;

/// Advance of a fallback block glyph, in em.
const FALLBACK_ADVANCE: f32 = 0.6;

/// Well-known locations of a sans-serif font on common systems.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const SYSTEM_MONO_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Courier New.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
];

static SYSTEM_RENDERER: OnceLock<Arc<TextRenderer>> = OnceLock::new();

/// Text horizontal alignment options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Measured extent of a (possibly multi-line) text block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Width of the widest line.
    pub width: f64,
    /// `font_size` for one line plus one line advance per extra line.
    pub height: f64,
    pub line_count: usize,
}

/// Text renderer: rasterizes text to a FrameBuffer.
pub struct TextRenderer {
    font_cache: HashMap<String, Font>,
    default_family: Option<String>,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("families", &self.font_cache.keys().collect::<Vec<_>>())
            .field("default_family", &self.default_family)
            .finish()
    }
}

impl TextRenderer {
    /// A renderer with no fonts; every glyph is a fallback block.
    pub fn new() -> Self {
        Self {
            font_cache: HashMap::new(),
            default_family: None,
        }
    }

    /// Process-wide renderer backed by whatever system fonts are installed.
    pub fn system() -> Arc<TextRenderer> {
        SYSTEM_RENDERER
            .get_or_init(|| Arc::new(Self::from_config(&FontsConfig::default())))
            .clone()
    }

    /// Build a renderer from configuration. Unreadable fonts are logged and skipped.
    pub fn from_config(config: &FontsConfig) -> Self {
        let mut renderer = Self::new();
        for entry in &config.fonts {
            if let Err(e) = renderer.load_font(&entry.family, &entry.path) {
                tracing::warn!("skipping font '{}': {}", entry.family, e);
            }
        }
        if config.search_system {
            renderer.load_system_family("sans-serif", SYSTEM_FONT_CANDIDATES);
            renderer.load_system_family("monospace", SYSTEM_MONO_CANDIDATES);
        }
        if renderer.font_cache.is_empty() {
            tracing::info!("no fonts available, text will use block glyphs");
        }
        renderer
    }

    fn load_system_family(&mut self, family: &str, candidates: &[&str]) {
        if self.font_cache.contains_key(family) {
            return;
        }
        for candidate in candidates {
            let path = Path::new(candidate);
            if path.exists() && self.load_font(family, path).is_ok() {
                tracing::debug!("using system font {} for {}", candidate, family);
                return;
            }
        }
    }

    /// Load a font from a file path.
    pub fn load_font(&mut self, family: &str, path: &Path) -> KinetixResult<()> {
        let data = std::fs::read(path)?;
        self.load_font_bytes(family, data)
    }

    /// Register a font from raw TTF/OTF bytes.
    pub fn load_font_bytes(&mut self, family: &str, data: Vec<u8>) -> KinetixResult<()> {
        let font = Font::from_bytes(data, FontSettings::default()).map_err(|e| {
            KinetixError::InvalidArgument(format!("failed to parse font {}: {}", family, e))
        })?;
        self.font_cache.insert(family.to_string(), font);
        if self.default_family.is_none() {
            self.default_family = Some(family.to_string());
        }
        Ok(())
    }

    /// Whether any real font is loaded.
    pub fn has_fonts(&self) -> bool {
        !self.font_cache.is_empty()
    }

    /// Resolve a family: exact, then case-insensitive, then a monospace
    /// request to the monospace face, then the default face.
    fn font(&self, family: &str) -> Option<&Font> {
        if let Some(font) = self.font_cache.get(family) {
            return Some(font);
        }
        let lower = family.to_ascii_lowercase();
        if let Some((_, font)) = self
            .font_cache
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == lower)
        {
            return Some(font);
        }
        if lower.contains("mono") || lower.contains("code") || lower.contains("courier") {
            if let Some(font) = self.font_cache.get("monospace") {
                return Some(font);
            }
        }
        self.default_family
            .as_ref()
            .and_then(|name| self.font_cache.get(name))
    }

    fn line_width(&self, font: Option<&Font>, line: &str, size: f32) -> f32 {
        match font {
            Some(font) => line
                .chars()
                .map(|ch| font.metrics(ch, size).advance_width)
                .sum(),
            None => line.chars().count() as f32 * size * FALLBACK_ADVANCE,
        }
    }

    fn ascent(&self, font: Option<&Font>, size: f32) -> f32 {
        font.and_then(|f| f.horizontal_line_metrics(size))
            .map(|m| m.ascent)
            .unwrap_or(size * 0.8)
    }

    /// Measure a text block. Lines are split on `\n`.
    pub fn measure(&self, text: &str, font_family: &str, font_size: f32) -> TextMetrics {
        if text.is_empty() || !(font_size > 0.0) || !font_size.is_finite() {
            return TextMetrics {
                width: 0.0,
                height: 0.0,
                line_count: 0,
            };
        }
        let font = self.font(font_family);
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|l| self.line_width(font, l, font_size))
            .fold(0.0f32, f32::max);
        let height = font_size + (lines.len() as f32 - 1.0) * font_size * LINE_HEIGHT;
        TextMetrics {
            width: width as f64,
            height: height as f64,
            line_count: lines.len(),
        }
    }

    /// Rasterize a text block into a buffer sized to its measured extent.
    ///
    /// Blocks larger than [`MAX_RASTER_PIXELS`] are refused with
    /// [`KinetixError::Render`] before anything is allocated.
    pub fn rasterize(
        &self,
        text: &str,
        font_family: &str,
        font_size: f32,
        color: &Color,
        align: TextAlign,
    ) -> KinetixResult<FrameBuffer> {
        let metrics = self.measure(text, font_family, font_size);
        if metrics.line_count == 0 || metrics.width <= 0.0 {
            return Ok(FrameBuffer::new(0, 0, PixelFormat::Rgba8));
        }
        check_raster_size(&metrics, MAX_RASTER_PIXELS)?;

        let font = self.font(font_family);
        let width = metrics.width.ceil() as u32;
        let height = (metrics.height.ceil() as u32).max(1);
        let mut fb = FrameBuffer::new(width, height, PixelFormat::Rgba8);
        let ascent = self.ascent(font, font_size);
        let rgba = color.to_rgba8();

        for (i, line) in text.split('\n').enumerate() {
            let line_w = self.line_width(font, line, font_size);
            let x_offset = match align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (metrics.width as f32 - line_w) / 2.0,
                TextAlign::Right => metrics.width as f32 - line_w,
            };
            let baseline = i as f32 * font_size * LINE_HEIGHT + ascent;
            match font {
                Some(font) => render_line(&mut fb, font, line, font_size, rgba, x_offset, baseline),
                None => render_block_line(&mut fb, line, font_size, rgba, x_offset, baseline),
            }
        }

        Ok(fb)
    }
}

/// Refuse a text block whose raster would cover more than `limit` pixels.
pub(crate) fn check_raster_size(metrics: &TextMetrics, limit: u64) -> KinetixResult<()> {
    let area = metrics.width.ceil() * metrics.height.ceil().max(1.0);
    if !area.is_finite() || area > limit as f64 {
        return Err(KinetixError::Render(format!(
            "text block of {:.0}x{:.0} px exceeds the {} px raster limit",
            metrics.width, metrics.height, limit
        )));
    }
    Ok(())
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a single line of glyphs with coverage-scaled alpha.
fn render_line(
    fb: &mut FrameBuffer,
    font: &Font,
    text: &str,
    font_size: f32,
    [r, g, b, a]: [u8; 4],
    x_offset: f32,
    baseline: f32,
) {
    let mut cursor_x = x_offset;

    for ch in text.chars() {
        let (metrics, bitmap) = font.rasterize(ch, font_size);
        let glyph_x = cursor_x.round() as i32 + metrics.xmin;
        let glyph_y = baseline.round() as i32 - (metrics.height as i32 + metrics.ymin);

        for gy in 0..metrics.height {
            for gx in 0..metrics.width {
                let coverage = bitmap[gy * metrics.width + gx];
                if coverage == 0 {
                    continue;
                }
                let px = glyph_x + gx as i32;
                let py = glyph_y + gy as i32;
                if px < 0 || py < 0 {
                    continue;
                }
                let alpha = (coverage as u32 * a as u32 / 255) as u8;
                fb.blend_pixel(px as u32, py as u32, [r, g, b, alpha]);
            }
        }

        cursor_x += metrics.advance_width;
    }
}

/// Fallback glyphs: a solid block per visible character.
fn render_block_line(
    fb: &mut FrameBuffer,
    text: &str,
    font_size: f32,
    rgba: [u8; 4],
    x_offset: f32,
    baseline: f32,
) {
    let advance = font_size * FALLBACK_ADVANCE;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let left = x_offset + i as f32 * advance + advance * 0.1;
        let right = left + advance * 0.8;
        let top = baseline - font_size * 0.7;
        for py in top.max(0.0).round() as u32..baseline.max(0.0).round() as u32 {
            for px in left.max(0.0).round() as u32..right.max(0.0).round() as u32 {
                fb.blend_pixel(px, py, rgba);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_measure_is_monospace() {
        let r = TextRenderer::new();
        let m = r.measure("abcd", "Inter", 10.0);
        assert!((m.width - 24.0).abs() < 1e-6);
        assert!((m.height - 10.0).abs() < 1e-6);
        assert_eq!(m.line_count, 1);
    }

    #[test]
    fn test_multiline_height() {
        let r = TextRenderer::new();
        let m = r.measure("ab\nabcdef\nc", "Inter", 20.0);
        assert_eq!(m.line_count, 3);
        assert!((m.width - 72.0).abs() < 1e-6);
        assert!((m.height - (20.0 + 2.0 * 24.0)).abs() < 1e-4);
    }

    #[test]
    fn test_empty_and_invalid_size_measure_zero() {
        let r = TextRenderer::new();
        assert_eq!(r.measure("", "Inter", 40.0).width, 0.0);
        assert_eq!(r.measure("hi", "Inter", f32::NAN).line_count, 0);
        assert_eq!(r.measure("hi", "Inter", -4.0).height, 0.0);
        let fb = r.rasterize("", "Inter", 40.0, &Color::WHITE, TextAlign::Left).unwrap();
        assert_eq!(fb.pixel_count(), 0);
    }

    #[test]
    fn test_fallback_rasterize_draws_blocks() {
        let r = TextRenderer::new();
        let fb = r.rasterize("A B", "Inter", 20.0, &Color::WHITE, TextAlign::Left).unwrap();
        assert_eq!(fb.width, 36);
        // first glyph block covers its middle
        assert_eq!(fb.get_pixel(6, 10).map(|p| p[3]), Some(255));
        // the space stays empty
        assert_eq!(fb.get_pixel(18, 10).map(|p| p[3]), Some(0));
    }

    #[test]
    fn test_rasterize_is_deterministic() {
        let r = TextRenderer::system();
        let a = r.rasterize("Kinetix", "Inter", 32.0, &Color::WHITE, TextAlign::Center).unwrap();
        let b = r.rasterize("Kinetix", "Inter", 32.0, &Color::WHITE, TextAlign::Center).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_huge_text_is_refused_without_allocating() {
        let r = TextRenderer::new();
        let err = r
            .rasterize("Hello World", "Inter", 200_000.0, &Color::WHITE, TextAlign::Left)
            .unwrap_err();
        assert!(matches!(err, KinetixError::Render(_)), "got {err}");
    }
}
