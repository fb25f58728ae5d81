//! Software 2D drawing context.
//!
//! Every primitive is rasterized by walking the device-space bounding box of
//! the shape, mapping each pixel centre back through the inverse of the
//! current transform and testing it against the shape in local space. This
//! keeps rotation and scale around arbitrary pivots exact, and makes output a
//! pure function of the draw calls.

use std::f64::consts::TAU;
use std::sync::Arc;

use kinetix_core::frame::FrameBuffer;
use kinetix_core::{Affine, Color, KinetixResult, PixelFormat, Point2D, Rect};

use crate::text::{check_raster_size, TextAlign, TextMetrics, TextRenderer, MAX_RASTER_PIXELS};

/// A text block may cover at most this many canvases' worth of pixels.
const TEXT_AREA_PER_CANVAS: u64 = 4;

/// Raster allowance for text on very small canvases.
const MIN_TEXT_AREA: u64 = 1 << 20;

/// Font parameters for [`Canvas::fill_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub color: Color,
    pub align: TextAlign,
}

impl TextStyle {
    pub fn new(font_family: impl Into<String>, font_size: f64, color: Color) -> Self {
        Self {
            font_family: font_family.into(),
            font_size,
            color,
            align: TextAlign::Left,
        }
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }
}

#[derive(Debug, Clone)]
struct DrawState {
    transform: Affine,
    alpha: f64,
    /// Clip rects as (device -> local inverse transform, local rect).
    clips: Vec<(Affine, Rect)>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            clips: Vec::new(),
        }
    }
}

/// The drawing surface owned by the engine.
pub struct Canvas {
    frame: FrameBuffer,
    text: Arc<TextRenderer>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.frame.width)
            .field("height", &self.frame.height)
            .field("depth", &self.stack.len())
            .finish()
    }
}

impl Canvas {
    /// A transparent canvas using the system font set.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_text_renderer(width, height, TextRenderer::system())
    }

    pub fn with_text_renderer(width: u32, height: u32, text: Arc<TextRenderer>) -> Self {
        Self {
            frame: FrameBuffer::new(width, height, PixelFormat::Rgba8),
            text,
            state: DrawState::default(),
            stack: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    /// Reallocate the backing store. Contents are cleared and state reset.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame = FrameBuffer::new(width, height, PixelFormat::Rgba8);
        self.reset_state();
    }

    /// The current pixels.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Owned copy of the current pixels.
    pub fn snapshot(&self) -> FrameBuffer {
        self.frame.clone()
    }

    pub fn text_renderer(&self) -> &Arc<TextRenderer> {
        &self.text
    }

    /// Fill the whole surface, ignoring transform, alpha and clip.
    pub fn clear(&mut self, color: Color) {
        self.frame.fill(&color);
    }

    // --- State stack ---

    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    /// Number of outstanding `save` calls.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Pop states until only `depth` saves remain.
    pub fn restore_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            self.restore();
        }
    }

    pub fn reset_state(&mut self) {
        self.stack.clear();
        self.state = DrawState::default();
    }

    pub fn transform(&self) -> Affine {
        self.state.transform
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.state.transform = self.state.transform.then(&Affine::translation(dx, dy));
    }

    pub fn rotate(&mut self, radians: f64) {
        self.state.transform = self.state.transform.then(&Affine::rotation(radians));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.state.transform = self.state.transform.then(&Affine::scaling(sx, sy));
    }

    pub fn alpha(&self) -> f64 {
        self.state.alpha
    }

    /// Set global alpha; values are clamped into [0, 1], NaN becomes 0.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.state.alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
    }

    /// Restrict subsequent drawing to a local-space rect.
    pub fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        match self.state.transform.invert() {
            Some(inv) => self.state.clips.push((inv, Rect::new(x, y, w, h))),
            // degenerate transform: nothing can be drawn anyway
            None => self.state.clips.push((Affine::IDENTITY, Rect::new(0.0, 0.0, 0.0, 0.0))),
        }
    }

    // --- Rasterization core ---

    /// Walk the device pixels covered by `bounds` (local space) and blend the
    /// color returned by `shader` for each local sample point.
    fn paint<F>(&mut self, bounds: Rect, shader: F)
    where
        F: Fn(f64, f64) -> Option<[u8; 4]>,
    {
        if self.state.alpha <= 0.0 || self.frame.pixel_count() == 0 {
            return;
        }
        if ![bounds.x, bounds.y, bounds.width, bounds.height]
            .iter()
            .all(|v| v.is_finite())
            || bounds.width <= 0.0
            || bounds.height <= 0.0
        {
            return;
        }
        let Some(inv) = self.state.transform.invert() else {
            return;
        };

        let dev = self.state.transform.map_rect(&bounds);
        let x0 = dev.x.floor().max(0.0) as u32;
        let y0 = dev.y.floor().max(0.0) as u32;
        let x1 = (dev.x + dev.width).ceil().min(self.frame.width as f64).max(0.0) as u32;
        let y1 = (dev.y + dev.height).ceil().min(self.frame.height as f64).max(0.0) as u32;
        let global_alpha = self.state.alpha;

        for py in y0..y1 {
            for px in x0..x1 {
                let center = Point2D::new(px as f64 + 0.5, py as f64 + 0.5);
                if !self
                    .state
                    .clips
                    .iter()
                    .all(|(clip_inv, r)| r.contains(clip_inv.apply(center)))
                {
                    continue;
                }
                let local = inv.apply(center);
                if let Some(mut rgba) = shader(local.x, local.y) {
                    if global_alpha < 1.0 {
                        rgba[3] = (rgba[3] as f64 * global_alpha).round() as u8;
                    }
                    self.frame.blend_pixel(px, py, rgba);
                }
            }
        }
    }

    fn fill_shape<F>(&mut self, bounds: Rect, color: Color, inside: F)
    where
        F: Fn(f64, f64) -> bool,
    {
        if color.a <= 0.0 {
            return;
        }
        let rgba = color.to_rgba8();
        self.paint(bounds, |x, y| inside(x, y).then_some(rgba));
    }

    // --- Primitives ---

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color) {
        let r = Rect::new(x, y, w, h);
        self.fill_shape(r, color, |px, py| {
            px >= r.x && px < r.x + r.width && py >= r.y && py < r.y + r.height
        });
    }

    pub fn fill_round_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radius: f64, color: Color) {
        let rad = radius.max(0.0).min(w / 2.0).min(h / 2.0);
        let r = Rect::new(x, y, w, h);
        self.fill_shape(r, color, |px, py| in_round_rect(&r, rad, px, py));
    }

    /// Outline a rect; the stroke is centred on the edge like a 2D canvas.
    pub fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, line_width: f64, color: Color) {
        let half = line_width.max(0.0) / 2.0;
        let outer = Rect::new(x, y, w, h).inflate(half);
        let inner = Rect::new(x, y, w, h).inflate(-half);
        self.fill_shape(outer, color, |px, py| {
            let in_outer = px >= outer.x
                && px < outer.x + outer.width
                && py >= outer.y
                && py < outer.y + outer.height;
            let in_inner = inner.width > 0.0
                && inner.height > 0.0
                && px >= inner.x
                && px < inner.x + inner.width
                && py >= inner.y
                && py < inner.y + inner.height;
            in_outer && !in_inner
        });
    }

    pub fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Color) {
        self.fill_ellipse(cx, cy, radius, radius, color);
    }

    pub fn fill_ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64, color: Color) {
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let bounds = Rect::new(cx - rx, cy - ry, rx * 2.0, ry * 2.0);
        self.fill_shape(bounds, color, |px, py| {
            let dx = (px - cx) / rx;
            let dy = (py - cy) / ry;
            dx * dx + dy * dy <= 1.0
        });
    }

    /// Ring of the given stroke width centred on `radius`.
    pub fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, line_width: f64, color: Color) {
        let half = line_width.max(0.0) / 2.0;
        self.fill_pie(cx, cy, radius + half, (radius - half).max(0.0), 0.0, TAU, color);
    }

    /// Filled circular sector from `start` to `end` (radians, clockwise from
    /// +x). A non-zero `inner_radius` produces a donut segment.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_pie(
        &mut self,
        cx: f64,
        cy: f64,
        radius: f64,
        inner_radius: f64,
        start: f64,
        end: f64,
        color: Color,
    ) {
        if radius <= 0.0 || !(end > start) {
            return;
        }
        let sweep = end - start;
        let inner_sq = inner_radius.max(0.0).powi(2);
        let outer_sq = radius * radius;
        let bounds = Rect::new(cx - radius, cy - radius, radius * 2.0, radius * 2.0);
        self.fill_shape(bounds, color, |px, py| {
            let dx = px - cx;
            let dy = py - cy;
            let d2 = dx * dx + dy * dy;
            if d2 > outer_sq || d2 < inner_sq {
                return false;
            }
            if sweep >= TAU {
                return true;
            }
            let angle = (dy.atan2(dx) - start).rem_euclid(TAU);
            angle <= sweep
        });
    }

    /// Even-odd polygon fill.
    pub fn fill_polygon(&mut self, points: &[Point2D], color: Color) {
        if points.len() < 3 {
            return;
        }
        let bounds = bounds_of(points);
        self.fill_shape(bounds, color, |px, py| point_in_polygon(points, px, py));
    }

    pub fn stroke_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64, color: Color) {
        self.stroke_polyline(&[Point2D::new(x1, y1), Point2D::new(x2, y2)], width, color);
    }

    /// Stroke connected segments in one pass so joints are not double-blended.
    pub fn stroke_polyline(&mut self, points: &[Point2D], width: f64, color: Color) {
        if points.len() < 2 || width <= 0.0 {
            return;
        }
        let half = width / 2.0;
        let bounds = bounds_of(points).inflate(half);
        let half_sq = half * half;
        self.fill_shape(bounds, color, |px, py| {
            points
                .windows(2)
                .any(|seg| segment_distance_sq(seg[0], seg[1], px, py) <= half_sq)
        });
    }

    /// Draw `image` with its top-left at local (x, y), scaled to `w` x `h`.
    pub fn draw_image(&mut self, image: &FrameBuffer, x: f64, y: f64, w: f64, h: f64) {
        if image.pixel_count() == 0 || w <= 0.0 || h <= 0.0 {
            return;
        }
        // Untransformed, unscaled, integer-aligned: straight blit.
        let t = self.state.transform;
        if t.a == 1.0
            && t.b == 0.0
            && t.c == 0.0
            && t.d == 1.0
            && self.state.alpha >= 1.0
            && self.state.clips.is_empty()
            && w == image.width as f64
            && h == image.height as f64
            && (x + t.e).fract() == 0.0
            && (y + t.f).fract() == 0.0
        {
            self.frame
                .composite_over(image, (x + t.e) as i32, (y + t.f) as i32);
            return;
        }
        let sx = image.width as f64 / w;
        let sy = image.height as f64 / h;
        self.paint(Rect::new(x, y, w, h), |px, py| {
            let ix = ((px - x) * sx).floor();
            let iy = ((py - y) * sy).floor();
            if ix < 0.0 || iy < 0.0 {
                return None;
            }
            image
                .get_pixel(ix as u32, iy as u32)
                .filter(|p| p[3] > 0)
        });
    }

    // --- Text ---

    pub fn measure_text(&self, text: &str, font_family: &str, font_size: f64) -> TextMetrics {
        self.text.measure(text, font_family, font_size as f32)
    }

    /// Pixel budget of a single text block on this canvas.
    pub fn text_area_limit(&self) -> u64 {
        let canvas = self.frame.pixel_count() as u64 * TEXT_AREA_PER_CANVAS;
        canvas.max(MIN_TEXT_AREA).min(MAX_RASTER_PIXELS)
    }

    /// Rasterize `text` offscreen, refusing blocks over
    /// [`Canvas::text_area_limit`].
    pub fn rasterize_text(&self, text: &str, style: &TextStyle) -> KinetixResult<FrameBuffer> {
        let metrics = self.measure_text(text, &style.font_family, style.font_size);
        if metrics.line_count > 0 {
            check_raster_size(&metrics, self.text_area_limit())?;
        }
        self.text.rasterize(
            text,
            &style.font_family,
            style.font_size as f32,
            &style.color,
            style.align,
        )
    }

    /// Draw a text block whose top edge is at `y`. `x` is the left edge,
    /// centre or right edge depending on the style's alignment.
    ///
    /// Fails with a render error when the block exceeds
    /// [`Canvas::text_area_limit`]; nothing is drawn in that case.
    pub fn fill_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        style: &TextStyle,
    ) -> KinetixResult<TextMetrics> {
        let metrics = self.measure_text(text, &style.font_family, style.font_size);
        if metrics.line_count == 0 {
            return Ok(metrics);
        }
        let image = self.rasterize_text(text, style)?;
        let left = match style.align {
            TextAlign::Left => x,
            TextAlign::Center => x - metrics.width / 2.0,
            TextAlign::Right => x - metrics.width,
        };
        let (w, h) = (image.width as f64, image.height as f64);
        self.draw_image(&image, left, y, w, h);
        Ok(metrics)
    }
}

fn in_round_rect(r: &Rect, rad: f64, px: f64, py: f64) -> bool {
    if px < r.x || px >= r.x + r.width || py < r.y || py >= r.y + r.height {
        return false;
    }
    if rad <= 0.0 {
        return true;
    }
    let cx = px.clamp(r.x + rad, r.x + r.width - rad);
    let cy = py.clamp(r.y + rad, r.y + r.height - rad);
    let dx = px - cx;
    let dy = py - cy;
    dx * dx + dy * dy <= rad * rad
}

fn bounds_of(points: &[Point2D]) -> Rect {
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    // degenerate (horizontal/vertical) outlines still need a 1px box
    Rect::new(min_x, min_y, (max_x - min_x).max(1.0), (max_y - min_y).max(1.0))
}

fn point_in_polygon(points: &[Point2D], px: f64, py: f64) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > py) != (pj.y > py) && px < (pj.x - pi.x) * (py - pi.y) / (pj.y - pi.y) + pi.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn segment_distance_sq(a: Point2D, b: Point2D, px: f64, py: f64) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    (px - cx).powi(2) + (py - cy).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetix_core::hash::hash_frame;

    fn canvas(w: u32, h: u32) -> Canvas {
        let mut c = Canvas::with_text_renderer(w, h, Arc::new(TextRenderer::new()));
        c.clear(Color::BLACK);
        c
    }

    #[test]
    fn test_fill_rect_exact_pixels() {
        let mut c = canvas(10, 10);
        c.fill_rect(2.0, 3.0, 4.0, 2.0, Color::RED);
        assert_eq!(c.frame().get_pixel(2, 3), Some([255, 0, 0, 255]));
        assert_eq!(c.frame().get_pixel(5, 4), Some([255, 0, 0, 255]));
        assert_eq!(c.frame().get_pixel(6, 4), Some([0, 0, 0, 255]));
        assert_eq!(c.frame().get_pixel(2, 5), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_global_alpha_blends() {
        let mut c = canvas(4, 4);
        c.set_alpha(0.5);
        c.fill_rect(0.0, 0.0, 4.0, 4.0, Color::WHITE);
        let px = c.frame().get_pixel(1, 1).unwrap();
        assert!(px[0] > 120 && px[0] < 136);
        c.set_alpha(0.0);
        c.fill_rect(0.0, 0.0, 4.0, 4.0, Color::RED);
        assert_eq!(c.frame().get_pixel(1, 1).unwrap()[1], px[1]);
    }

    #[test]
    fn test_save_restore_transform() {
        let mut c = canvas(20, 20);
        c.save();
        c.translate(10.0, 10.0);
        c.fill_rect(0.0, 0.0, 2.0, 2.0, Color::GREEN);
        c.restore();
        c.fill_rect(0.0, 0.0, 2.0, 2.0, Color::BLUE);
        assert_eq!(c.frame().get_pixel(10, 10), Some([0, 255, 0, 255]));
        assert_eq!(c.frame().get_pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(c.depth(), 0);
        c.restore();
        assert_eq!(c.depth(), 0);
    }

    #[test]
    fn test_rotation_about_center() {
        let mut c = canvas(20, 20);
        c.translate(10.0, 10.0);
        c.rotate(std::f64::consts::FRAC_PI_2);
        c.translate(-10.0, -10.0);
        // horizontal bar becomes vertical
        c.fill_rect(2.0, 9.0, 16.0, 2.0, Color::WHITE);
        assert_eq!(c.frame().get_pixel(10, 3).unwrap()[0], 255);
        assert_eq!(c.frame().get_pixel(3, 10).unwrap()[0], 0);
    }

    #[test]
    fn test_clip_rect_limits_drawing() {
        let mut c = canvas(10, 10);
        c.save();
        c.clip_rect(0.0, 0.0, 5.0, 10.0);
        c.fill_rect(0.0, 0.0, 10.0, 10.0, Color::RED);
        c.restore();
        assert_eq!(c.frame().get_pixel(4, 4).unwrap()[0], 255);
        assert_eq!(c.frame().get_pixel(6, 4).unwrap()[0], 0);
    }

    #[test]
    fn test_pie_quadrant() {
        let mut c = canvas(21, 21);
        c.fill_pie(10.0, 10.0, 10.0, 0.0, 0.0, std::f64::consts::FRAC_PI_2, Color::RED);
        // +x,+y quadrant (bottom right, y down) is filled
        assert_eq!(c.frame().get_pixel(14, 14).unwrap()[0], 255);
        assert_eq!(c.frame().get_pixel(5, 5).unwrap()[0], 0);
        assert_eq!(c.frame().get_pixel(14, 5).unwrap()[0], 0);
    }

    #[test]
    fn test_donut_hole() {
        let mut c = canvas(21, 21);
        c.fill_pie(10.0, 10.0, 10.0, 5.0, 0.0, TAU, Color::RED);
        assert_eq!(c.frame().get_pixel(10, 10).unwrap()[0], 0);
        assert_eq!(c.frame().get_pixel(10, 2).unwrap()[0], 255);
    }

    #[test]
    fn test_polygon_triangle() {
        let mut c = canvas(10, 10);
        let tri = [
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 10.0),
        ];
        c.fill_polygon(&tri, Color::WHITE);
        assert_eq!(c.frame().get_pixel(1, 1).unwrap()[0], 255);
        assert_eq!(c.frame().get_pixel(8, 8).unwrap()[0], 0);
    }

    #[test]
    fn test_stroke_rect_hollow() {
        let mut c = canvas(20, 20);
        c.stroke_rect(4.0, 4.0, 12.0, 12.0, 2.0, Color::BLUE);
        assert_eq!(c.frame().get_pixel(4, 10).unwrap()[2], 255);
        assert_eq!(c.frame().get_pixel(10, 10).unwrap()[2], 0);
    }

    #[test]
    fn test_non_finite_geometry_is_ignored() {
        let mut c = canvas(8, 8);
        let before = hash_frame(c.frame());
        c.fill_rect(f64::NAN, 0.0, 4.0, 4.0, Color::RED);
        c.fill_circle(4.0, 4.0, -3.0, Color::RED);
        c.scale(0.0, 1.0);
        c.fill_rect(0.0, 0.0, 4.0, 4.0, Color::RED);
        assert_eq!(before, hash_frame(c.frame()));
    }

    #[test]
    fn test_fill_text_alignment_anchor() {
        let mut c = canvas(100, 20);
        let style = TextStyle::new("Inter", 10.0, Color::WHITE).with_align(TextAlign::Right);
        let m = c.fill_text("abc", 100.0, 0.0, &style).unwrap();
        assert!((m.width - 18.0).abs() < 1e-6);
        // fallback glyphs end at the right edge, nothing on the left
        assert_eq!(c.frame().get_pixel(5, 5).unwrap()[0], 0);
        assert_eq!(c.frame().get_pixel(95, 5).unwrap()[0], 255);
    }

    #[test]
    fn test_oversized_text_is_refused() {
        let mut c = canvas(64, 32);
        let before = hash_frame(c.frame());
        let style = TextStyle::new("Inter", 5_000.0, Color::WHITE);
        assert!(c.fill_text("wide", 0.0, 0.0, &style).is_err());
        assert_eq!(before, hash_frame(c.frame()));
        assert_eq!(c.text_area_limit(), 1 << 20);
    }

    #[test]
    fn test_draw_is_repeatable() {
        let draw = |c: &mut Canvas| {
            c.clear(Color::BLACK);
            c.save();
            c.translate(16.0, 16.0);
            c.rotate(0.3);
            c.scale(1.5, 0.75);
            c.fill_round_rect(-10.0, -10.0, 20.0, 20.0, 4.0, Color::RED);
            c.restore();
        };
        let mut c = canvas(32, 32);
        draw(&mut c);
        let first = hash_frame(c.frame());
        draw(&mut c);
        assert_eq!(first, hash_frame(c.frame()));
    }
}
