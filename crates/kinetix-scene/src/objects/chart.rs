use std::f64::consts::{FRAC_PI_2, TAU};

use kinetix_core::{Color, Easing, KinetixResult, Point2D};
use kinetix_render::{Canvas, TextAlign, TextStyle};
use serde::{Deserialize, Serialize};

use super::{hash_signed, hash_unit};
use crate::object::{drawable_common, finite_or, Drawable, ObjectBase, ObjectKind};

const HEADROOM: f64 = 1.1;
const LABEL_SIZE: f64 = 12.0;
const TITLE_SIZE: f64 = 24.0;
const VOX_BACKGROUND: &str = "#1e1e1e";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Area,
    Pie,
    Donut,
    Scatter,
}

impl ChartType {
    pub fn is_radial(&self) -> bool {
        matches!(self, ChartType::Pie | ChartType::Donut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    #[default]
    Clean,
    /// Hand-drawn look: doubled strokes and hatched fills.
    Scribble,
    /// Dark card with extruded bars.
    Vox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDatum {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl ChartDatum {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            color: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

/// Cartesian plot area in object-local coordinates.
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl PlotArea {
    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// A data chart that grows into place with an exponential ease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartObject {
    #[serde(flatten)]
    pub base: ObjectBase,
    pub title: String,
    pub chart_type: ChartType,
    pub style_variant: ChartStyle,
    pub data: Vec<ChartDatum>,
    pub bar_color: Color,
    pub text_color: Color,
    pub show_labels: bool,
    pub font_family: String,
    /// Growth time after the enter delay.
    pub grow_duration_ms: f64,
}

impl Default for ChartObject {
    fn default() -> Self {
        let hex = |s| Color::parse_or(s, Color::BLACK);
        Self {
            base: ObjectBase::default().with_size(500.0, 350.0),
            title: "Growth Chart".to_string(),
            chart_type: ChartType::Bar,
            style_variant: ChartStyle::Clean,
            data: vec![
                ChartDatum::new("Jan", 30.0).with_color(hex("#3b82f6")),
                ChartDatum::new("Feb", 45.0).with_color(hex("#ef4444")),
                ChartDatum::new("Mar", 25.0).with_color(hex("#22c55e")),
                ChartDatum::new("Apr", 60.0).with_color(hex("#eab308")),
                ChartDatum::new("May", 80.0).with_color(hex("#a855f7")),
            ],
            bar_color: hex("#3b82f6"),
            text_color: hex("#1e293b"),
            show_labels: true,
            font_family: "Inter".to_string(),
            grow_duration_ms: 2000.0,
        }
    }
}

impl ChartObject {
    pub fn new(name: impl Into<String>, chart_type: ChartType) -> Self {
        Self {
            base: ObjectBase::new(ObjectKind::Chart, name).with_size(500.0, 350.0),
            chart_type,
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: ChartStyle) -> Self {
        self.style_variant = style;
        self
    }

    /// Eased growth in `[0, 1]`, or `None` before the chart starts.
    pub fn growth(&self, time: f64) -> Option<f64> {
        let t = time - self.base.enter_animation.delay;
        if !(t >= 0.0) {
            return None;
        }
        let duration = finite_or(self.grow_duration_ms, 0.0);
        let progress = if duration > 0.0 {
            (t / duration).min(1.0)
        } else {
            1.0
        };
        Some(Easing::ExpoOut.apply(progress))
    }

    fn value(d: &ChartDatum) -> f64 {
        finite_or(d.value, 0.0)
    }

    fn max_value(&self) -> f64 {
        self.data.iter().map(Self::value).fold(1.0, f64::max) * HEADROOM
    }

    fn label_color(&self) -> Color {
        match self.style_variant {
            ChartStyle::Vox => Color::parse_or("#eeeeee", Color::WHITE),
            _ => self.text_color,
        }
    }

    fn label_style(&self) -> TextStyle {
        TextStyle::new(self.font_family.clone(), LABEL_SIZE, self.label_color())
            .with_align(TextAlign::Center)
    }

    fn slice_color(&self, index: usize, datum: &ChartDatum) -> Color {
        datum
            .color
            .unwrap_or_else(|| self.bar_color.shade(1.0 - index as f32 * 0.08))
    }

    /// Doubled stroke with a small deterministic wobble on the second pass.
    fn scribble_line(canvas: &mut Canvas, from: Point2D, to: Point2D, width: f64, color: Color, seed: u64) {
        canvas.stroke_line(from.x, from.y, to.x, to.y, width, color);
        canvas.stroke_line(
            from.x + hash_unit(seed, 1) * 2.0,
            from.y + hash_unit(seed, 2) * 2.0,
            to.x + hash_unit(seed, 3) * 2.0,
            to.y + hash_unit(seed, 4) * 2.0,
            width,
            color,
        );
    }

    fn scribble_rect(&self, canvas: &mut Canvas, x: f64, y: f64, w: f64, h: f64, seed: u64) {
        let corners = [
            Point2D::new(x, y),
            Point2D::new(x + w, y),
            Point2D::new(x + w, y + h),
            Point2D::new(x, y + h),
        ];
        for i in 0..4 {
            Self::scribble_line(
                canvas,
                corners[i],
                corners[(i + 1) % 4],
                2.0,
                self.bar_color,
                seed * 8 + i as u64,
            );
        }
        let mut hx = x;
        while hx < x + w {
            canvas.stroke_line(hx, y + h, hx + 2.0, y, 1.0, self.bar_color);
            hx += 5.0;
        }
    }

    fn point_at(&self, area: &PlotArea, index: usize, value: f64, max: f64) -> Point2D {
        let count = self.data.len();
        let step = area.width / (if count > 1 { count - 1 } else { 1 }) as f64;
        Point2D::new(
            area.left + index as f64 * step,
            area.bottom() - value / max * area.height,
        )
    }

    fn draw_axes(&self, canvas: &mut Canvas, area: &PlotArea) {
        let corner = Point2D::new(area.left, area.bottom());
        let top = Point2D::new(area.left, area.top);
        let right = Point2D::new(area.left + area.width, area.bottom());
        match self.style_variant {
            ChartStyle::Scribble => {
                Self::scribble_line(canvas, top, corner, 2.0, self.text_color, 0);
                Self::scribble_line(canvas, corner, right, 2.0, self.text_color, 1);
            }
            ChartStyle::Vox => {
                let axis = Color::parse_or("#555555", Color::WHITE);
                canvas.stroke_polyline(&[top, corner, right], 1.0, axis);
            }
            ChartStyle::Clean => canvas.stroke_polyline(&[top, corner, right], 1.0, self.text_color),
        }
    }

    fn draw_bars(
        &self,
        canvas: &mut Canvas,
        area: &PlotArea,
        max: f64,
        ease: f64,
    ) -> KinetixResult<()> {
        let space = area.width / self.data.len() as f64;
        let bar_w = space * 0.6;
        let margin = space * 0.2;
        let label = self.label_style();

        for (i, d) in self.data.iter().enumerate() {
            let bar_h = Self::value(d) * ease / max * area.height;
            let x = area.left + i as f64 * space + margin;
            let y = area.bottom() - bar_h;
            let color = d.color.unwrap_or(self.bar_color);
            match self.style_variant {
                ChartStyle::Scribble => self.scribble_rect(canvas, x, y, bar_w, bar_h, i as u64),
                ChartStyle::Vox => {
                    canvas.fill_rect(x + 5.0, y + 5.0, bar_w, bar_h, color.shade(0.7));
                    canvas.fill_rect(x, y, bar_w, bar_h, color);
                }
                ChartStyle::Clean => canvas.fill_rect(x, y, bar_w, bar_h, color),
            }
            if self.show_labels {
                canvas.fill_text(&d.label, x + bar_w / 2.0, area.bottom() + 8.0, &label)?;
            }
        }
        Ok(())
    }

    fn draw_line(
        &self,
        canvas: &mut Canvas,
        area: &PlotArea,
        max: f64,
        ease: f64,
    ) -> KinetixResult<()> {
        let points: Vec<Point2D> = self
            .data
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let mut p = self.point_at(area, i, Self::value(d) * ease, max);
                if self.style_variant == ChartStyle::Scribble && i > 0 {
                    p.x += hash_signed(i as u64, 11);
                    p.y += hash_signed(i as u64, 12);
                }
                p
            })
            .collect();
        canvas.stroke_polyline(&points, 3.0, self.bar_color);
        self.draw_point_labels(canvas, area)
    }

    fn draw_area(
        &self,
        canvas: &mut Canvas,
        area: &PlotArea,
        max: f64,
        ease: f64,
    ) -> KinetixResult<()> {
        let alpha = match self.style_variant {
            ChartStyle::Vox => 0xAA as f32 / 255.0,
            _ => 0x80 as f32 / 255.0,
        };
        let mut outline = vec![Point2D::new(area.left, area.bottom())];
        outline.extend(
            self.data
                .iter()
                .enumerate()
                .map(|(i, d)| self.point_at(area, i, Self::value(d) * ease, max)),
        );
        outline.push(Point2D::new(area.left + area.width, area.bottom()));
        canvas.fill_polygon(&outline, self.bar_color.with_alpha(alpha));
        self.draw_line(canvas, area, max, ease)
    }

    fn draw_scatter(
        &self,
        canvas: &mut Canvas,
        area: &PlotArea,
        max: f64,
        ease: f64,
    ) -> KinetixResult<()> {
        for (i, d) in self.data.iter().enumerate() {
            let p = self.point_at(area, i, Self::value(d), max);
            let color = d.color.unwrap_or(self.bar_color);
            canvas.fill_circle(p.x, p.y, 6.0 * ease, color);
        }
        self.draw_point_labels(canvas, area)
    }

    fn draw_point_labels(&self, canvas: &mut Canvas, area: &PlotArea) -> KinetixResult<()> {
        if !self.show_labels {
            return Ok(());
        }
        let label = self.label_style();
        for (i, d) in self.data.iter().enumerate() {
            let p = self.point_at(area, i, 0.0, 1.0);
            canvas.fill_text(&d.label, p.x, area.bottom() + 8.0, &label)?;
        }
        Ok(())
    }

    fn draw_pie(&self, canvas: &mut Canvas, area: &PlotArea, ease: f64) -> KinetixResult<()> {
        let total: f64 = self.data.iter().map(|d| Self::value(d).max(0.0)).sum();
        if total <= 0.0 {
            return Ok(());
        }
        let cx = self.base.width / 2.0;
        let cy = self.base.height / 2.0 + 20.0;
        let radius = area.width.min(area.height) * 0.35 * ease;
        let inner = if self.chart_type == ChartType::Donut {
            radius * 0.6
        } else {
            0.0
        };
        let (sep_width, sep_color) = match self.style_variant {
            ChartStyle::Vox => (2.0, Color::parse_or("#111111", Color::BLACK)),
            ChartStyle::Scribble => (1.0, self.text_color),
            ChartStyle::Clean => (1.0, Color::WHITE),
        };
        let label = self.label_style();

        let mut start = -FRAC_PI_2;
        for (i, d) in self.data.iter().enumerate() {
            let sweep = Self::value(d).max(0.0) / total * TAU;
            canvas.fill_pie(cx, cy, radius, inner, start, start + sweep, self.slice_color(i, d));
            canvas.stroke_line(
                cx + start.cos() * inner,
                cy + start.sin() * inner,
                cx + start.cos() * radius,
                cy + start.sin() * radius,
                sep_width,
                sep_color,
            );
            if self.show_labels {
                let mid = start + sweep / 2.0;
                let lx = cx + mid.cos() * (radius + 20.0);
                let ly = cy + mid.sin() * (radius + 20.0);
                canvas.fill_text(&d.label, lx, ly - LABEL_SIZE / 2.0, &label)?;
            }
            start += sweep;
        }
        Ok(())
    }
}

impl Drawable for ChartObject {
    drawable_common!(ObjectKind::Chart);

    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()> {
        let Some(ease) = self.growth(time) else {
            return Ok(());
        };
        let state = self.base.visual_state(time);
        if state.is_hidden() {
            return Ok(());
        }
        let (w, h) = (self.base.width, self.base.height);

        canvas.save();
        self.base.apply_transform(canvas, &state);

        if self.style_variant == ChartStyle::Vox {
            canvas.fill_rect(
                -20.0,
                -20.0,
                w + 40.0,
                h + 40.0,
                Color::parse_or(VOX_BACKGROUND, Color::BLACK),
            );
        }

        let title_color = match self.style_variant {
            ChartStyle::Vox => Color::WHITE,
            _ => self.text_color,
        };
        let title = TextStyle::new(self.font_family.clone(), TITLE_SIZE, title_color)
            .with_align(TextAlign::Center);
        canvas.fill_text(&self.title, w / 2.0, 4.0, &title)?;

        let area = PlotArea {
            left: 40.0,
            top: 40.0,
            width: w - 60.0,
            height: h - 70.0,
        };

        if !self.data.is_empty() && area.width > 0.0 && area.height > 0.0 {
            let max = self.max_value();
            if !self.chart_type.is_radial() {
                self.draw_axes(canvas, &area);
            }
            match self.chart_type {
                ChartType::Bar => self.draw_bars(canvas, &area, max, ease)?,
                ChartType::Line => self.draw_line(canvas, &area, max, ease)?,
                ChartType::Area => self.draw_area(canvas, &area, max, ease)?,
                ChartType::Scatter => self.draw_scatter(canvas, &area, max, ease)?,
                ChartType::Pie | ChartType::Donut => self.draw_pie(canvas, &area, ease)?,
            }
        }

        canvas.restore();
        Ok(())
    }
}
