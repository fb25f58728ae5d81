use std::f64::consts::TAU;

use kinetix_core::{Color, KinetixResult, Point2D};
use kinetix_render::{Canvas, TextStyle};
use serde::{Deserialize, Serialize};

use super::{hash_signed, hash_unit};
use crate::object::{drawable_common, finite_or, Drawable, ObjectBase, ObjectKind, Rescale};

/// Alpha above which a sampled glyph pixel becomes a particle.
const COVERAGE_THRESHOLD: u8 = 128;
const MIN_GAP: u32 = 1;
const MAX_GAP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleAnimation {
    None,
    /// Particles fly in from scattered positions.
    #[default]
    Explode,
    /// Particles spiral in towards their targets.
    Vortex,
}

/// Text assembled from a grid of particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticleTextObject {
    #[serde(flatten)]
    pub base: ObjectBase,
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: Color,
    /// Sampling step in pixels, 1..=10.
    pub gap: u32,
    pub anim_type: ParticleAnimation,
}

impl Default for ParticleTextObject {
    fn default() -> Self {
        Self {
            base: ObjectBase::default().with_size(600.0, 150.0),
            text: "PARTICLES".to_string(),
            font_size: 120.0,
            font_family: "Inter".to_string(),
            color: Color::WHITE,
            gap: 4,
            anim_type: ParticleAnimation::Explode,
        }
    }
}

impl ParticleTextObject {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(ObjectKind::ParticleText, name).with_size(600.0, 150.0),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn effective_gap(&self) -> u32 {
        self.gap.clamp(MIN_GAP, MAX_GAP)
    }

    /// Target positions (object-local) of every particle, row-major.
    pub fn sample_targets(&self, canvas: &Canvas) -> KinetixResult<Vec<Point2D>> {
        let size = finite_or(self.font_size, 0.0);
        if self.text.is_empty() || size <= 0.0 {
            return Ok(Vec::new());
        }
        let style = TextStyle::new(self.font_family.clone(), size, Color::WHITE);
        let glyphs = canvas.rasterize_text(&self.text, &style)?;
        let step = self.effective_gap() as usize;
        let mut targets = Vec::new();
        for y in (0..glyphs.height).step_by(step) {
            for x in (0..glyphs.width).step_by(step) {
                if glyphs
                    .get_pixel(x, y)
                    .is_some_and(|p| p[3] >= COVERAGE_THRESHOLD)
                {
                    targets.push(Point2D::new(x as f64, y as f64));
                }
            }
        }
        Ok(targets)
    }

    /// Where particle `index` sits at eased progress `ease`.
    fn position(&self, index: usize, target: Point2D, ease: f64) -> Point2D {
        let (w, h) = (self.base.width, self.base.height);
        let centre = Point2D::new(w / 2.0, h / 2.0);
        let k = index as u64;
        match self.anim_type {
            ParticleAnimation::None => target,
            ParticleAnimation::Explode => {
                let start = Point2D::new(
                    centre.x + hash_signed(k, 1) * w,
                    centre.y + hash_signed(k, 2) * h * 2.0,
                );
                start.lerp(&target, ease)
            }
            ParticleAnimation::Vortex => {
                let remaining = 1.0 - ease;
                let dx = target.x - centre.x;
                let dy = target.y - centre.y;
                let angle = dy.atan2(dx) + remaining * TAU * (1.0 + hash_unit(k, 3));
                let radius = (dx * dx + dy * dy).sqrt()
                    + remaining * w.max(h) * (0.5 + hash_unit(k, 4));
                Point2D::new(
                    centre.x + angle.cos() * radius,
                    centre.y + angle.sin() * radius,
                )
            }
        }
    }
}

impl Drawable for ParticleTextObject {
    drawable_common!(ObjectKind::ParticleText);

    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()> {
        let size = finite_or(self.font_size, 0.0);
        if self.text.is_empty() || size <= 0.0 {
            return Ok(());
        }
        let metrics = canvas.measure_text(&self.text, &self.font_family, size);
        self.base.width = metrics.width;
        self.base.height = metrics.height;

        let state = self.base.visual_state(time);
        if state.is_hidden() {
            return Ok(());
        }
        let ease = self
            .base
            .easing
            .apply(self.base.enter_animation.progress(time));
        let dot = (self.effective_gap() as f64 * 0.8).max(1.0);
        let targets = self.sample_targets(canvas)?;

        canvas.save();
        self.base.apply_transform(canvas, &state);
        for (i, target) in targets.iter().enumerate() {
            let p = self.position(i, *target, ease);
            canvas.fill_rect(p.x, p.y, dot, dot, self.color);
        }
        canvas.restore();
        Ok(())
    }

    fn rescale(&mut self, r: &Rescale) {
        let u = r.uniform();
        self.base.rescale(r);
        self.font_size *= u;
        self.gap = ((self.gap as f64 * u).round() as u32).max(MIN_GAP);
    }
}
