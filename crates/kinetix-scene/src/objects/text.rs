use kinetix_core::{Color, KinetixResult};
use kinetix_render::{Canvas, TextAlign, TextStyle};
use serde::{Deserialize, Serialize};

use crate::object::{drawable_common, finite_or, Drawable, ObjectBase, ObjectKind, Rescale};

/// A filled, rounded box behind the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBackground {
    pub color: Color,
    pub padding: f64,
    pub radius: f64,
}

/// Hard (unblurred) drop shadow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextShadow {
    pub color: Color,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// A block of (possibly multi-line) text that sizes itself to its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextObject {
    #[serde(flatten)]
    pub base: ObjectBase,
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: Color,
    pub align: TextAlign,
    pub background: Option<TextBackground>,
    pub shadow: Option<TextShadow>,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            base: ObjectBase::default().with_size(300.0, 100.0),
            text: "Hello World".to_string(),
            font_size: 40.0,
            font_family: "Inter".to_string(),
            color: Color::WHITE,
            align: TextAlign::Left,
            background: None,
            shadow: None,
        }
    }
}

impl TextObject {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(ObjectKind::Text, name).with_size(300.0, 100.0),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_font(mut self, family: impl Into<String>, size: f64) -> Self {
        self.font_family = family.into();
        self.font_size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    fn style(&self, font_size: f64, color: Color) -> TextStyle {
        TextStyle::new(self.font_family.clone(), font_size, color).with_align(self.align)
    }

    /// Match `width`/`height` to the rendered extent of the full text.
    pub fn measure(&mut self, canvas: &Canvas) {
        let metrics = canvas.measure_text(
            &self.text,
            &self.font_family,
            finite_or(self.font_size, 0.0),
        );
        self.base.width = metrics.width;
        self.base.height = metrics.height;
    }
}

impl Drawable for TextObject {
    drawable_common!(ObjectKind::Text);

    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()> {
        let font_size = finite_or(self.font_size, 0.0);
        if self.text.is_empty() || font_size <= 0.0 {
            return Ok(());
        }
        self.measure(canvas);

        let state = self.base.visual_state(time);
        if state.is_hidden() {
            return Ok(());
        }
        let count = state.reveal_count(self.text.chars().count());
        let shown: String = self.text.chars().take(count).collect();

        canvas.save();
        self.base.apply_transform(canvas, &state);

        let (w, h) = (self.base.width, self.base.height);
        if let Some(bg) = &self.background {
            let pad = finite_or(bg.padding, 0.0);
            canvas.fill_round_rect(
                -pad,
                -pad,
                w + pad * 2.0,
                h + pad * 2.0,
                finite_or(bg.radius, 0.0),
                bg.color,
            );
        }

        if !shown.is_empty() {
            let anchor = match self.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => w / 2.0,
                TextAlign::Right => w,
            };
            if let Some(shadow) = &self.shadow {
                canvas.fill_text(
                    &shown,
                    anchor + finite_or(shadow.offset_x, 0.0),
                    finite_or(shadow.offset_y, 0.0),
                    &self.style(font_size, shadow.color),
                )?;
            }
            canvas.fill_text(&shown, anchor, 0.0, &self.style(font_size, self.color))?;
        }

        canvas.restore();
        Ok(())
    }

    fn rescale(&mut self, r: &Rescale) {
        let u = r.uniform();
        self.base.rescale(r);
        self.font_size *= u;
        if let Some(bg) = &mut self.background {
            bg.padding *= u;
            bg.radius *= u;
        }
        if let Some(shadow) = &mut self.shadow {
            shadow.offset_x *= u;
            shadow.offset_y *= u;
        }
    }
}
