//! Ready-made objects for the editor's "add" actions.
//!
//! Every factory takes the scene it is building for so that it can pick a
//! unique display name and place the object around the canvas centre. The
//! returned object is not inserted; callers `scene.add(Box::new(obj))`.

use kinetix_core::Color;
use kinetix_render::Canvas;

use crate::object::Drawable;
use crate::objects::{
    BarChartRaceObject, CharacterObject, ChartDatum, ChartObject, ChartType, CodeBlockObject,
    ParticleTextObject, TextBackground, TextObject, TextShadow,
};
use crate::scene::Scene;

/// Pick a display name that does not collide with existing objects:
/// `base`, then `base 1`, `base 2`, ... continuing after the highest number
/// already in use.
pub fn next_name(scene: &Scene, base: &str) -> String {
    let prefix = format!("{} ", base);
    let mut exact = false;
    let mut highest: Option<u64> = None;

    for object in scene.objects() {
        let name = object.name();
        if name == base {
            exact = true;
        } else if let Some(n) = name
            .strip_prefix(&prefix)
            .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|rest| rest.parse::<u64>().ok())
            .filter(|n| *n > 0)
        {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }

    match highest {
        Some(h) => format!("{} {}", base, h + 1),
        None if exact => format!("{} 1", base),
        None => base.to_string(),
    }
}

fn centre(scene: &Scene) -> (f64, f64) {
    (scene.width() as f64 / 2.0, scene.height() as f64 / 2.0)
}

fn headline(scene: &Scene, base: &str, font_size: f64) -> TextObject {
    let name = next_name(scene, base);
    let (cx, cy) = centre(scene);
    let mut text = TextObject::new(name.clone(), name).with_font("Inter", font_size);
    text.color = Color::WHITE;
    text.base.x = cx - 150.0;
    text.base.y = cy - 50.0;
    text
}

pub fn heading(scene: &Scene) -> TextObject {
    headline(scene, "Heading", 80.0)
}

pub fn subheading(scene: &Scene) -> TextObject {
    headline(scene, "Subheading", 40.0)
}

pub fn body_text(scene: &Scene) -> TextObject {
    let mut text = headline(scene, "Text", 24.0);
    text.text = "Double-click to edit this text".to_string();
    text
}

/// Styled text presets from the text panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEffect {
    Plain,
    Pop,
    Retro,
    Badge,
}

impl TextEffect {
    pub const ALL: [TextEffect; 4] = [
        TextEffect::Plain,
        TextEffect::Pop,
        TextEffect::Retro,
        TextEffect::Badge,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextEffect::Plain => "Plain",
            TextEffect::Pop => "Pop",
            TextEffect::Retro => "Retro",
            TextEffect::Badge => "Badge",
        }
    }
}

/// Build an effect preset, centred using its measured size when a canvas is
/// available.
pub fn text_effect(scene: &Scene, effect: TextEffect, canvas: Option<&Canvas>) -> TextObject {
    let label = effect.label();
    let hex = |s| Color::parse_or(s, Color::WHITE);
    let mut text = TextObject::new(next_name(scene, label), label).with_font("Inter", 80.0);
    text.color = Color::WHITE;

    match effect {
        TextEffect::Plain => {}
        TextEffect::Pop => {
            text.font_family = "Impact".to_string();
            text.color = hex("#fbbf24");
            text.shadow = Some(TextShadow {
                color: Color::BLACK,
                offset_x: 4.0,
                offset_y: 4.0,
            });
        }
        TextEffect::Retro => {
            text.font_family = "Inter Display".to_string();
            text.color = hex("#f43f5e");
            text.shadow = Some(TextShadow {
                color: hex("#fecdd3"),
                offset_x: 3.0,
                offset_y: 3.0,
            });
        }
        TextEffect::Badge => {
            text.background = Some(TextBackground {
                color: hex("#2563eb"),
                padding: 8.0,
                radius: 4.0,
            });
        }
    }

    if let Some(canvas) = canvas {
        text.measure(canvas);
    }
    let (cx, cy) = centre(scene);
    text.base.x = cx - text.base.width / 2.0;
    text.base.y = cy - text.base.height / 2.0;
    text
}

pub fn code_block(scene: &Scene) -> CodeBlockObject {
    let (cx, cy) = centre(scene);
    let sample = CodeBlockObject::default().code;
    let mut code = CodeBlockObject::new(next_name(scene, "Code"), sample);
    code.base.x = cx - 200.0;
    code.base.y = cy - 100.0;
    code
}

pub fn chart_name(chart_type: ChartType) -> &'static str {
    match chart_type {
        ChartType::Bar => "Bar Chart",
        ChartType::Line => "Line Chart",
        ChartType::Area => "Area Chart",
        ChartType::Scatter => "Scatter Plot",
        ChartType::Pie => "Pie Chart",
        ChartType::Donut => "Donut Chart",
    }
}

pub fn chart(scene: &Scene, chart_type: ChartType) -> ChartObject {
    let (cx, cy) = centre(scene);
    let mut chart = ChartObject::new(next_name(scene, chart_name(chart_type)), chart_type);
    chart.base.x = cx - 200.0;
    chart.base.y = cy - 150.0;

    if chart_type.is_radial() {
        chart.base.width = 300.0;
        chart.base.height = 300.0;
        let palette: Vec<Option<Color>> = chart.data.iter().map(|d| d.color).collect();
        chart.data = [("A", 30.0), ("B", 20.0), ("C", 15.0), ("D", 35.0)]
            .into_iter()
            .zip(palette)
            .map(|((label, value), color)| ChartDatum {
                color,
                ..ChartDatum::new(label, value)
            })
            .collect();
    }
    chart
}

pub fn bar_race(scene: &Scene) -> BarChartRaceObject {
    let (cx, cy) = centre(scene);
    let mut race = BarChartRaceObject::new(next_name(scene, "Bar Race"));
    race.base.x = cx - 300.0;
    race.base.y = cy - 200.0;
    race
}

pub fn character(scene: &Scene) -> CharacterObject {
    let (cx, cy) = centre(scene);
    let mut character = CharacterObject::new(next_name(scene, "Character"));
    character.base.x = cx - 60.0;
    character.base.y = cy - 100.0;
    character
}

pub fn particle_text(scene: &Scene) -> ParticleTextObject {
    let (cx, cy) = centre(scene);
    let mut particles = ParticleTextObject::new(next_name(scene, "Particles"), "PARTICLES");
    particles.base.x = cx - 300.0;
    particles.base.y = cy - 75.0;
    particles
}

/// Convenience for callers that want to add and forget.
pub fn boxed<T: Drawable + 'static>(object: T) -> Box<dyn Drawable> {
    Box::new(object)
}
