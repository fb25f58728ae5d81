use kinetix_core::{Affine, Easing, KinetixError, KinetixResult, Point2D, Rect};
use kinetix_render::Canvas;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::animation::{self, EnterAnimation, ExitAnimation, VisualState};

/// Offset applied to a duplicate so it does not hide its source.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// Unique identifier for a scene object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh `<prefix>-<uuid>` id.
    pub fn generate(kind: ObjectKind) -> Self {
        Self(format!("{}-{}", kind.id_prefix(), uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Type tag used for dispatch-free identification and in property dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Text,
    CodeBlock,
    Chart,
    BarChartRace,
    Character,
    ParticleText,
}

impl ObjectKind {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ObjectKind::Text => "text",
            ObjectKind::CodeBlock => "code",
            ObjectKind::Chart => "chart",
            ObjectKind::BarChartRace => "race",
            ObjectKind::Character => "char",
            ObjectKind::ParticleText => "particles",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ObjectKind::Text => "Text",
            ObjectKind::CodeBlock => "CodeBlock",
            ObjectKind::Chart => "Chart",
            ObjectKind::BarChartRace => "BarChartRace",
            ObjectKind::Character => "Character",
            ObjectKind::ParticleText => "ParticleText",
        };
        write!(f, "{}", label)
    }
}

/// Per-axis scale factors of a canvas resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub sx: f64,
    pub sy: f64,
}

impl Rescale {
    pub fn new(sx: f64, sy: f64) -> Self {
        Self { sx, sy }
    }

    /// Factor applied to sizes so shapes and text keep their proportions.
    pub fn uniform(&self) -> f64 {
        self.sx.min(self.sy)
    }
}

/// `value` if it is a finite number, otherwise `fallback`.
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Geometry, flags and animation presets shared by every object kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectBase {
    pub id: ObjectId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees, clockwise.
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub opacity: f64,
    pub visible: bool,
    /// Locked objects render but are ignored by hit-testing.
    pub locked: bool,
    pub enter_animation: EnterAnimation,
    pub exit_animation: ExitAnimation,
    pub easing: Easing,
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self {
            id: ObjectId::default(),
            name: String::new(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            visible: true,
            locked: false,
            enter_animation: EnterAnimation::default(),
            exit_animation: ExitAnimation::default(),
            easing: Easing::CubicOut,
        }
    }
}

impl ObjectBase {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::generate(kind),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            finite_or(self.x, 0.0),
            finite_or(self.y, 0.0),
            finite_or(self.width, 0.0),
            finite_or(self.height, 0.0),
        )
    }

    /// Resolved enter/exit state at `time`, including the static opacity.
    pub fn visual_state(&self, time: f64) -> VisualState {
        let mut state =
            animation::resolve(&self.enter_animation, &self.exit_animation, self.easing, time);
        state.opacity *= finite_or(self.opacity, 1.0).clamp(0.0, 1.0);
        state
    }

    /// Object-local (0..width, 0..height) to canvas space, rotating and
    /// scaling about the object's centre.
    pub fn local_to_canvas(&self, state: &VisualState) -> Affine {
        let b = self.bounds();
        let (hw, hh) = (b.width / 2.0, b.height / 2.0);
        let scale = finite_or(state.scale, 1.0);
        Affine::translation(b.x + hw + state.offset_x, b.y + hh + state.offset_y)
            .then(&Affine::rotation(finite_or(self.rotation, 0.0).to_radians()))
            .then(&Affine::scaling(
                finite_or(self.scale_x, 1.0) * scale,
                finite_or(self.scale_y, 1.0) * scale,
            ))
            .then(&Affine::translation(-hw, -hh))
    }

    /// Push the object's transform and alpha onto `canvas`. Callers wrap
    /// this in `save`/`restore`.
    pub fn apply_transform(&self, canvas: &mut Canvas, state: &VisualState) {
        let b = self.bounds();
        let (hw, hh) = (b.width / 2.0, b.height / 2.0);
        let scale = finite_or(state.scale, 1.0);
        canvas.translate(b.x + hw + state.offset_x, b.y + hh + state.offset_y);
        canvas.rotate(finite_or(self.rotation, 0.0).to_radians());
        canvas.scale(
            finite_or(self.scale_x, 1.0) * scale,
            finite_or(self.scale_y, 1.0) * scale,
        );
        canvas.translate(-hw, -hh);
        canvas.set_alpha(canvas.alpha() * state.opacity);
    }

    /// Whether canvas point (x, y) lies inside the rotated, scaled bounds.
    pub fn hit_test(&self, x: f64, y: f64) -> bool {
        let b = self.bounds();
        let Some(inv) = self.local_to_canvas(&VisualState::RESOLVED).invert() else {
            return false;
        };
        Rect::new(0.0, 0.0, b.width, b.height).contains(inv.apply(Point2D::new(x, y)))
    }

    /// Positions follow each axis; sizes scale uniformly.
    pub fn rescale(&mut self, r: &Rescale) {
        let u = r.uniform();
        self.x *= r.sx;
        self.y *= r.sy;
        self.width *= u;
        self.height *= u;
    }

    /// Turn a copy into a distinct, offset duplicate.
    pub fn make_duplicate(&mut self, kind: ObjectKind) {
        self.id = ObjectId::generate(kind);
        self.name = format!("{} (Copy)", self.name);
        self.x += DUPLICATE_OFFSET;
        self.y += DUPLICATE_OFFSET;
    }
}

/// A single animatable entity on the canvas.
///
/// `draw` must be a pure function of `time` and the object's properties: the
/// only permitted side effect is self-measurement of `width`/`height`, which
/// is idempotent.
pub trait Drawable: Send + std::fmt::Debug {
    fn kind(&self) -> ObjectKind;

    fn base(&self) -> &ObjectBase;

    fn base_mut(&mut self) -> &mut ObjectBase;

    /// Paint the object as it appears at `time` (milliseconds).
    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()>;

    /// Deep copy with a new id, offset by [`DUPLICATE_OFFSET`].
    fn clone_object(&self) -> Box<dyn Drawable>;

    /// Scale geometry and size-derived properties after a canvas resize.
    fn rescale(&mut self, r: &Rescale) {
        self.base_mut().rescale(r);
    }

    /// All editable properties as a flat JSON object, including `type`.
    fn properties(&self) -> KinetixResult<Value>;

    /// Merge a partial property object into this one. `id` and `type` are
    /// never overwritten.
    fn update_properties(&mut self, patch: &Value) -> KinetixResult<()>;

    fn id(&self) -> &str {
        self.base().id.as_str()
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn hit_test(&self, x: f64, y: f64) -> bool {
        self.base().hit_test(x, y)
    }
}

/// Serialize an object for property editors, tagging it with its kind.
pub fn to_properties<T: Serialize>(object: &T, kind: ObjectKind) -> KinetixResult<Value> {
    let mut value = serde_json::to_value(object)?;
    if let Value::Object(map) = &mut value {
        map.insert("type".to_string(), Value::String(kind.to_string()));
    }
    Ok(value)
}

/// Apply a JSON patch to any serde-backed object.
pub fn merge_properties<T: Serialize + DeserializeOwned>(
    object: &mut T,
    patch: &Value,
) -> KinetixResult<()> {
    let Value::Object(changes) = patch else {
        return Err(KinetixError::InvalidArgument(
            "property patch must be a JSON object".to_string(),
        ));
    };
    let mut current = serde_json::to_value(&*object)?;
    let Value::Object(fields) = &mut current else {
        return Err(KinetixError::Other("object did not serialize to a map".to_string()));
    };
    for (key, value) in changes {
        if key == "id" || key == "type" {
            continue;
        }
        fields.insert(key.clone(), value.clone());
    }
    *object = serde_json::from_value(current)?;
    Ok(())
}

/// Implements the accessor and property plumbing of [`Drawable`] for a
/// struct with a flattened `base: ObjectBase` field.
macro_rules! drawable_common {
    ($kind:expr) => {
        fn kind(&self) -> $crate::object::ObjectKind {
            $kind
        }

        fn base(&self) -> &$crate::object::ObjectBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::object::ObjectBase {
            &mut self.base
        }

        fn clone_object(&self) -> Box<dyn $crate::object::Drawable> {
            let mut copy = self.clone();
            copy.base.make_duplicate($kind);
            Box::new(copy)
        }

        fn properties(&self) -> kinetix_core::KinetixResult<serde_json::Value> {
            $crate::object::to_properties(self, $kind)
        }

        fn update_properties(
            &mut self,
            patch: &serde_json::Value,
        ) -> kinetix_core::KinetixResult<()> {
            $crate::object::merge_properties(self, patch)
        }
    };
}

pub(crate) use drawable_common;
