//! Pointer input and the select/drag state machine.
//!
//! Mouse and touch events are normalized into [`PointerEvent`]s in canvas
//! pixels. The engine keeps a single [`Interaction`]; only pointer-down can
//! start a drag and only pointer-up ends one.

use kinetix_core::{Point2D, Rect};
use kinetix_scene::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// A pointer sample in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, phase: PointerPhase, x: f64, y: f64) -> Self {
        Self { kind, phase, x, y }
    }

    pub fn mouse(phase: PointerPhase, x: f64, y: f64) -> Self {
        Self::new(PointerKind::Mouse, phase, x, y)
    }

    pub fn touch(phase: PointerPhase, x: f64, y: f64) -> Self {
        Self::new(PointerKind::Touch, phase, x, y)
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// What the host should do with the native event after the engine saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerResponse {
    /// Suppress the platform default (touch scrolling).
    pub prevent_default: bool,
    /// The selection or an object position changed.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging {
        target: ObjectId,
        pointer_start: Point2D,
        object_start: Point2D,
    },
}

impl Interaction {
    pub fn is_dragging(&self) -> bool {
        matches!(self, Interaction::Dragging { .. })
    }

    /// The object being dragged, if any.
    pub fn target(&self) -> Option<&ObjectId> {
        match self {
            Interaction::Idle => None,
            Interaction::Dragging { target, .. } => Some(target),
        }
    }

    /// Object position for the pointer at `pointer`, from the cumulative
    /// delta since the drag started.
    pub fn drag_position(&self, pointer: Point2D) -> Option<Point2D> {
        match self {
            Interaction::Idle => None,
            Interaction::Dragging {
                pointer_start,
                object_start,
                ..
            } => Some(Point2D::new(
                object_start.x + (pointer.x - pointer_start.x),
                object_start.y + (pointer.y - pointer_start.y),
            )),
        }
    }
}

/// Map a point in viewport (CSS) pixels onto canvas pixels, given where the
/// canvas element sits in the viewport. A zero-sized viewport maps to the
/// canvas origin.
pub fn client_to_canvas(client: Point2D, viewport: Rect, canvas_width: u32, canvas_height: u32) -> Point2D {
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return Point2D::zero();
    }
    let sx = canvas_width as f64 / viewport.width;
    let sy = canvas_height as f64 / viewport.height;
    Point2D::new((client.x - viewport.x) * sx, (client.y - viewport.y) * sy)
}
