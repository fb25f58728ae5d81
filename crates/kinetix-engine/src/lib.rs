//! # kinetix-engine
//!
//! The interactive half of Kinetix. An [`Engine`] owns the drawing surface and
//! the [`Scene`](kinetix_scene::Scene), advances the playback clock, rescales
//! the scene when the canvas is resized, and turns pointer input into
//! select/drag edits. Export drives the same `seek` + render cycle.

pub mod clock;
pub mod engine;
pub mod interaction;
pub mod presets;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, SELECTION_COLOR, SELECTION_LINE_WIDTH};
pub use interaction::{
    client_to_canvas, Interaction, PointerEvent, PointerKind, PointerPhase, PointerResponse,
};
pub use presets::{AspectRatio, ResolutionPreset, DURATION_PRESETS_SECS};
