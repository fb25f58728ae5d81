//! # kinetix-render
//!
//! The drawing surface used by every scene object. `Canvas` is a CPU-only,
//! deterministic 2D context: a state stack with an affine transform, global
//! alpha and clip rects, filled and stroked primitives, and text.
//! Identical draw calls always produce identical pixels.

pub mod canvas;
pub mod text;

pub use canvas::{Canvas, TextStyle};
pub use text::{TextAlign, TextMetrics, TextRenderer};
