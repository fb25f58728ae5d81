//! # kinetix-core
//!
//! Core types and primitives for the Kinetix animation engine.
//! This crate contains foundational types shared across all Kinetix crates:
//! frames, colors, geometry, durations, easing functions, configuration and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod math;
pub mod time;
pub mod types;

pub use config::*;

pub use color::Color;
pub use error::{KinetixError, KinetixResult};
pub use frame::{FrameBuffer, PixelFormat};
pub use math::{Affine, Point2D, Rect, Size2D};
pub use time::{Duration, Timestamp};
pub use types::Easing;
