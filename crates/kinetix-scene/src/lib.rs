//! # kinetix-scene
//!
//! The scene model for Kinetix. A [`Scene`] is an ordered stack of
//! [`Drawable`] objects; every object renders itself as a pure function of
//! the timeline position, so scrubbing, looping and exporting all see the
//! same pixels.

pub mod animation;
pub mod factory;
pub mod object;
pub mod objects;
pub mod scene;

pub use animation::{EnterAnimation, EnterKind, ExitAnimation, ExitKind, VisualState};
pub use object::{Drawable, ObjectBase, ObjectId, ObjectKind, Rescale};
pub use objects::{
    BarChartRaceObject, CharacterObject, ChartObject, CodeBlockObject, ParticleTextObject,
    TextObject,
};
pub use scene::{Scene, SceneChange};
