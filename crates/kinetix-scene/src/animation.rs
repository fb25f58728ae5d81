//! Enter/exit presets and their resolution at a point on the timeline.
//!
//! Presets are declarative: an object stores `{ type, duration, delay }` and
//! [`resolve`] turns that into a [`VisualState`] for one instant. Nothing is
//! accumulated between calls, so the same time always yields the same state.

use kinetix_core::Easing;
use serde::{Deserialize, Serialize};

/// Distance in pixels covered by the slide presets.
pub const SLIDE_DISTANCE: f64 = 50.0;

const DEFAULT_DURATION_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnterKind {
    #[default]
    None,
    FadeIn,
    SlideUp,
    SlideLeft,
    SlideRight,
    ScaleIn,
    Typewriter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitKind {
    #[default]
    None,
    FadeOut,
    SlideDown,
    ScaleOut,
}

/// How an object appears. `delay` is measured from timeline zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnterAnimation {
    #[serde(rename = "type")]
    pub kind: EnterKind,
    pub duration: f64,
    pub delay: f64,
}

impl EnterAnimation {
    pub fn new(kind: EnterKind, duration: f64, delay: f64) -> Self {
        Self {
            kind,
            duration,
            delay,
        }
    }

    /// Whether `time` falls before the animation starts.
    pub fn is_pending(&self, time: f64) -> bool {
        self.kind != EnterKind::None && time < self.delay
    }

    /// Linear progress through the animation, clamped to `[0, 1]`.
    pub fn progress(&self, time: f64) -> f64 {
        progress_at(time, self.delay, self.duration)
    }
}

impl Default for EnterAnimation {
    fn default() -> Self {
        Self::new(EnterKind::None, DEFAULT_DURATION_MS, 0.0)
    }
}

/// How an object leaves. `delay` is the absolute time at which the exit starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitAnimation {
    #[serde(rename = "type")]
    pub kind: ExitKind,
    pub duration: f64,
    pub delay: f64,
}

impl ExitAnimation {
    pub fn new(kind: ExitKind, duration: f64, delay: f64) -> Self {
        Self {
            kind,
            duration,
            delay,
        }
    }

    pub fn progress(&self, time: f64) -> f64 {
        progress_at(time, self.delay, self.duration)
    }
}

impl Default for ExitAnimation {
    fn default() -> Self {
        Self::new(ExitKind::None, DEFAULT_DURATION_MS, 0.0)
    }
}

/// Derived appearance of an object at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub opacity: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
    /// Fraction of text-like content revealed.
    pub reveal: f64,
}

impl VisualState {
    pub const RESOLVED: VisualState = VisualState {
        opacity: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
        scale: 1.0,
        reveal: 1.0,
    };

    pub fn is_hidden(&self) -> bool {
        self.opacity <= 0.0 || self.scale <= 0.0
    }

    /// Number of characters shown out of `len`: `floor(len * reveal)`.
    pub fn reveal_count(&self, len: usize) -> usize {
        ((len as f64 * self.reveal).floor().max(0.0) as usize).min(len)
    }
}

impl Default for VisualState {
    fn default() -> Self {
        Self::RESOLVED
    }
}

fn progress_at(time: f64, delay: f64, duration: f64) -> f64 {
    let t = time - delay;
    if t.is_nan() {
        return 0.0;
    }
    if !(duration > 0.0) {
        return if t >= 0.0 { 1.0 } else { 0.0 };
    }
    (t / duration).clamp(0.0, 1.0)
}

/// Resolve both presets at `time`.
pub fn resolve(
    enter: &EnterAnimation,
    exit: &ExitAnimation,
    easing: Easing,
    time: f64,
) -> VisualState {
    let mut state = VisualState::RESOLVED;

    if enter.is_pending(time) {
        state.opacity = 0.0;
        state.reveal = 0.0;
        return state;
    }

    let p = enter.progress(time);
    let ease = easing.apply(p);
    match enter.kind {
        EnterKind::None => {}
        EnterKind::FadeIn => state.opacity = p,
        EnterKind::SlideUp => {
            state.opacity = p;
            state.offset_y = SLIDE_DISTANCE * (1.0 - ease);
        }
        EnterKind::SlideLeft => {
            state.opacity = p;
            state.offset_x = SLIDE_DISTANCE * (1.0 - ease);
        }
        EnterKind::SlideRight => {
            state.opacity = p;
            state.offset_x = -SLIDE_DISTANCE * (1.0 - ease);
        }
        EnterKind::ScaleIn => {
            state.opacity = p;
            state.scale = ease;
        }
        EnterKind::Typewriter => state.reveal = p,
    }

    if exit.kind != ExitKind::None {
        let p = exit.progress(time);
        let ease = easing.apply(p);
        match exit.kind {
            ExitKind::None => {}
            ExitKind::FadeOut => state.opacity *= 1.0 - p,
            ExitKind::SlideDown => {
                state.opacity *= 1.0 - p;
                state.offset_y += SLIDE_DISTANCE * ease;
            }
            ExitKind::ScaleOut => {
                state.opacity *= 1.0 - p;
                state.scale *= 1.0 - ease;
            }
        }
    }

    state
}
