use kinetix_core::{Color, FrameBuffer, KinetixConfig, KinetixError, KinetixResult, Point2D, Rect};
use kinetix_render::Canvas;
use kinetix_scene::{ObjectId, Rescale, Scene};

use crate::clock::{Clock, SystemClock};
use crate::interaction::{self, Interaction, PointerEvent, PointerKind, PointerPhase, PointerResponse};

/// Outline color of the selection overlay (`#3b82f6`).
pub const SELECTION_COLOR: Color = Color::rgb(59.0 / 255.0, 130.0 / 255.0, 246.0 / 255.0);
pub const SELECTION_LINE_WIDTH: f64 = 2.0;

const DEFAULT_DURATION_MS: f64 = 5000.0;

type TimeListener = Box<dyn FnMut(f64) + Send>;
type PlayStateListener = Box<dyn FnMut(bool) + Send>;
type SelectionListener = Box<dyn FnMut(Option<&ObjectId>) + Send>;
type ObjectListener = Box<dyn FnMut() + Send>;
type ResizeListener = Box<dyn FnMut(u32, u32) + Send>;

#[derive(Default)]
struct Listeners {
    time_update: Option<TimeListener>,
    play_state: Option<PlayStateListener>,
    selection: Option<SelectionListener>,
    object_change: Option<ObjectListener>,
    resize: Option<ResizeListener>,
}

/// Owns the drawing surface and the scene and drives both from a single
/// timeline position.
///
/// Everything happens on the caller's thread: the host calls [`Engine::tick`]
/// once per display frame while playing, and pointer events as they arrive.
pub struct Engine {
    canvas: Canvas,
    scene: Scene,
    clock: Box<dyn Clock>,
    current_time: f64,
    total_duration: f64,
    is_playing: bool,
    is_looping: bool,
    playback_rate: f64,
    last_frame: f64,
    selected: Option<ObjectId>,
    interaction: Interaction,
    overlay_enabled: bool,
    listeners: Listeners,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scene", &self.scene)
            .field("current_time", &self.current_time)
            .field("total_duration", &self.total_duration)
            .field("is_playing", &self.is_playing)
            .field("is_looping", &self.is_looping)
            .field("playback_rate", &self.playback_rate)
            .field("selected", &self.selected)
            .field("interaction", &self.interaction)
            .finish()
    }
}

impl Engine {
    /// Create an engine drawing into `canvas`. Without a surface there is
    /// nothing to render to, which is fatal.
    ///
    /// The scene starts at 0×0; the first [`Engine::resize`] sets its size
    /// without rescaling anything.
    pub fn new(canvas: Option<Canvas>) -> KinetixResult<Self> {
        let canvas =
            canvas.ok_or_else(|| KinetixError::Init("no drawing surface available".to_string()))?;
        let clock = SystemClock::new();
        let mut engine = Self {
            canvas,
            scene: Scene::default(),
            last_frame: clock.now_ms(),
            clock: Box::new(clock),
            current_time: 0.0,
            total_duration: DEFAULT_DURATION_MS,
            is_playing: false,
            is_looping: true,
            playback_rate: 1.0,
            selected: None,
            interaction: Interaction::Idle,
            overlay_enabled: true,
            listeners: Listeners::default(),
        };
        engine.render();
        Ok(engine)
    }

    /// Create an engine with canvas size, background and playback settings
    /// taken from `config`.
    pub fn from_config(canvas: Option<Canvas>, config: &KinetixConfig) -> KinetixResult<Self> {
        let mut engine = Self::new(canvas)?;
        engine
            .scene
            .set_background(Color::parse_or(&config.canvas.background, Color::BLACK));
        engine.set_total_duration(config.canvas.duration_ms);
        engine.set_looping(config.playback.looping);
        engine.set_playback_rate(config.playback.playback_rate);
        engine.resize(config.canvas.width, config.canvas.height);
        Ok(engine)
    }

    /// Replace the wall clock used by [`Engine::tick`].
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.last_frame = clock.now_ms();
        self.clock = Box::new(clock);
        self
    }

    // --- Read-only state ---

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn selected_object_id(&self) -> Option<&ObjectId> {
        self.selected.as_ref()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    // --- Listeners ---

    pub fn on_time_update(&mut self, f: impl FnMut(f64) + Send + 'static) {
        self.listeners.time_update = Some(Box::new(f));
    }

    pub fn on_play_state_change(&mut self, f: impl FnMut(bool) + Send + 'static) {
        self.listeners.play_state = Some(Box::new(f));
    }

    pub fn on_selection_change(&mut self, f: impl FnMut(Option<&ObjectId>) + Send + 'static) {
        self.listeners.selection = Some(Box::new(f));
    }

    pub fn on_object_change(&mut self, f: impl FnMut() + Send + 'static) {
        self.listeners.object_change = Some(Box::new(f));
    }

    pub fn on_resize(&mut self, f: impl FnMut(u32, u32) + Send + 'static) {
        self.listeners.resize = Some(Box::new(f));
    }

    fn emit_time(&mut self) {
        let time = self.current_time;
        if let Some(f) = self.listeners.time_update.as_mut() {
            f(time);
        }
    }

    fn emit_play_state(&mut self) {
        let playing = self.is_playing;
        if let Some(f) = self.listeners.play_state.as_mut() {
            f(playing);
        }
    }

    fn emit_selection(&mut self) {
        if let Some(f) = self.listeners.selection.as_mut() {
            f(self.selected.as_ref());
        }
    }

    fn emit_object_change(&mut self) {
        if let Some(f) = self.listeners.object_change.as_mut() {
            f();
        }
    }

    // --- Playback ---

    /// Start advancing time. Restarts from 0 when already at the end.
    pub fn play(&mut self) {
        if self.is_playing {
            return;
        }
        if self.current_time >= self.total_duration {
            self.current_time = 0.0;
        }
        self.is_playing = true;
        self.last_frame = self.clock.now_ms();
        tracing::debug!(time = self.current_time, "playback started");
        self.emit_play_state();
    }

    pub fn pause(&mut self) {
        if !self.is_playing {
            return;
        }
        self.is_playing = false;
        tracing::debug!(time = self.current_time, "playback paused");
        self.emit_play_state();
    }

    /// Jump to `time` (clamped to the timeline) and render immediately.
    pub fn seek(&mut self, time: f64) {
        let time = if time.is_nan() { 0.0 } else { time };
        self.current_time = time.clamp(0.0, self.total_duration);
        self.render();
        self.emit_time();
    }

    /// Advance by the wall-clock time since the previous tick, scaled by the
    /// playback rate. At the end of the timeline, wraps to 0 when looping and
    /// otherwise stops there. Returns whether playback is still running.
    pub fn tick(&mut self) -> bool {
        if !self.is_playing {
            return false;
        }
        let now = self.clock.now_ms();
        let dt = (now - self.last_frame).max(0.0);
        self.last_frame = now;

        let mut next = self.current_time + dt * self.playback_rate;
        let mut stop = false;
        if next >= self.total_duration {
            if self.is_looping {
                next = 0.0;
            } else {
                next = self.total_duration;
                stop = true;
            }
        }
        if stop {
            self.is_playing = false;
            self.emit_play_state();
        }

        self.current_time = next;
        self.render();
        self.emit_time();
        self.is_playing
    }

    pub fn set_total_duration(&mut self, ms: f64) {
        if !ms.is_finite() || ms <= 0.0 {
            tracing::warn!(duration = ms, "ignoring non-positive timeline duration");
            return;
        }
        self.total_duration = ms;
        if self.current_time > ms {
            self.current_time = ms;
            self.emit_time();
        }
        self.render();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.is_looping = looping;
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!(rate, "ignoring invalid playback rate");
            return;
        }
        self.playback_rate = rate;
    }

    // --- Rendering ---

    /// Render the scene at the current time, then the selection outline when
    /// paused.
    pub fn render(&mut self) {
        self.scene.render(&mut self.canvas, self.current_time);

        if !self.overlay_enabled || self.is_playing {
            return;
        }
        let bounds = self
            .selected
            .as_ref()
            .and_then(|id| self.scene.get(id.as_str()))
            .map(|o| o.base().bounds());
        if let Some(b) = bounds {
            self.canvas
                .stroke_rect(b.x, b.y, b.width, b.height, SELECTION_LINE_WIDTH, SELECTION_COLOR);
        }
    }

    /// Turn the selection outline off, e.g. while capturing frames for export.
    pub fn set_overlay_enabled(&mut self, enabled: bool) {
        if self.overlay_enabled != enabled {
            self.overlay_enabled = enabled;
            self.render();
        }
    }

    /// Copy of the last rendered frame.
    pub fn capture_frame(&self) -> FrameBuffer {
        self.canvas.snapshot()
    }

    // --- Resize ---

    /// Resize the canvas. Object positions scale per axis; sizes, fonts and
    /// paddings scale uniformly by the smaller factor. The first resize of a
    /// 0×0 scene only sets its size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::warn!(width, height, "ignoring resize to an empty canvas");
            return;
        }
        let (old_w, old_h) = (self.scene.width(), self.scene.height());
        self.canvas.resize(width, height);
        self.scene.set_size(width, height);

        if old_w != 0 && old_h != 0 {
            let rescale = Rescale::new(width as f64 / old_w as f64, height as f64 / old_h as f64);
            tracing::debug!(sx = rescale.sx, sy = rescale.sy, "rescaling scene");
            self.scene.rescale_objects(&rescale);
        }

        self.render();
        if let Some(f) = self.listeners.resize.as_mut() {
            f(width, height);
        }
    }

    // --- Scene editing ---

    /// Mutate the scene. If anything changed, re-render and notify the
    /// object-change listener; a selection pointing at a removed object is
    /// cleared.
    pub fn edit_scene<R>(&mut self, f: impl FnOnce(&mut Scene) -> R) -> R {
        let before = self.scene.revision();
        let result = f(&mut self.scene);
        if self.scene.revision() != before {
            self.after_scene_change();
        }
        result
    }

    fn after_scene_change(&mut self) {
        let stale = self
            .selected
            .as_ref()
            .is_some_and(|id| self.scene.get(id.as_str()).is_none());
        if stale {
            self.selected = None;
            self.interaction = Interaction::Idle;
            self.emit_selection();
        }
        let (w, h) = (self.scene.width(), self.scene.height());
        if w > 0 && h > 0 && (w, h) != (self.canvas.width(), self.canvas.height()) {
            self.canvas.resize(w, h);
        }
        self.render();
        self.emit_object_change();
    }

    pub fn set_background(&mut self, color: Color) {
        self.edit_scene(|scene| scene.set_background(color));
    }

    /// Select an object (or clear with `None`). Unknown ids clear the
    /// selection.
    pub fn select_object(&mut self, id: Option<ObjectId>) {
        let id = id.filter(|id| self.scene.get(id.as_str()).is_some());
        if self.interaction.target() != id.as_ref() {
            self.interaction = Interaction::Idle;
        }
        self.selected = id;
        self.render();
        self.emit_selection();
    }

    /// Duplicate the selected object and select the copy.
    pub fn duplicate_selected(&mut self) -> Option<ObjectId> {
        let id = self.selected.clone()?;
        let copy = self.edit_scene(|scene| scene.duplicate(id.as_str()))?;
        self.select_object(Some(copy.clone()));
        Some(copy)
    }

    pub fn delete_selected(&mut self) -> bool {
        let Some(id) = self.selected.clone() else {
            return false;
        };
        self.edit_scene(|scene| scene.remove(id.as_str())).is_some()
    }

    // --- Pointer input ---

    /// Feed one pointer event (canvas coordinates) through the select/drag
    /// state machine.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> PointerResponse {
        match event.phase {
            PointerPhase::Down => self.pointer_down(event),
            PointerPhase::Move => self.pointer_move(event),
            PointerPhase::Up => self.pointer_up(),
        }
    }

    fn pointer_down(&mut self, event: PointerEvent) -> PointerResponse {
        let hit = self.scene.hit_test(event.x, event.y);
        let previous = self.selected.clone();
        self.select_object(hit.clone());

        if let Some(id) = hit {
            if let Some(object) = self.scene.get(id.as_str()) {
                let base = object.base();
                self.interaction = Interaction::Dragging {
                    target: id,
                    pointer_start: event.position(),
                    object_start: Point2D::new(base.x, base.y),
                };
            }
        }

        PointerResponse {
            prevent_default: event.kind == PointerKind::Touch,
            changed: previous != self.selected,
        }
    }

    fn pointer_move(&mut self, event: PointerEvent) -> PointerResponse {
        let Some(position) = self.interaction.drag_position(event.position()) else {
            return PointerResponse::default();
        };
        let Some(target) = self.interaction.target().cloned() else {
            return PointerResponse::default();
        };
        if self.selected.as_ref() != Some(&target) {
            return PointerResponse::default();
        }

        self.edit_scene(|scene| {
            scene.update_object(target.as_str(), |o| {
                let base = o.base_mut();
                base.x = position.x;
                base.y = position.y;
            })
        });

        PointerResponse {
            prevent_default: event.kind == PointerKind::Touch,
            changed: true,
        }
    }

    fn pointer_up(&mut self) -> PointerResponse {
        self.interaction = Interaction::Idle;
        PointerResponse::default()
    }

    /// Map viewport coordinates onto the canvas, for hosts whose canvas is
    /// displayed at a different size than its pixel resolution.
    pub fn client_to_canvas(&self, client: Point2D, viewport: Rect) -> Point2D {
        interaction::client_to_canvas(client, viewport, self.canvas.width(), self.canvas.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use kinetix_render::TextRenderer;
    use kinetix_scene::factory::{self, boxed};
    use std::sync::{Arc, Mutex};

    fn engine(clock: &ManualClock) -> Engine {
        let canvas = Canvas::with_text_renderer(320, 180, Arc::new(TextRenderer::new()));
        let mut e = Engine::new(Some(canvas)).unwrap().with_clock(clock.clone());
        e.resize(320, 180);
        e
    }

    #[test]
    fn test_missing_surface_is_fatal() {
        let err = Engine::new(None).unwrap_err();
        assert!(matches!(err, KinetixError::Init(_)));
    }

    #[test]
    fn test_seek_clamps() {
        let mut e = engine(&ManualClock::new());
        e.seek(-100.0);
        assert_eq!(e.current_time(), 0.0);
        e.seek(e.total_duration() + 1000.0);
        assert_eq!(e.current_time(), 5000.0);
        e.seek(f64::NAN);
        assert_eq!(e.current_time(), 0.0);
    }

    #[test]
    fn test_tick_scales_by_rate() {
        let clock = ManualClock::new();
        let mut e = engine(&clock);
        e.set_playback_rate(2.0);
        e.play();
        clock.advance(100.0);
        assert!(e.tick());
        assert_eq!(e.current_time(), 200.0);
    }

    #[test]
    fn test_tick_does_nothing_when_paused() {
        let clock = ManualClock::new();
        let mut e = engine(&clock);
        clock.advance(100.0);
        assert!(!e.tick());
        assert_eq!(e.current_time(), 0.0);
    }

    #[test]
    fn test_loop_wraps_to_zero() {
        let clock = ManualClock::new();
        let mut e = engine(&clock);
        e.seek(4900.0);
        e.play();
        clock.advance(200.0);
        assert!(e.tick());
        assert_eq!(e.current_time(), 0.0);
        assert!(e.is_playing());
    }

    #[test]
    fn test_no_loop_clamps_and_stops() {
        let clock = ManualClock::new();
        let mut e = engine(&clock);
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        e.on_play_state_change(move |p| sink.lock().unwrap().push(p));
        e.set_looping(false);
        e.seek(4900.0);
        e.play();
        clock.advance(200.0);
        assert!(!e.tick());
        assert_eq!(e.current_time(), 5000.0);
        assert!(!e.is_playing());
        assert_eq!(*states.lock().unwrap(), vec![true, false]);

        // Playing again from the end restarts.
        e.play();
        assert_eq!(e.current_time(), 0.0);
    }

    #[test]
    fn test_selection_overlay_only_when_paused() {
        let clock = ManualClock::new();
        let mut e = engine(&clock);
        let id = e.edit_scene(|s| {
            let mut ch = factory::character(s);
            ch.base.x = 50.0;
            ch.base.y = 10.0;
            s.add(boxed(ch))
        });
        e.select_object(Some(id));
        let paused = e.capture_frame();
        let edge = paused.get_pixel(50, 100).unwrap();
        assert_eq!(edge, [59, 130, 246, 255]);

        e.play();
        e.render();
        assert_ne!(e.capture_frame().get_pixel(50, 100).unwrap(), [59, 130, 246, 255]);

        e.pause();
        e.set_overlay_enabled(false);
        assert_ne!(e.capture_frame().get_pixel(50, 100).unwrap(), [59, 130, 246, 255]);
    }

    #[test]
    fn test_unknown_selection_clears() {
        let mut e = engine(&ManualClock::new());
        e.select_object(Some(ObjectId::new("ghost")));
        assert!(e.selected_object_id().is_none());
    }

    #[test]
    fn test_delete_and_duplicate_selected() {
        let mut e = engine(&ManualClock::new());
        assert!(!e.delete_selected());
        assert!(e.duplicate_selected().is_none());

        let id = e.edit_scene(|s| s.add(boxed(factory::heading(s))));
        e.select_object(Some(id.clone()));
        let copy = e.duplicate_selected().unwrap();
        assert_eq!(e.selected_object_id(), Some(&copy));
        assert_eq!(e.scene().len(), 2);

        assert!(e.delete_selected());
        assert!(e.selected_object_id().is_none());
        assert_eq!(e.scene().len(), 1);
        assert!(e.scene().get(id.as_str()).is_some());
    }

    #[test]
    fn test_edit_scene_notifies_only_on_change() {
        let mut e = engine(&ManualClock::new());
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        e.on_object_change(move || *sink.lock().unwrap() += 1);

        e.edit_scene(|s| s.move_up("nothing"));
        assert_eq!(*count.lock().unwrap(), 0);
        e.set_background(Color::WHITE);
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(e.capture_frame().get_pixel(0, 0), Some([255, 255, 255, 255]));
    }
}
