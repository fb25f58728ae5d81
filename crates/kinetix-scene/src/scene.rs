use std::panic::{self, AssertUnwindSafe};

use kinetix_core::{Color, KinetixError, KinetixResult};
use kinetix_render::Canvas;
use serde_json::Value;

use crate::object::{Drawable, ObjectId, Rescale};

/// What changed in a [`Scene`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneChange {
    Added(ObjectId),
    Removed(ObjectId),
    Reordered,
    Updated(ObjectId),
    /// Size or background changed.
    Settings,
    /// An external editor mutated objects directly.
    Touched,
}

pub type SceneObserver = Box<dyn FnMut(&SceneChange) + Send>;

/// An ordered stack of objects. Index 0 is painted first (bottom); the last
/// object is on top. The order is the only z-order.
pub struct Scene {
    width: u32,
    height: u32,
    background: Color,
    objects: Vec<Box<dyn Drawable>>,
    revision: u64,
    observer: Option<SceneObserver>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("background", &self.background)
            .field("objects", &self.objects.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: Color::BLACK,
            objects: Vec::new(),
            revision: 0,
            observer: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Incremented on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn objects(&self) -> &[Box<dyn Drawable>] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Install the single change listener, replacing any previous one.
    pub fn subscribe(&mut self, observer: SceneObserver) {
        self.observer = Some(observer);
    }

    pub fn unsubscribe(&mut self) {
        self.observer = None;
    }

    fn notify(&mut self, change: SceneChange) {
        self.revision += 1;
        if let Some(observer) = self.observer.as_mut() {
            observer(&change);
        }
    }

    /// Signal that objects were edited in place through [`Scene::get_mut`].
    pub fn notify_changed(&mut self) {
        self.notify(SceneChange::Touched);
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
        self.notify(SceneChange::Settings);
    }

    /// Change the canvas dimensions without touching object geometry.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.notify(SceneChange::Settings);
    }

    /// Rescale every object after a canvas resize.
    pub fn rescale_objects(&mut self, rescale: &Rescale) {
        for object in &mut self.objects {
            object.rescale(rescale);
        }
    }

    pub fn add(&mut self, object: Box<dyn Drawable>) -> ObjectId {
        let id = object.base().id.clone();
        self.objects.push(object);
        self.notify(SceneChange::Added(id.clone()));
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Box<dyn Drawable>> {
        let index = self.index_of(id)?;
        let object = self.objects.remove(index);
        self.notify(SceneChange::Removed(object.base().id.clone()));
        Some(object)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Drawable> {
        self.objects
            .iter()
            .find(|o| o.id() == id)
            .map(|o| o.as_ref())
    }

    /// Direct mutable access. Call [`Scene::notify_changed`] afterwards, or
    /// use [`Scene::update_object`] which notifies for you.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut dyn Drawable> {
        match self.objects.iter_mut().find(|o| o.id() == id) {
            Some(o) => Some(o.as_mut()),
            None => None,
        }
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    /// Mutate one object and notify the observer.
    pub fn update_object<R>(&mut self, id: &str, f: impl FnOnce(&mut dyn Drawable) -> R) -> Option<R> {
        let index = self.index_of(id)?;
        let result = f(self.objects[index].as_mut());
        let id = self.objects[index].base().id.clone();
        self.notify(SceneChange::Updated(id));
        Some(result)
    }

    /// Apply a property patch from an editor.
    pub fn update_properties(&mut self, id: &str, patch: &Value) -> KinetixResult<()> {
        self.update_object(id, |o| o.update_properties(patch))
            .ok_or_else(|| KinetixError::InvalidArgument(format!("no object with id '{}'", id)))?
    }

    /// Swap with the next object (towards the top). No-op at the top.
    pub fn move_up(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(i) if i + 1 < self.objects.len() => {
                self.objects.swap(i, i + 1);
                self.notify(SceneChange::Reordered);
                true
            }
            _ => false,
        }
    }

    /// Swap with the previous object (towards the bottom). No-op at the bottom.
    pub fn move_down(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                self.objects.swap(i, i - 1);
                self.notify(SceneChange::Reordered);
                true
            }
            _ => false,
        }
    }

    /// Move to `index`, clamped to the stack. Used by drag-to-reorder layer lists.
    pub fn move_to(&mut self, id: &str, index: usize) -> bool {
        let Some(from) = self.index_of(id) else {
            return false;
        };
        let to = index.min(self.objects.len() - 1);
        if from == to {
            return false;
        }
        let object = self.objects.remove(from);
        self.objects.insert(to, object);
        self.notify(SceneChange::Reordered);
        true
    }

    /// Insert a copy directly above the source.
    pub fn duplicate(&mut self, id: &str) -> Option<ObjectId> {
        let index = self.index_of(id)?;
        let copy = self.objects[index].clone_object();
        let new_id = copy.base().id.clone();
        self.objects.insert(index + 1, copy);
        self.notify(SceneChange::Added(new_id.clone()));
        Some(new_id)
    }

    /// Top-most visible, unlocked object under the point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .filter(|o| o.base().visible && !o.base().locked)
            .find(|o| o.hit_test(x, y))
            .map(|o| o.base().id.clone())
    }

    /// Clear to the background and paint visible objects bottom to top.
    ///
    /// A failing object is logged and skipped so the rest of the frame still
    /// renders; the ids of failed objects are returned.
    pub fn render(&mut self, canvas: &mut Canvas, time: f64) -> Vec<ObjectId> {
        canvas.reset_state();
        canvas.clear(self.background);
        let mut failed = Vec::new();

        for object in self.objects.iter_mut().filter(|o| o.base().visible) {
            let depth = canvas.depth();
            canvas.save();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| object.draw(canvas, time)));
            canvas.restore_to(depth);

            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic while drawing".to_string()),
            };
            tracing::warn!(
                object = %object.base().id,
                kind = %object.kind(),
                time,
                "skipping object that failed to draw: {}",
                error
            );
            failed.push(object.base().id.clone());
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectBase, ObjectKind};
    use crate::objects::TextObject;
    use kinetix_core::KinetixResult;
    use kinetix_render::TextRenderer;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Block {
        base: ObjectBase,
        color: Color,
        fail: Option<&'static str>,
    }

    impl Block {
        fn new(name: &str, x: f64, color: Color) -> Box<Self> {
            Box::new(Self {
                base: ObjectBase::new(ObjectKind::Chart, name)
                    .with_position(x, 0.0)
                    .with_size(10.0, 10.0),
                color,
                fail: None,
            })
        }
    }

    impl Drawable for Block {
        fn kind(&self) -> ObjectKind {
            ObjectKind::Chart
        }
        fn base(&self) -> &ObjectBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ObjectBase {
            &mut self.base
        }
        fn draw(&mut self, canvas: &mut Canvas, _time: f64) -> KinetixResult<()> {
            match self.fail {
                Some("panic") => panic!("block exploded"),
                Some(msg) => Err(KinetixError::Render(msg.to_string())),
                None => {
                    let b = self.base.bounds();
                    canvas.fill_rect(b.x, b.y, b.width, b.height, self.color);
                    Ok(())
                }
            }
        }
        fn clone_object(&self) -> Box<dyn Drawable> {
            let mut copy = self.clone();
            copy.base.make_duplicate(ObjectKind::Chart);
            Box::new(copy)
        }
        fn properties(&self) -> KinetixResult<Value> {
            Ok(Value::Null)
        }
        fn update_properties(&mut self, _patch: &Value) -> KinetixResult<()> {
            Ok(())
        }
    }

    fn names(scene: &Scene) -> Vec<String> {
        scene.objects().iter().map(|o| o.name().to_string()).collect()
    }

    fn canvas() -> Canvas {
        Canvas::with_text_renderer(40, 20, Arc::new(TextRenderer::new()))
    }

    #[test]
    fn test_add_get_remove() {
        let mut scene = Scene::new(100, 100);
        let id = scene.add(Block::new("a", 0.0, Color::RED));
        assert_eq!(scene.get(id.as_str()).map(|o| o.name()), Some("a"));
        assert!(scene.remove(id.as_str()).is_some());
        assert!(scene.get(id.as_str()).is_none());
        assert!(scene.remove(id.as_str()).is_none());
    }

    #[test]
    fn test_move_up_and_down_swap_adjacent() {
        let mut scene = Scene::new(100, 100);
        let a = scene.add(Block::new("a", 0.0, Color::RED));
        scene.add(Block::new("b", 0.0, Color::RED));
        let c = scene.add(Block::new("c", 0.0, Color::RED));

        assert!(scene.move_up(a.as_str()));
        assert_eq!(names(&scene), ["b", "a", "c"]);
        assert!(scene.move_down(c.as_str()));
        assert_eq!(names(&scene), ["b", "c", "a"]);
    }

    #[test]
    fn test_moves_at_edges_are_noops() {
        let mut scene = Scene::new(100, 100);
        let a = scene.add(Block::new("a", 0.0, Color::RED));
        let b = scene.add(Block::new("b", 0.0, Color::RED));
        let rev = scene.revision();
        assert!(!scene.move_down(a.as_str()));
        assert!(!scene.move_up(b.as_str()));
        assert!(!scene.move_up("missing"));
        assert_eq!(scene.revision(), rev);
        assert_eq!(names(&scene), ["a", "b"]);
    }

    #[test]
    fn test_move_to_clamps() {
        let mut scene = Scene::new(100, 100);
        let a = scene.add(Block::new("a", 0.0, Color::RED));
        scene.add(Block::new("b", 0.0, Color::RED));
        scene.add(Block::new("c", 0.0, Color::RED));
        assert!(scene.move_to(a.as_str(), 99));
        assert_eq!(names(&scene), ["b", "c", "a"]);
    }

    #[test]
    fn test_duplicate_inserts_above_source() {
        let mut scene = Scene::new(100, 100);
        let a = scene.add(Block::new("a", 0.0, Color::RED));
        scene.add(Block::new("b", 0.0, Color::RED));
        let copy = scene.duplicate(a.as_str()).unwrap();
        assert_eq!(names(&scene), ["a", "a (Copy)", "b"]);
        assert_eq!(scene.get(copy.as_str()).unwrap().base().x, 20.0);
    }

    #[test]
    fn test_observer_sees_every_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut scene = Scene::new(100, 100);
        scene.subscribe(Box::new(move |change| sink.lock().unwrap().push(change.clone())));

        let a = scene.add(Block::new("a", 0.0, Color::RED));
        scene.update_object(a.as_str(), |o| o.base_mut().x = 5.0);
        scene.set_background(Color::WHITE);
        scene.remove(a.as_str());

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                SceneChange::Added(a.clone()),
                SceneChange::Updated(a.clone()),
                SceneChange::Settings,
                SceneChange::Removed(a),
            ]
        );
        assert_eq!(scene.revision(), 4);
    }

    #[test]
    fn test_render_paints_in_order_and_skips_invisible() {
        let mut scene = Scene::new(40, 20);
        scene.add(Block::new("under", 0.0, Color::RED));
        scene.add(Block::new("over", 5.0, Color::BLUE));
        let mut hidden = Block::new("hidden", 20.0, Color::GREEN);
        hidden.base.visible = false;
        scene.add(hidden);

        let mut c = canvas();
        assert!(scene.render(&mut c, 0.0).is_empty());
        assert_eq!(c.frame().get_pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(c.frame().get_pixel(7, 2), Some([0, 0, 255, 255]));
        assert_eq!(c.frame().get_pixel(22, 2), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_failing_objects_do_not_blank_the_scene() {
        let mut scene = Scene::new(40, 20);
        scene.add(Block::new("ok", 0.0, Color::RED));
        let mut err = Block::new("err", 10.0, Color::GREEN);
        err.fail = Some("bad data");
        let err_id = scene.add(err);
        let mut boom = Block::new("boom", 20.0, Color::GREEN);
        boom.fail = Some("panic");
        let boom_id = scene.add(boom);
        scene.add(Block::new("after", 30.0, Color::BLUE));

        let mut c = canvas();
        let failed = scene.render(&mut c, 0.0);
        assert_eq!(failed, vec![err_id, boom_id]);
        assert_eq!(c.frame().get_pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(c.frame().get_pixel(32, 2), Some([0, 0, 255, 255]));
        assert_eq!(c.depth(), 0);
    }

    #[test]
    fn test_oversized_text_is_skipped_not_fatal() {
        let mut scene = Scene::new(200, 60);
        let big = TextObject::new("big", "Hello World").with_font("Inter", 200_000.0);
        let big = scene.add(Box::new(big));
        let mut normal = TextObject::new("normal", "Hi").with_font("Inter", 20.0);
        normal.base.x = 10.0;
        normal.base.y = 10.0;
        scene.add(Box::new(normal));

        let mut c = Canvas::with_text_renderer(200, 60, Arc::new(TextRenderer::new()));
        let failed = scene.render(&mut c, 0.0);
        assert_eq!(failed, vec![big]);
        assert!(c.frame().data.chunks_exact(4).any(|px| px[0] > 0));
        assert_eq!(c.depth(), 0);
    }

    #[test]
    fn test_hit_test_top_down_skips_locked_and_hidden() {
        let mut scene = Scene::new(100, 100);
        let bottom = scene.add(Block::new("bottom", 0.0, Color::RED));
        let top = scene.add(Block::new("top", 5.0, Color::RED));
        assert_eq!(scene.hit_test(7.0, 5.0), Some(top.clone()));
        scene.update_object(top.as_str(), |o| o.base_mut().locked = true);
        assert_eq!(scene.hit_test(7.0, 5.0), Some(bottom.clone()));
        scene.update_object(bottom.as_str(), |o| o.base_mut().visible = false);
        assert_eq!(scene.hit_test(7.0, 5.0), None);
    }

    #[test]
    fn test_update_properties_reports_missing_object() {
        let mut scene = Scene::new(100, 100);
        let id = scene.add(Box::new(TextObject::new("t", "x")));
        scene
            .update_properties(id.as_str(), &serde_json::json!({ "text": "y" }))
            .unwrap();
        assert!(scene
            .update_properties("nope", &serde_json::json!({}))
            .is_err());
    }
}
