//! The built-in showcase scene: one of every object kind, laid out relative
//! to the canvas so it works at any resolution.

use kinetix_scene::animation::{EnterAnimation, EnterKind, ExitAnimation, ExitKind};
use kinetix_scene::factory::{self, boxed, TextEffect};
use kinetix_scene::objects::{ChartStyle, ChartType, CodeTheme};
use kinetix_scene::Scene;

pub fn populate(scene: &mut Scene) {
    let (w, h) = (scene.width() as f64, scene.height() as f64);

    let mut title = factory::heading(scene);
    title.text = "Kinetix".to_string();
    title.base.x = w * 0.05;
    title.base.y = h * 0.05;
    title.base.enter_animation = EnterAnimation::new(EnterKind::Typewriter, 900.0, 0.0);
    scene.add(boxed(title));

    let mut badge = factory::text_effect(scene, TextEffect::Badge, None);
    badge.base.x = w * 0.05;
    badge.base.y = h * 0.2;
    badge.base.enter_animation = EnterAnimation::new(EnterKind::FadeIn, 500.0, 400.0);
    scene.add(boxed(badge));

    let mut bars = factory::chart(scene, ChartType::Bar);
    bars.base.x = w * 0.05;
    bars.base.y = h * 0.35;
    bars.base.enter_animation = EnterAnimation::new(EnterKind::SlideUp, 700.0, 200.0);
    scene.add(boxed(bars));

    let mut donut = factory::chart(scene, ChartType::Donut).with_style(ChartStyle::Scribble);
    donut.base.x = w * 0.3;
    donut.base.y = h * 0.35;
    donut.base.enter_animation = EnterAnimation::new(EnterKind::ScaleIn, 600.0, 500.0);
    scene.add(boxed(donut));

    let mut code = factory::code_block(scene).with_theme(CodeTheme::Dracula);
    code.base.x = w * 0.6;
    code.base.y = h * 0.05;
    code.base.enter_animation = EnterAnimation::new(EnterKind::SlideLeft, 600.0, 300.0);
    scene.add(boxed(code));

    let mut race = factory::bar_race(scene);
    race.base.x = w * 0.55;
    race.base.y = h * 0.42;
    scene.add(boxed(race));

    let mut hero = factory::character(scene);
    hero.base.x = w * 0.88;
    hero.base.y = h * 0.68;
    hero.base.exit_animation = ExitAnimation::new(ExitKind::FadeOut, 500.0, 4000.0);
    scene.add(boxed(hero));

    let mut particles = factory::particle_text(scene);
    particles.base.x = w * 0.05;
    particles.base.y = h * 0.8;
    particles.base.enter_animation = EnterAnimation::new(EnterKind::FadeIn, 1500.0, 0.0);
    scene.add(boxed(particles));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetix_scene::ObjectKind;

    #[test]
    fn test_showcase_has_every_kind() {
        let mut scene = Scene::new(1280, 720);
        populate(&mut scene);
        assert_eq!(scene.len(), 8);
        for kind in [
            ObjectKind::Text,
            ObjectKind::CodeBlock,
            ObjectKind::Chart,
            ObjectKind::BarChartRace,
            ObjectKind::Character,
            ObjectKind::ParticleText,
        ] {
            assert!(
                scene.objects().iter().any(|o| o.kind() == kind),
                "missing {:?}",
                kind
            );
        }
    }

    #[test]
    fn test_showcase_scales_with_canvas() {
        let mut small = Scene::new(640, 360);
        populate(&mut small);
        let mut large = Scene::new(1280, 720);
        populate(&mut large);
        let x = |s: &Scene| s.objects()[0].base().x;
        assert!((x(&large) - 2.0 * x(&small)).abs() < 1e-9);
    }
}
