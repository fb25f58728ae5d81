use std::f64::consts::{PI, TAU};

use kinetix_core::{Color, KinetixResult, Point2D};
use kinetix_render::Canvas;
use serde::{Deserialize, Serialize};

use crate::object::{drawable_common, Drawable, ObjectBase, ObjectKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterAnimation {
    #[default]
    Idle,
    Wave,
    Think,
    Walk,
    Explain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Costume {
    #[default]
    Casual,
    Suit,
    Superhero,
}

/// Limb angles in radians away from hanging straight down, plus a
/// vertical body offset.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pose {
    left_arm: f64,
    right_arm: f64,
    left_leg: f64,
    right_leg: f64,
    bob: f64,
    head_tilt: f64,
}

impl CharacterAnimation {
    fn pose(&self, time: f64) -> Pose {
        let phase = time / 1000.0 * TAU;
        let rest = Pose {
            left_arm: 0.15,
            right_arm: 0.15,
            left_leg: 0.05,
            right_leg: 0.05,
            bob: (phase * 0.5).sin() * 2.0,
            head_tilt: 0.0,
        };
        match self {
            CharacterAnimation::Idle => rest,
            CharacterAnimation::Wave => Pose {
                right_arm: PI * 0.8 + (phase * 2.0).sin() * 0.35,
                ..rest
            },
            CharacterAnimation::Think => Pose {
                right_arm: PI * 0.75,
                head_tilt: 0.15 + (phase * 0.5).sin() * 0.05,
                ..rest
            },
            CharacterAnimation::Walk => {
                let swing = phase.sin();
                Pose {
                    left_arm: -swing * 0.4,
                    right_arm: swing * 0.4,
                    left_leg: swing * 0.5,
                    right_leg: -swing * 0.5,
                    bob: -(phase * 2.0).sin().abs() * 3.0,
                    head_tilt: 0.0,
                }
            }
            CharacterAnimation::Explain => Pose {
                left_arm: 0.9 + (phase * 1.5).sin() * 0.3,
                right_arm: 0.6 - (phase * 1.5 + 1.0).sin() * 0.3,
                ..rest
            },
        }
    }
}

/// A procedurally drawn presenter figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterObject {
    #[serde(flatten)]
    pub base: ObjectBase,
    pub current_animation: CharacterAnimation,
    pub costume: Costume,
    pub skin_color: Color,
    pub hair_color: Color,
    pub costume_color: Color,
}

impl Default for CharacterObject {
    fn default() -> Self {
        Self {
            base: ObjectBase::default().with_size(120.0, 200.0),
            current_animation: CharacterAnimation::Idle,
            costume: Costume::Casual,
            skin_color: Color::parse_or("#f5d0a9", Color::WHITE),
            hair_color: Color::parse_or("#4a3728", Color::BLACK),
            costume_color: Color::parse_or("#3b82f6", Color::BLUE),
        }
    }
}

/// End point of a limb hanging from `origin`, rotated outward by `angle`.
fn limb_end(origin: Point2D, angle: f64, length: f64, outward: f64) -> Point2D {
    Point2D::new(
        origin.x + outward * angle.sin() * length,
        origin.y + angle.cos() * length,
    )
}

impl CharacterObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(ObjectKind::Character, name).with_size(120.0, 200.0),
            ..Default::default()
        }
    }

    fn paint(&self, canvas: &mut Canvas, pose: &Pose) {
        let (w, h) = (self.base.width, self.base.height);
        let limb = w * 0.09;
        let dark = Color::parse_or("#1f2937", Color::BLACK);

        canvas.translate(0.0, pose.bob);

        let shoulder_y = h * 0.32;
        let hip_y = h * 0.6;
        let left_shoulder = Point2D::new(w * 0.32, shoulder_y);
        let right_shoulder = Point2D::new(w * 0.68, shoulder_y);
        let left_hip = Point2D::new(w * 0.42, hip_y);
        let right_hip = Point2D::new(w * 0.58, hip_y);

        if self.costume == Costume::Superhero {
            canvas.fill_polygon(
                &[
                    Point2D::new(w * 0.3, shoulder_y - h * 0.02),
                    Point2D::new(w * 0.7, shoulder_y - h * 0.02),
                    Point2D::new(w * 0.85, h * 0.8),
                    Point2D::new(w * 0.15, h * 0.8),
                ],
                self.costume_color.shade(0.7),
            );
        }

        let leg_color = match self.costume {
            Costume::Casual => dark,
            Costume::Suit => Color::parse_or("#111827", Color::BLACK),
            Costume::Superhero => self.costume_color,
        };
        let leg_len = h * 0.36;
        for (hip, angle, dir) in [
            (left_hip, pose.left_leg, -1.0),
            (right_hip, pose.right_leg, 1.0),
        ] {
            let foot = limb_end(hip, angle, leg_len, dir);
            canvas.stroke_line(hip.x, hip.y, foot.x, foot.y, limb * 1.2, leg_color);
        }

        let torso_color = match self.costume {
            Costume::Suit => dark,
            _ => self.costume_color,
        };
        canvas.fill_round_rect(w * 0.3, h * 0.28, w * 0.4, h * 0.34, w * 0.06, torso_color);
        match self.costume {
            Costume::Suit => {
                canvas.fill_polygon(
                    &[
                        Point2D::new(w * 0.42, h * 0.28),
                        Point2D::new(w * 0.58, h * 0.28),
                        Point2D::new(w * 0.5, h * 0.4),
                    ],
                    Color::WHITE,
                );
                canvas.fill_polygon(
                    &[
                        Point2D::new(w * 0.48, h * 0.3),
                        Point2D::new(w * 0.52, h * 0.3),
                        Point2D::new(w * 0.53, h * 0.46),
                        Point2D::new(w * 0.5, h * 0.49),
                        Point2D::new(w * 0.47, h * 0.46),
                    ],
                    self.costume_color,
                );
            }
            Costume::Superhero => {
                canvas.fill_circle(w * 0.5, h * 0.4, w * 0.08, Color::parse_or("#fbbf24", Color::WHITE));
            }
            Costume::Casual => {}
        }

        let arm_len = h * 0.26;
        let sleeve = match self.costume {
            Costume::Suit => dark,
            _ => self.costume_color,
        };
        for (shoulder, angle, dir) in [
            (left_shoulder, pose.left_arm, -1.0),
            (right_shoulder, pose.right_arm, 1.0),
        ] {
            let hand = limb_end(shoulder, angle, arm_len, dir);
            canvas.stroke_line(shoulder.x, shoulder.y, hand.x, hand.y, limb, sleeve);
            canvas.fill_circle(hand.x, hand.y, limb * 0.7, self.skin_color);
        }

        let head = Point2D::new(w * 0.5, h * 0.15);
        let r = w * 0.18;
        canvas.save();
        canvas.translate(head.x, head.y);
        canvas.rotate(pose.head_tilt);
        canvas.fill_circle(0.0, 0.0, r, self.skin_color);
        canvas.fill_pie(0.0, 0.0, r * 1.05, 0.0, PI, TAU, self.hair_color);
        canvas.fill_circle(-r * 0.35, r * 0.1, r * 0.1, Color::BLACK);
        canvas.fill_circle(r * 0.35, r * 0.1, r * 0.1, Color::BLACK);
        canvas.stroke_line(-r * 0.3, r * 0.5, r * 0.3, r * 0.5, r * 0.08, Color::BLACK);
        canvas.restore();
    }
}

impl Drawable for CharacterObject {
    drawable_common!(ObjectKind::Character);

    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()> {
        let state = self.base.visual_state(time);
        if state.is_hidden() || !(self.base.width > 0.0 && self.base.height > 0.0) {
            return Ok(());
        }
        let pose = self.current_animation.pose(time);
        canvas.save();
        self.base.apply_transform(canvas, &state);
        self.paint(canvas, &pose);
        canvas.restore();
        Ok(())
    }
}
