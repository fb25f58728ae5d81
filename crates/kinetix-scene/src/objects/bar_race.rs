use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use kinetix_core::{Color, KinetixResult};
use kinetix_render::{Canvas, TextAlign, TextStyle};
use serde::{Deserialize, Serialize};

use crate::object::{drawable_common, finite_or, Drawable, ObjectBase, ObjectKind, Rescale};

const YEAR_SIZE: f64 = 60.0;
const LABEL_SIZE: f64 = 14.0;
const VALUE_SIZE: f64 = 12.0;
/// Horizontal space kept free for the value labels.
const LABEL_RESERVE: f64 = 150.0;
const HEADER_OFFSET: f64 = 40.0;

/// Values of every category at one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceKeyframe {
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

impl RaceKeyframe {
    pub fn new(year: i32, values: &[(&str, f64)]) -> Self {
        Self {
            year,
            values: values
                .iter()
                .map(|(label, v)| (label.to_string(), *v))
                .collect(),
        }
    }
}

/// One bar at a resolved instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub label: String,
    pub value: f64,
}

fn social_networks() -> Vec<RaceKeyframe> {
    vec![
        RaceKeyframe::new(
            2004,
            &[("Facebook", 1.0), ("MySpace", 5.0), ("Friendster", 3.0), ("Orkut", 2.0), ("LinkedIn", 0.5)],
        ),
        RaceKeyframe::new(
            2005,
            &[("Facebook", 5.0), ("MySpace", 20.0), ("Friendster", 5.0), ("Orkut", 8.0), ("LinkedIn", 2.0)],
        ),
        RaceKeyframe::new(
            2006,
            &[
                ("Facebook", 12.0),
                ("MySpace", 50.0),
                ("Friendster", 4.0),
                ("Orkut", 15.0),
                ("LinkedIn", 5.0),
                ("Twitter", 0.1),
            ],
        ),
        RaceKeyframe::new(
            2007,
            &[
                ("Facebook", 50.0),
                ("MySpace", 80.0),
                ("Friendster", 3.0),
                ("Orkut", 25.0),
                ("LinkedIn", 10.0),
                ("Twitter", 5.0),
            ],
        ),
        RaceKeyframe::new(
            2008,
            &[
                ("Facebook", 100.0),
                ("MySpace", 75.0),
                ("Friendster", 2.0),
                ("Orkut", 40.0),
                ("LinkedIn", 25.0),
                ("Twitter", 20.0),
            ],
        ),
        RaceKeyframe::new(
            2009,
            &[
                ("Facebook", 300.0),
                ("MySpace", 60.0),
                ("Friendster", 1.0),
                ("Orkut", 50.0),
                ("LinkedIn", 40.0),
                ("Twitter", 50.0),
            ],
        ),
        RaceKeyframe::new(
            2010,
            &[
                ("Facebook", 500.0),
                ("MySpace", 40.0),
                ("Instagram", 1.0),
                ("Orkut", 45.0),
                ("LinkedIn", 70.0),
                ("Twitter", 100.0),
            ],
        ),
        RaceKeyframe::new(
            2012,
            &[
                ("Facebook", 1000.0),
                ("Instagram", 50.0),
                ("Twitter", 200.0),
                ("LinkedIn", 150.0),
                ("Pinterest", 20.0),
            ],
        ),
        RaceKeyframe::new(
            2015,
            &[
                ("Facebook", 1500.0),
                ("Instagram", 400.0),
                ("Twitter", 300.0),
                ("LinkedIn", 300.0),
                ("Pinterest", 100.0),
                ("Snapchat", 100.0),
            ],
        ),
        RaceKeyframe::new(
            2018,
            &[
                ("Facebook", 2200.0),
                ("Instagram", 1000.0),
                ("Twitter", 350.0),
                ("LinkedIn", 500.0),
                ("TikTok", 200.0),
                ("Snapchat", 300.0),
            ],
        ),
        RaceKeyframe::new(
            2020,
            &[
                ("Facebook", 2700.0),
                ("Instagram", 1200.0),
                ("TikTok", 700.0),
                ("Twitter", 400.0),
                ("LinkedIn", 700.0),
                ("Snapchat", 400.0),
            ],
        ),
        RaceKeyframe::new(
            2023,
            &[
                ("Facebook", 3000.0),
                ("Instagram", 2000.0),
                ("TikTok", 1600.0),
                ("Twitter", 500.0),
                ("LinkedIn", 900.0),
                ("Snapchat", 750.0),
            ],
        ),
    ]
}

fn brand_colors() -> BTreeMap<String, Color> {
    [
        ("Facebook", "#1877F2"),
        ("MySpace", "#003399"),
        ("Friendster", "#CCCCCC"),
        ("Orkut", "#D6006D"),
        ("LinkedIn", "#0077B5"),
        ("Twitter", "#1DA1F2"),
        ("Instagram", "#E1306C"),
        ("Pinterest", "#BD081C"),
        ("Snapchat", "#FFFC00"),
        ("TikTok", "#000000"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), Color::parse_or(v, Color::BLACK)))
    .collect()
}

/// `1234567` -> `"1,234,567"`.
fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Animated ranking of categories across yearly keyframes.
///
/// Ranks are recomputed from scratch for every queried time and bars snap to
/// their new slot; there is no memory of the previous frame's order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarChartRaceObject {
    #[serde(flatten)]
    pub base: ObjectBase,
    pub keyframes: Vec<RaceKeyframe>,
    pub colors: BTreeMap<String, Color>,
    pub fallback_color: Color,
    pub max_bars: usize,
    pub bar_height: f64,
    pub gap: f64,
    pub label_color: Color,
    pub value_color: Color,
    pub font_family: String,
    /// Time taken to sweep from the first to the last keyframe.
    pub race_duration_ms: f64,
}

impl Default for BarChartRaceObject {
    fn default() -> Self {
        Self {
            base: ObjectBase::default().with_size(600.0, 400.0),
            keyframes: social_networks(),
            colors: brand_colors(),
            fallback_color: Color::parse_or("#999999", Color::BLACK),
            max_bars: 8,
            bar_height: 40.0,
            gap: 10.0,
            label_color: Color::parse_or("#333333", Color::BLACK),
            value_color: Color::parse_or("#666666", Color::BLACK),
            font_family: "Inter".to_string(),
            race_duration_ms: 10_000.0,
        }
    }
}

impl BarChartRaceObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(ObjectKind::BarChartRace, name).with_size(600.0, 400.0),
            ..Default::default()
        }
    }

    /// Keyframes in year order, whatever order they were edited in.
    fn ordered_keyframes(&self) -> Cow<'_, [RaceKeyframe]> {
        if self.keyframes.windows(2).all(|w| w[0].year <= w[1].year) {
            Cow::Borrowed(self.keyframes.as_slice())
        } else {
            let mut sorted = self.keyframes.clone();
            sorted.sort_by_key(|k| k.year);
            Cow::Owned(sorted)
        }
    }

    /// Fractional year shown at timeline `time`, or `None` without keyframes.
    /// The race starts at time 0 and spans `race_duration_ms`.
    pub fn year_at(&self, time: f64) -> Option<f64> {
        year_in(&self.ordered_keyframes(), finite_or(self.race_duration_ms, 0.0), time)
    }

    /// Every positive category at `time`, largest first. Ties break by label.
    pub fn standings(&self, time: f64) -> Vec<Standing> {
        let keyframes = self.ordered_keyframes();
        let Some(year) = year_in(&keyframes, finite_or(self.race_duration_ms, 0.0), time) else {
            return Vec::new();
        };
        let (prev, next) = match keyframes.len() {
            0 => return Vec::new(),
            1 => (&keyframes[0], &keyframes[0]),
            n => {
                let idx = (0..n - 1)
                    .find(|&i| keyframes[i + 1].year as f64 > year)
                    .unwrap_or(n - 2);
                (&keyframes[idx], &keyframes[idx + 1])
            }
        };
        let span = (next.year - prev.year) as f64;
        let f = if span > 0.0 {
            ((year - prev.year as f64) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut labels: Vec<&String> = prev.values.keys().chain(next.values.keys()).collect();
        labels.sort();
        labels.dedup();

        let mut out: Vec<Standing> = labels
            .into_iter()
            .filter_map(|label| {
                let a = finite_or(prev.values.get(label).copied().unwrap_or(0.0), 0.0);
                let b = finite_or(next.values.get(label).copied().unwrap_or(0.0), 0.0);
                let value = a + (b - a) * f;
                (value > 0.0).then(|| Standing {
                    label: label.clone(),
                    value,
                })
            })
            .collect();
        out.sort_by(|x, y| {
            y.value
                .partial_cmp(&x.value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| x.label.cmp(&y.label))
        });
        out
    }

    fn color_of(&self, label: &str) -> Color {
        self.colors.get(label).copied().unwrap_or(self.fallback_color)
    }
}

impl Drawable for BarChartRaceObject {
    drawable_common!(ObjectKind::BarChartRace);

    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()> {
        let state = self.base.visual_state(time);
        if state.is_hidden() {
            return Ok(());
        }
        let Some(year) = self.year_at(time) else {
            return Ok(());
        };
        let standings = self.standings(time);
        let (w, h) = (self.base.width, self.base.height);
        let bar_h = finite_or(self.bar_height, 0.0);
        let gap = finite_or(self.gap, 0.0);

        canvas.save();
        self.base.apply_transform(canvas, &state);

        canvas.save();
        canvas.set_alpha(canvas.alpha() * 0.2);
        let year_style = TextStyle::new(self.font_family.clone(), YEAR_SIZE, self.label_color)
            .with_align(TextAlign::Right);
        canvas.fill_text(
            &(year.floor() as i64).to_string(),
            w - 20.0,
            h - 20.0 - YEAR_SIZE,
            &year_style,
        )?;
        canvas.restore();

        let max_value = standings.first().map(|s| s.value).unwrap_or(100.0);
        let label_style = TextStyle::new(self.font_family.clone(), LABEL_SIZE, self.label_color)
            .with_align(TextAlign::Right);
        let value_style = TextStyle::new(self.font_family.clone(), VALUE_SIZE, self.value_color);

        for (i, item) in standings.iter().take(self.max_bars).enumerate() {
            let y = i as f64 * (bar_h + gap) + HEADER_OFFSET;
            let bar_w = item.value / max_value * (w - LABEL_RESERVE);
            let mid = y + bar_h / 2.0;
            canvas.fill_round_rect(0.0, y, bar_w, bar_h, 4.0, self.color_of(&item.label));
            canvas.fill_text(&item.label, -10.0, mid - LABEL_SIZE / 2.0, &label_style)?;
            canvas.fill_text(
                &group_thousands(item.value.round() as i64),
                bar_w + 10.0,
                mid - VALUE_SIZE / 2.0,
                &value_style,
            )?;
        }

        canvas.restore();
        Ok(())
    }

    fn rescale(&mut self, r: &Rescale) {
        let u = r.uniform();
        self.base.rescale(r);
        self.bar_height *= u;
        self.gap *= u;
    }
}

fn year_in(keyframes: &[RaceKeyframe], duration: f64, time: f64) -> Option<f64> {
    let first = keyframes.first()?;
    let last = keyframes.last()?;
    let progress = if duration > 0.0 {
        (time / duration).clamp(0.0, 1.0)
    } else {
        1.0
    };
    Some(first.year as f64 + (last.year - first.year) as f64 * progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_spans_keyframes() {
        let race = BarChartRaceObject::new("r");
        assert_eq!(race.year_at(0.0), Some(2004.0));
        assert_eq!(race.year_at(10_000.0), Some(2023.0));
        assert_eq!(race.year_at(99_999.0), Some(2023.0));
        assert_eq!(race.year_at(-5.0), Some(2004.0));
    }

    #[test]
    fn test_standings_at_start_and_end() {
        let race = BarChartRaceObject::new("r");
        let start = race.standings(0.0);
        assert_eq!(start[0].label, "MySpace");
        assert_eq!(start.len(), 5);
        let end = race.standings(10_000.0);
        let order: Vec<&str> = end.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            order,
            vec!["Facebook", "Instagram", "TikTok", "LinkedIn", "Snapchat", "Twitter"]
        );
    }

    #[test]
    fn test_standings_interpolate_linearly() {
        let mut race = BarChartRaceObject::new("r");
        race.keyframes = vec![
            RaceKeyframe::new(2000, &[("A", 0.0), ("B", 10.0)]),
            RaceKeyframe::new(2010, &[("A", 20.0), ("B", 10.0)]),
        ];
        let mid = race.standings(5_000.0);
        assert_eq!(mid.len(), 2);
        // A reaches 10 at the midpoint and ties B; the label breaks the tie
        assert_eq!(mid[0].label, "A");
        assert!((mid[0].value - 10.0).abs() < 1e-9);
        // a zero value is dropped entirely
        assert_eq!(race.standings(0.0).len(), 1);
    }

    #[test]
    fn test_rank_is_recomputed_not_remembered() {
        let mut race = BarChartRaceObject::new("r");
        race.keyframes = vec![
            RaceKeyframe::new(2000, &[("A", 1.0), ("B", 5.0)]),
            RaceKeyframe::new(2001, &[("A", 9.0), ("B", 5.0)]),
        ];
        let late = race.standings(10_000.0);
        let early = race.standings(0.0);
        assert_eq!(late[0].label, "A");
        assert_eq!(early[0].label, "B");
    }

    #[test]
    fn test_unordered_keyframes_race_in_year_order() {
        let mut race = BarChartRaceObject::new("r");
        race.update_properties(&serde_json::json!({
            "keyframes": [
                { "year": 2010, "values": { "A": 20.0, "B": 10.0 } },
                { "year": 2000, "values": { "A": 0.0, "B": 10.0 } },
            ]
        }))
        .unwrap();
        assert_eq!(race.year_at(0.0), Some(2000.0));
        assert_eq!(race.year_at(10_000.0), Some(2010.0));
        assert_eq!(race.standings(0.0).len(), 1);
        let mid = race.standings(5_000.0);
        assert!((mid[0].value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_race_clock_ignores_enter_delay() {
        let mut race = BarChartRaceObject::new("r");
        race.base.enter_animation.delay = 2_000.0;
        assert_eq!(race.year_at(0.0), Some(2004.0));
        assert_eq!(race.year_at(10_000.0), Some(2023.0));
        let half = race.year_at(5_000.0).unwrap();
        assert!((half - 2013.5).abs() < 1e-9);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1234567), "-1,234,567");
    }

    #[test]
    fn test_no_keyframes_draws_nothing() {
        let mut race = BarChartRaceObject::new("r");
        race.keyframes.clear();
        let mut canvas = Canvas::with_text_renderer(
            100,
            100,
            std::sync::Arc::new(kinetix_render::TextRenderer::new()),
        );
        race.draw(&mut canvas, 1000.0).unwrap();
        assert!(canvas.frame().data.chunks(4).all(|p| p[3] == 0));
    }
}
