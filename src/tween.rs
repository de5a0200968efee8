//! Built-in timeline engine used by the windowed viewer.

use std::time::Duration;

use crate::gallery::backend::{Easing, Timeline, TimelineId, TweenEngine, TweenEvent, TweenSpec};

impl Easing {
    /// Map linear progress `t` in [0, 1] onto the eased curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Power2Out => 1.0 - (1.0 - t).powi(3),
            Easing::Power3Out => 1.0 - (1.0 - t).powi(4),
            Easing::ExpoOut => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }
}

fn bezier(a: f64, b: f64, s: f64) -> f64 {
    // Control points (0, a, b, 1).
    let inv = 1.0 - s;
    3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
}

fn bezier_slope(a: f64, b: f64, s: f64) -> f64 {
    let inv = 1.0 - s;
    3.0 * inv * inv * a + 6.0 * inv * s * (b - a) + 3.0 * s * s * (1.0 - b)
}

fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, t: f64) -> f64 {
    if t <= 0.0 || t >= 1.0 {
        return t;
    }
    // Newton first, bisection when the slope flattens out.
    let mut s = t;
    for _ in 0..8 {
        let err = bezier(x1, x2, s) - t;
        if err.abs() < 1e-7 {
            return bezier(y1, y2, s);
        }
        let slope = bezier_slope(x1, x2, s);
        if slope.abs() < 1e-6 {
            break;
        }
        s -= err / slope;
    }
    let (mut lo, mut hi) = (0.0, 1.0);
    s = t;
    for _ in 0..50 {
        let x = bezier(x1, x2, s);
        if (x - t).abs() < 1e-7 {
            break;
        }
        if x < t {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) / 2.0;
    }
    bezier(y1, y2, s)
}

struct Running {
    id: TimelineId,
    elapsed: Duration,
    tweens: Vec<(TweenSpec, bool)>,
}

/// Timelines advanced by wall-clock deltas from the frame loop.
#[derive(Default)]
pub struct Timelines {
    next_id: u64,
    running: Vec<Running>,
}

impl Timelines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

impl TweenEngine for Timelines {
    fn play(&mut self, timeline: Timeline) -> TimelineId {
        self.next_id += 1;
        let id = TimelineId(self.next_id);
        self.running.push(Running {
            id,
            elapsed: Duration::ZERO,
            tweens: timeline.tweens.into_iter().map(|t| (t, false)).collect(),
        });
        id
    }

    fn advance(&mut self, dt: Duration, out: &mut Vec<TweenEvent>) {
        self.running.retain_mut(|run| {
            run.elapsed += dt;
            for (spec, settled) in &mut run.tweens {
                if *settled || run.elapsed < spec.delay {
                    continue;
                }
                let local = run.elapsed - spec.delay;
                let progress = if spec.duration.is_zero() {
                    1.0
                } else {
                    (local.as_secs_f64() / spec.duration.as_secs_f64()).min(1.0)
                };
                let value = spec.from + (spec.to - spec.from) * spec.easing.apply(progress);
                out.push(TweenEvent::Value {
                    timeline: run.id,
                    channel: spec.channel,
                    value,
                });
                *settled = progress >= 1.0;
            }
            let done = run.tweens.iter().all(|(_, settled)| *settled);
            if done {
                out.push(TweenEvent::Finished(run.id));
            }
            !done
        });
    }

    fn kill_all(&mut self) {
        self.running.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::backend::{TweenChannel, TweenProperty};
    use crate::gallery::layout::ItemId;

    fn spec(delay_ms: u64, duration_ms: u64, easing: Easing) -> TweenSpec {
        TweenSpec {
            channel: TweenChannel {
                item: ItemId(0),
                property: TweenProperty::X,
            },
            from: 10.0,
            to: 0.0,
            delay: Duration::from_millis(delay_ms),
            duration: Duration::from_millis(duration_ms),
            easing,
        }
    }

    #[test]
    fn easings_hit_their_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::Power2Out,
            Easing::Power3Out,
            Easing::ExpoOut,
            Easing::CubicBezier(0.8, 0.15, 0.2, 1.0),
        ] {
            assert_eq!(easing.apply(0.0), 0.0, "{easing:?}");
            assert_eq!(easing.apply(1.0), 1.0, "{easing:?}");
            let mut previous = 0.0;
            for i in 1..=20 {
                let v = easing.apply(i as f64 / 20.0);
                assert!(v + 1e-9 >= previous, "{easing:?} not monotonic at {i}");
                previous = v;
            }
        }
    }

    #[test]
    fn bezier_matches_linear_when_control_points_are_diagonal() {
        let linear = Easing::CubicBezier(1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0);
        for t in [0.1, 0.25, 0.5, 0.9] {
            assert!((linear.apply(t) - t).abs() < 1e-5);
        }
    }

    #[test]
    fn timeline_finishes_after_its_longest_tween() {
        let mut engine = Timelines::new();
        let id = engine.play(Timeline {
            tweens: vec![spec(0, 100, Easing::Linear), spec(50, 100, Easing::Linear)],
        });
        let mut out = Vec::new();

        engine.advance(Duration::from_millis(50), &mut out);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], TweenEvent::Value { value, .. } if (value - 5.0).abs() < 1e-9));

        out.clear();
        engine.advance(Duration::from_millis(60), &mut out);
        assert!(!out.contains(&TweenEvent::Finished(id)));

        out.clear();
        engine.advance(Duration::from_millis(60), &mut out);
        assert_eq!(out.last(), Some(&TweenEvent::Finished(id)));
        assert!(matches!(out[0], TweenEvent::Value { value, .. } if value == 0.0));
        assert!(engine.is_empty());
    }

    #[test]
    fn kill_all_drops_everything() {
        let mut engine = Timelines::new();
        engine.play(Timeline {
            tweens: vec![spec(0, 100, Easing::ExpoOut)],
        });
        engine.kill_all();
        let mut out = Vec::new();
        engine.advance(Duration::from_millis(500), &mut out);
        assert!(out.is_empty());
    }
}
