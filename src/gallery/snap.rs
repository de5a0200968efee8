use std::time::Instant;

use tracing::debug;

use crate::config::SnapOptions;
use crate::gallery::layout::{InfiniteLayout, ItemId};
use crate::gallery::simulator::{FrameStep, ScrollSimulator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    pub item: ItemId,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapOutcome {
    Idle,
    Pursuing { item: ItemId, distance: f64 },
    Completed { item: ItemId },
    /// A fling overrode an active pursuit.
    Cancelled,
}

/// Magnetic settling: once motion is slow and the simulator has rested long
/// enough, pull the target position onto the nearest card.
#[derive(Debug, Clone)]
pub struct SnapController {
    options: SnapOptions,
    target: Option<SnapTarget>,
    last_check: Option<Instant>,
}

impl SnapController {
    pub fn new(options: SnapOptions) -> Self {
        Self {
            options,
            target: None,
            last_check: None,
        }
    }

    pub fn set_options(&mut self, options: SnapOptions) {
        if !options.enabled {
            self.target = None;
        }
        self.options = options;
    }

    pub fn options(&self) -> &SnapOptions {
        &self.options
    }

    pub fn target(&self) -> Option<SnapTarget> {
        self.target
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    pub fn evaluate(
        &mut self,
        sim: &mut ScrollSimulator,
        layout: &InfiniteLayout,
        dragging: bool,
        step: FrameStep,
        now: Instant,
    ) -> SnapOutcome {
        if !self.options.enabled {
            self.target = None;
            return SnapOutcome::Idle;
        }

        let speed = sim.velocity().abs();
        if speed > self.options.threshold * 2.0 {
            return match self.target.take() {
                Some(target) => {
                    debug!(item = target.item.0, speed, "snap cancelled");
                    SnapOutcome::Cancelled
                }
                None => SnapOutcome::Idle,
            };
        }
        if dragging || speed >= self.options.threshold {
            return SnapOutcome::Idle;
        }

        let due = self
            .last_check
            .is_none_or(|at| now.saturating_duration_since(at) >= self.options.check_interval);
        if due {
            self.last_check = Some(now);
            if sim.settled_for(now) >= self.options.min_settle_time {
                self.acquire(sim, layout, now);
            }
        }

        let Some(target) = self.target else {
            return SnapOutcome::Idle;
        };
        let Some(item) = layout.get(target.item) else {
            self.target = None;
            return SnapOutcome::Idle;
        };

        let ideal = item.resolved_offset();
        let distance = ideal - sim.target_position();
        if distance.abs() < self.options.completion_epsilon {
            sim.set_target_position(ideal);
            sim.stop();
            self.target = None;
            debug!(item = target.item.0, position = ideal, "snap complete");
            return SnapOutcome::Completed { item: target.item };
        }

        sim.nudge_target(distance * self.options.strength * step.scaled);
        SnapOutcome::Pursuing {
            item: target.item,
            distance,
        }
    }

    fn acquire(&mut self, sim: &ScrollSimulator, layout: &InfiniteLayout, now: Instant) {
        let Some(nearest) =
            layout.nearest_within(sim.target_position(), self.options.detection_range)
        else {
            return;
        };
        if self.target.map(|t| t.item) != Some(nearest) {
            debug!(item = nearest.0, "snap target acquired");
            self.target = Some(SnapTarget {
                item: nearest,
                started_at: now,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PhysicsOptions;
    use crate::gallery::layout::CardMetrics;

    fn spaced(spacing: f64) -> InfiniteLayout {
        InfiniteLayout::build(
            3,
            1,
            CardMetrics {
                width: spacing * 0.9,
                height: spacing * 0.6,
                spacing,
                corner_radius_uv: 0.0,
            },
        )
    }

    /// Cards at -10, 0 and 10.
    fn layout() -> InfiniteLayout {
        spaced(10.0)
    }

    /// Simulator sitting at `position`, already rested past the settle gate.
    fn rested_at(position: f64, now: Instant) -> ScrollSimulator {
        let mut sim = ScrollSimulator::new(PhysicsOptions::default(), position);
        sim.hard_sync(position, now - Duration::from_secs(1));
        sim
    }

    #[test]
    fn picks_the_centre_item() {
        let now = Instant::now();
        let layout = layout();
        let mut sim = rested_at(0.4, now);
        let mut snap = SnapController::new(SnapOptions::default());
        let step = FrameStep::reference(&PhysicsOptions::default());

        let outcome = snap.evaluate(&mut sim, &layout, false, step, now);
        let SnapOutcome::Pursuing { item, distance } = outcome else {
            panic!("expected pursuit, got {outcome:?}");
        };
        assert_eq!(layout.get(item).unwrap().resolved_offset(), 0.0);
        assert!((distance + 0.4).abs() < 1e-12);
    }

    #[test]
    fn nothing_in_range_leaves_target_empty() {
        let now = Instant::now();
        let layout = layout();
        let mut sim = rested_at(5.0, now);
        let mut snap = SnapController::new(SnapOptions::default());
        let step = FrameStep::reference(&PhysicsOptions::default());
        assert_eq!(
            snap.evaluate(&mut sim, &layout, false, step, now),
            SnapOutcome::Idle
        );
        assert!(snap.target().is_none());
        assert_eq!(sim.target_position(), 5.0);
    }

    #[test]
    fn converges_without_overshoot() {
        let start = Instant::now();
        // Cards at -12, 0 and 12; only the one at 0 is within range of -5.
        let layout = spaced(12.0);
        let mut sim = rested_at(-5.0, start);
        let options = SnapOptions {
            detection_range: 6.0,
            ..SnapOptions::default()
        };
        let mut snap = SnapController::new(options);
        let step = FrameStep::reference(&PhysicsOptions::default());

        let mut now = start;
        let mut ticks = 0;
        loop {
            now += Duration::from_millis(16);
            ticks += 1;
            let before = sim.target_position();
            match snap.evaluate(&mut sim, &layout, false, step, now) {
                SnapOutcome::Pursuing { .. } => {
                    assert!(sim.target_position() > before);
                    assert!(sim.target_position() <= 0.0, "overshot");
                }
                SnapOutcome::Completed { .. } => break,
                other => panic!("unexpected {other:?} after {ticks} ticks"),
            }
            assert!(ticks < 100, "did not converge");
        }
        assert_eq!(sim.target_position(), 0.0);
        assert_eq!(sim.velocity(), 0.0);
        assert!(snap.target().is_none());
    }

    #[test]
    fn fling_cancels_pursuit() {
        let now = Instant::now();
        let layout = layout();
        let mut sim = rested_at(0.4, now);
        let mut snap = SnapController::new(SnapOptions::default());
        let step = FrameStep::reference(&PhysicsOptions::default());
        snap.evaluate(&mut sim, &layout, false, step, now);
        assert!(snap.target().is_some());

        sim.add_impulse(1.0);
        assert_eq!(
            snap.evaluate(&mut sim, &layout, false, step, now),
            SnapOutcome::Cancelled
        );
        assert!(snap.target().is_none());
    }

    #[test]
    fn waits_for_settle_time_and_drag_release() {
        let now = Instant::now();
        let layout = layout();
        let mut sim = ScrollSimulator::new(PhysicsOptions::default(), 0.4);
        sim.hard_sync(0.4, now);
        let mut snap = SnapController::new(SnapOptions::default());
        let step = FrameStep::reference(&PhysicsOptions::default());

        assert_eq!(
            snap.evaluate(&mut sim, &layout, false, step, now),
            SnapOutcome::Idle
        );
        let later = now + Duration::from_millis(400);
        assert_eq!(
            snap.evaluate(&mut sim, &layout, true, step, later),
            SnapOutcome::Idle
        );
        assert!(matches!(
            snap.evaluate(&mut sim, &layout, false, step, later),
            SnapOutcome::Pursuing { .. }
        ));
    }

    #[test]
    fn disabling_drops_target() {
        let now = Instant::now();
        let layout = layout();
        let mut sim = rested_at(0.4, now);
        let mut snap = SnapController::new(SnapOptions::default());
        let step = FrameStep::reference(&PhysicsOptions::default());
        snap.evaluate(&mut sim, &layout, false, step, now);
        snap.set_options(SnapOptions {
            enabled: false,
            ..SnapOptions::default()
        });
        assert!(snap.target().is_none());
    }
}
