use std::time::Instant;

use crate::config::{DragOptions, KeyboardOptions, PhysicsOptions};
use crate::events::{NudgeDirection, PointerKind};
use crate::gallery::momentum::{DragSample, MomentumSampler};
use crate::gallery::simulator::ScrollSimulator;

#[derive(Debug, Clone)]
struct DragSession {
    kind: PointerKind,
    last_x: f64,
    sampler: MomentumSampler,
}

/// Turns wheel, drag and key input into velocity changes on the simulator.
///
/// Dragging grabs the content: moving the pointer right pulls cards right,
/// which moves the view position left.
#[derive(Debug, Clone)]
pub struct InputAggregator {
    drag: Option<DragSession>,
    drag_options: DragOptions,
    keyboard: KeyboardOptions,
    wheel_scale: f64,
}

impl InputAggregator {
    pub fn new(physics: &PhysicsOptions, drag: DragOptions, keyboard: KeyboardOptions) -> Self {
        Self {
            drag: None,
            drag_options: drag,
            keyboard,
            wheel_scale: physics.velocity_scale * PhysicsOptions::WHEEL_PIXEL_FACTOR,
        }
    }

    pub fn retune(
        &mut self,
        physics: &PhysicsOptions,
        drag: DragOptions,
        keyboard: KeyboardOptions,
    ) {
        self.drag_options = drag;
        self.keyboard = keyboard;
        self.wheel_scale = physics.velocity_scale * PhysicsOptions::WHEEL_PIXEL_FACTOR;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_kind(&self) -> Option<PointerKind> {
        self.drag.as_ref().map(|d| d.kind)
    }

    pub fn on_wheel(&mut self, sim: &mut ScrollSimulator, delta_y: f64) {
        sim.add_impulse(delta_y * self.wheel_scale);
    }

    pub fn on_drag_start(&mut self, kind: PointerKind, x: f64, at: Instant) {
        let mut sampler =
            MomentumSampler::new(self.drag_options.max_samples, self.drag_options.sample_window);
        sampler.record(DragSample { screen_x: x, at });
        self.drag = Some(DragSession {
            kind,
            last_x: x,
            sampler,
        });
    }

    /// Live nudge while the pointer moves. Ignored when no drag is active.
    pub fn on_drag_move(
        &mut self,
        sim: &mut ScrollSimulator,
        x: f64,
        at: Instant,
        units_per_pixel: f64,
    ) {
        let Some(session) = self.drag.as_mut() else {
            return;
        };
        let delta_world = (x - session.last_x) * units_per_pixel;
        session.last_x = x;
        session.sampler.record(DragSample { screen_x: x, at });

        let nudge = match session.kind {
            PointerKind::Mouse => self.drag_options.mouse_nudge,
            PointerKind::Touch => self.drag_options.touch_nudge,
        };
        sim.add_impulse(-delta_world * nudge);
    }

    /// Release momentum, scaled separately from the live nudge. Returns the
    /// kind of gesture that ended, if one was active.
    pub fn on_drag_end(
        &mut self,
        sim: &mut ScrollSimulator,
        at: Instant,
        units_per_pixel: f64,
    ) -> Option<PointerKind> {
        let session = self.drag.take()?;
        let momentum = session.sampler.estimate_velocity(at, units_per_pixel);
        let scale = match session.kind {
            PointerKind::Mouse => self.drag_options.mouse_momentum,
            PointerKind::Touch => self.drag_options.touch_momentum,
        };
        sim.add_impulse(momentum * scale);
        Some(session.kind)
    }

    /// Drop an active gesture without applying momentum.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn on_key_nudge(&mut self, sim: &mut ScrollSimulator, direction: NudgeDirection) {
        sim.add_impulse(direction.sign() * self.keyboard.impulse);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn setup() -> (InputAggregator, ScrollSimulator) {
        let physics = PhysicsOptions::default();
        (
            InputAggregator::new(&physics, DragOptions::default(), KeyboardOptions::default()),
            ScrollSimulator::new(physics, 0.0),
        )
    }

    #[test]
    fn wheel_scales_and_clamps() {
        let (mut input, mut sim) = setup();
        input.on_wheel(&mut sim, 100.0);
        assert!((sim.velocity() - 0.8).abs() < 1e-12);
        input.on_wheel(&mut sim, 100_000.0);
        assert_eq!(sim.velocity(), 8.0);
        input.on_wheel(&mut sim, -1e9);
        assert_eq!(sim.velocity(), -8.0);
    }

    #[test]
    fn velocity_stays_bounded_for_mixed_input() {
        let (mut input, mut sim) = setup();
        let start = Instant::now();
        input.on_drag_start(PointerKind::Touch, 0.0, start);
        for i in 1..40u64 {
            input.on_drag_move(&mut sim, i as f64 * 900.0, start + Duration::from_millis(i), 0.05);
            input.on_wheel(&mut sim, -250.0);
            input.on_key_nudge(&mut sim, NudgeDirection::Right);
            assert!(sim.velocity().abs() <= 8.0);
        }
        input.on_drag_end(&mut sim, start + Duration::from_millis(40), 0.05);
        assert!(sim.velocity().abs() <= 8.0);
    }

    #[test]
    fn dragging_right_moves_view_left() {
        let (mut input, mut sim) = setup();
        let start = Instant::now();
        input.on_drag_start(PointerKind::Mouse, 100.0, start);
        input.on_drag_move(&mut sim, 110.0, start + Duration::from_millis(10), 0.01);
        assert!(sim.velocity() < 0.0);
        assert!((sim.velocity() + 0.1 * 0.3).abs() < 1e-12);
    }

    #[test]
    fn release_adds_scaled_momentum() {
        let (mut input, mut sim) = setup();
        let start = Instant::now();
        input.on_drag_start(PointerKind::Touch, 0.0, start);
        input.on_drag_move(&mut sim, -20.0, start + Duration::from_millis(20), 0.01);
        let live = sim.velocity();
        assert_eq!(
            input.on_drag_end(&mut sim, start + Duration::from_millis(25), 0.01),
            Some(PointerKind::Touch)
        );
        // -20px over 20ms = -1000 px/s -> +10 world/s, scaled by 1.2.
        assert!((sim.velocity() - (live + 12.0).min(8.0)).abs() < 1e-9);
        assert!(!input.is_dragging());
    }

    #[test]
    fn stale_release_adds_nothing() {
        let (mut input, mut sim) = setup();
        let start = Instant::now();
        input.on_drag_start(PointerKind::Mouse, 0.0, start);
        input.on_drag_move(&mut sim, 50.0, start + Duration::from_millis(10), 0.01);
        let live = sim.velocity();
        input.on_drag_end(&mut sim, start + Duration::from_millis(500), 0.01);
        assert_eq!(sim.velocity(), live);
    }

    #[test]
    fn keys_push_in_their_direction() {
        let (mut input, mut sim) = setup();
        input.on_key_nudge(&mut sim, NudgeDirection::Left);
        assert_eq!(sim.velocity(), -0.5);
        input.on_key_nudge(&mut sim, NudgeDirection::Right);
        input.on_key_nudge(&mut sim, NudgeDirection::Right);
        assert_eq!(sim.velocity(), 0.5);
    }
}
