use std::time::{Duration, Instant};

use crate::config::PhysicsOptions;

/// Distance under which the rendered position locks onto the target.
pub const RENDER_EPSILON: f64 = 1e-4;

/// One tick's elapsed time, clamped and expressed in reference frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStep {
    pub dt: Duration,
    /// `dt * reference_fps`: 1.0 means exactly one reference frame elapsed.
    pub scaled: f64,
}

impl FrameStep {
    pub fn new(raw: Duration, physics: &PhysicsOptions) -> Self {
        let dt = raw.min(physics.max_frame_delta);
        Self {
            dt,
            scaled: dt.as_secs_f64() * physics.reference_fps,
        }
    }

    /// A step of exactly one reference frame.
    pub fn reference(physics: &PhysicsOptions) -> Self {
        Self::new(
            Duration::from_secs_f64(1.0 / physics.reference_fps),
            physics,
        )
    }
}

/// Continuous-time scroll state: velocity, the position being integrated
/// toward, and the smoothed position the layout actually uses.
#[derive(Debug, Clone)]
pub struct ScrollSimulator {
    velocity: f64,
    target_position: f64,
    rendered_position: f64,
    rest_since: Option<Instant>,
    physics: PhysicsOptions,
}

impl ScrollSimulator {
    pub fn new(physics: PhysicsOptions, position: f64) -> Self {
        Self {
            velocity: 0.0,
            target_position: position,
            rendered_position: position,
            rest_since: None,
            physics,
        }
    }

    pub fn set_physics(&mut self, physics: PhysicsOptions) {
        self.physics = physics;
        self.clamp_velocity();
    }

    pub fn physics(&self) -> &PhysicsOptions {
        &self.physics
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn target_position(&self) -> f64 {
        self.target_position
    }

    pub fn rendered_position(&self) -> f64 {
        self.rendered_position
    }

    /// Add to velocity, keeping it within `±max_velocity`.
    pub fn add_impulse(&mut self, delta: f64) {
        self.velocity += delta;
        self.clamp_velocity();
    }

    fn clamp_velocity(&mut self) {
        let max = self.physics.max_velocity;
        self.velocity = self.velocity.clamp(-max, max);
    }

    pub fn stop(&mut self) {
        self.velocity = 0.0;
    }

    pub fn set_target_position(&mut self, position: f64) {
        self.target_position = position;
    }

    pub fn nudge_target(&mut self, delta: f64) {
        self.target_position += delta;
    }

    /// Decay velocity and integrate it into the target position. Skipped by the
    /// caller while an externally driven animation owns the position.
    pub fn integrate(&mut self, step: FrameStep, now: Instant) {
        self.velocity *= self.physics.speed_decay.powf(step.scaled);
        self.target_position += self.velocity * step.scaled;

        if self.velocity.abs() < self.physics.stop_threshold {
            self.velocity = 0.0;
            self.rest_since.get_or_insert(now);
        } else {
            self.rest_since = None;
        }
    }

    /// Ease the rendered position toward the target; lock on when close enough.
    pub fn smooth(&mut self, step: FrameStep) {
        let lerp = 1.0 - (1.0 - self.physics.lerp_factor).powf(step.scaled);
        self.rendered_position += (self.target_position - self.rendered_position) * lerp;
        if (self.target_position - self.rendered_position).abs() < RENDER_EPSILON {
            self.rendered_position = self.target_position;
        }
    }

    /// Force every position to `position` at rest. Used when an external animation
    /// hands control back so no drift survives the handoff.
    pub fn hard_sync(&mut self, position: f64, now: Instant) {
        self.target_position = position;
        self.rendered_position = position;
        self.velocity = 0.0;
        self.rest_since = Some(now);
    }

    pub fn is_at_rest(&self) -> bool {
        self.velocity == 0.0
    }

    /// Time spent below the stop threshold, zero while moving.
    pub fn settled_for(&self, now: Instant) -> Duration {
        self.rest_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    /// Whether anything is still in motion, either velocity or rendered lag.
    pub fn is_moving(&self) -> bool {
        self.velocity != 0.0 || self.rendered_position != self.target_position
    }
}
