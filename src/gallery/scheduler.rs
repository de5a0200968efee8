use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::gallery::backend::{Timeline, TimelineId, TweenEngine, TweenEvent};

/// Frame time above which the gallery counts itself as struggling.
pub const SLOW_FRAME: Duration = Duration::from_millis(25);
const PERF_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceMode {
    /// Many external animations are running at once.
    pub heavy: bool,
    /// Recent frames took longer than [`SLOW_FRAME`].
    pub slow_frames: bool,
}

impl PerformanceMode {
    pub fn degraded(&self) -> bool {
        self.heavy || self.slow_frames
    }
}

/// Owns the tween engine and every timeline started through it, so the number
/// of concurrent external animations is known and the performance mode can be
/// derived from it.
pub struct AnimationScheduler {
    engine: Box<dyn TweenEngine>,
    active: HashMap<TimelineId, &'static str>,
    heavy_threshold: usize,
    mode: PerformanceMode,
    last_perf_check: Option<Instant>,
}

impl AnimationScheduler {
    pub fn new(engine: Box<dyn TweenEngine>, heavy_threshold: usize) -> Self {
        Self {
            engine,
            active: HashMap::new(),
            heavy_threshold,
            mode: PerformanceMode::default(),
            last_perf_check: None,
        }
    }

    pub fn set_heavy_threshold(&mut self, threshold: usize) {
        self.heavy_threshold = threshold;
    }

    pub fn play(&mut self, label: &'static str, timeline: Timeline) -> TimelineId {
        let id = self.engine.play(timeline);
        self.active.insert(id, label);
        debug!(label, active = self.active.len(), "timeline started");
        id
    }

    /// Advance every timeline. Finished timelines leave the active set.
    pub fn advance(&mut self, dt: Duration, out: &mut Vec<TweenEvent>) {
        let start = out.len();
        self.engine.advance(dt, out);
        for event in &out[start..] {
            if let TweenEvent::Finished(id) = event {
                if let Some(label) = self.active.remove(id) {
                    debug!(label, active = self.active.len(), "timeline finished");
                }
            }
        }
    }

    pub fn kill_all(&mut self) {
        self.engine.kill_all();
        self.active.clear();
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn mode(&self) -> PerformanceMode {
        self.mode
    }

    /// Recompute the performance mode. Returns true when it flipped.
    pub fn observe_frame(&mut self, now: Instant, frame_time: Duration) -> bool {
        let previous = self.mode;
        self.mode.heavy = self.active.len() >= self.heavy_threshold;

        let due = self
            .last_perf_check
            .is_none_or(|at| now.saturating_duration_since(at) >= PERF_CHECK_INTERVAL);
        if due {
            self.last_perf_check = Some(now);
            self.mode.slow_frames = frame_time > SLOW_FRAME;
        }

        if self.mode != previous {
            info!(
                heavy = self.mode.heavy,
                slow_frames = self.mode.slow_frames,
                "performance mode changed"
            );
            true
        } else {
            false
        }
    }
}
