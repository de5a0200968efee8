use std::time::Instant;

use tracing::{debug, info};

use crate::config::IntroOptions;
use crate::gallery::backend::{
    Easing, Timeline, TimelineId, TweenChannel, TweenEvent, TweenProperty, TweenSpec,
};
use crate::gallery::layout::InfiniteLayout;
use crate::gallery::scheduler::AnimationScheduler;
use crate::gallery::simulator::ScrollSimulator;

/// Slow start, long soft landing.
pub const SOFT_SETTLE: Easing = Easing::CubicBezier(0.8, 0.15, 0.2, 1.0);

/// Where the entrance animation currently holds a card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntroPose {
    pub x: f64,
    pub scale: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Pending,
    Running {
        timeline: TimelineId,
        home: f64,
    },
    Done,
}

/// One-shot entrance: cards slide in from the right, staggered, then control
/// passes to the scroll simulator in one hard sync.
#[derive(Debug, Clone)]
pub struct IntroSequencer {
    options: IntroOptions,
    phase: Phase,
}

impl IntroSequencer {
    pub fn new(options: IntroOptions) -> Self {
        Self {
            options,
            phase: Phase::Pending,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// Skip straight to the finished state without animating.
    pub fn skip(&mut self) {
        self.phase = Phase::Done;
    }

    /// Pose every card and start the timeline. Cards outside the curated index
    /// window stay hidden until the handoff. Returns false when nothing ran.
    pub fn start(
        &mut self,
        layout: &mut InfiniteLayout,
        scheduler: &mut AnimationScheduler,
        view_width: f64,
    ) -> bool {
        if !matches!(self.phase, Phase::Pending) {
            return false;
        }
        let timeline = self.plan(layout, view_width);
        if timeline.tweens.is_empty() {
            self.phase = Phase::Done;
            return false;
        }
        let tweens = timeline.tweens.len();
        let id = scheduler.play("intro", timeline);
        self.phase = Phase::Running {
            timeline: id,
            home: layout.home_position(),
        };
        info!(tweens, "intro started");
        true
    }

    fn plan(&self, layout: &mut InfiniteLayout, view_width: f64) -> Timeline {
        let metrics = layout.metrics();
        let n = layout.content_len();
        let home = layout.home_position();
        let start_x = view_width / 2.0 + metrics.width + metrics.spacing * (n as f64 - 1.0);
        let o = &self.options;

        let mut participants: Vec<(i64, usize)> = layout
            .items()
            .iter()
            .map(|item| (layout.original_index(item), item.id.0))
            .filter(|(original, _)| (o.first_index..=o.last_index).contains(original))
            .collect();
        participants.sort_unstable();

        let mut tweens = Vec::with_capacity(participants.len() * 3);
        for (order, &(_, slot)) in participants.iter().enumerate() {
            let item = &layout.items()[slot];
            let id = item.id;
            let target_x = item.resolved_offset() - home;
            let delay = o.initial_delay + o.stagger * order as u32;
            let channel = |property| TweenChannel { item: id, property };
            tweens.push(TweenSpec {
                channel: channel(TweenProperty::X),
                from: start_x,
                to: target_x,
                delay,
                duration: o.duration,
                easing: SOFT_SETTLE,
            });
            tweens.push(TweenSpec {
                channel: channel(TweenProperty::Scale),
                from: o.initial_scale,
                to: 1.0,
                delay,
                duration: o.duration,
                easing: SOFT_SETTLE,
            });
            tweens.push(TweenSpec {
                channel: channel(TweenProperty::Opacity),
                from: 0.0,
                to: 1.0,
                delay: delay + o.opacity_delay,
                duration: o.opacity_duration,
                easing: Easing::Power2Out,
            });
        }

        let start_pose = IntroPose {
            x: start_x,
            scale: o.initial_scale,
            opacity: 0.0,
        };
        let hidden = IntroPose {
            x: start_x + view_width,
            scale: 1.0,
            opacity: 0.0,
        };
        for item in layout.items_mut() {
            item.intro_pose = Some(hidden);
        }
        for &(_, slot) in &participants {
            layout.items_mut()[slot].intro_pose = Some(start_pose);
        }
        debug!(participants = participants.len(), start_x, "intro planned");

        Timeline { tweens }
    }

    /// Apply one engine event. On completion the simulator is hard-synced to the
    /// home position and every card leaves intro control; returns true then.
    pub fn on_event(
        &mut self,
        event: &TweenEvent,
        layout: &mut InfiniteLayout,
        sim: &mut ScrollSimulator,
        now: Instant,
    ) -> bool {
        let Phase::Running { timeline, home } = self.phase else {
            return false;
        };
        match *event {
            TweenEvent::Value {
                timeline: id,
                channel,
                value,
            } if id == timeline => {
                if let Some(pose) = layout
                    .get_mut(channel.item)
                    .and_then(|item| item.intro_pose.as_mut())
                {
                    match channel.property {
                        TweenProperty::X => pose.x = value,
                        TweenProperty::Scale => pose.scale = value,
                        TweenProperty::Opacity => pose.opacity = value,
                    }
                }
                false
            }
            TweenEvent::Finished(id) if id == timeline => {
                for item in layout.items_mut() {
                    item.intro_pose = None;
                }
                sim.hard_sync(home, now);
                self.phase = Phase::Done;
                info!(position = home, "intro finished");
                true
            }
            _ => false,
        }
    }

    /// Abandon a running intro, e.g. on teardown.
    pub fn abort(&mut self, layout: &mut InfiniteLayout) {
        if self.is_active() {
            for item in layout.items_mut() {
                item.intro_pose = None;
            }
        }
        self.phase = Phase::Done;
    }
}
