use std::collections::HashMap;

use crate::config::VisualOptions;
use crate::gallery::backend::{RenderBackend, Transform};
use crate::gallery::layout::{InfiniteLayout, Item, ItemId};
use crate::gallery::scheduler::PerformanceMode;
use crate::gallery::simulator::FrameStep;

/// Value of a shader input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderParam {
    Scalar(f64),
    Vector2(f64, f64),
}

/// Per-card shader inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    Time,
    Hover,
    Mouse,
    Velocity,
    Greyscale,
    MotionBlur,
    Opacity,
    MorphIntensity,
    WaveSpeed,
    VelocityMultiplier,
    PullStrength,
    CornerRadius,
}

/// Last value pushed for each (item, uniform); only changes reach the backend.
#[derive(Debug, Default)]
pub struct UniformCache {
    values: HashMap<(ItemId, Uniform), ShaderParam>,
}

impl UniformCache {
    /// Record `value`; returns whether it differs from the previous one.
    pub fn changed(&mut self, item: ItemId, uniform: Uniform, value: ShaderParam) -> bool {
        match self.values.insert((item, uniform), value) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Frame-wide inputs for the per-card pass.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub step: FrameStep,
    pub frame: u64,
    pub elapsed_secs: f64,
    pub rendered_position: f64,
    pub velocity: f64,
    pub pointer_ndc: [f64; 2],
    pub hovered: Option<ItemId>,
    pub dragging: bool,
    pub mode: PerformanceMode,
    /// Cards further than this from the viewer are skipped.
    pub cull_distance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualStats {
    pub visible: usize,
    pub culled: usize,
    pub pushed: usize,
}

/// Derives hover, greyscale and opacity per card each tick, relaxes them, and
/// pushes what changed to the backend.
#[derive(Debug)]
pub struct VisualEngine {
    options: VisualOptions,
    cache: UniformCache,
}

impl VisualEngine {
    pub fn new(options: VisualOptions) -> Self {
        Self {
            options,
            cache: UniformCache::default(),
        }
    }

    pub fn options(&self) -> &VisualOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: VisualOptions) {
        self.options = options;
        self.cache.clear();
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Static inputs a card surface is created with.
    pub fn initial_params(
        &self,
        corner_radius_uv: f64,
        opacity: f64,
    ) -> Vec<(Uniform, ShaderParam)> {
        vec![
            (Uniform::Time, ShaderParam::Scalar(0.0)),
            (Uniform::Hover, ShaderParam::Scalar(0.0)),
            (Uniform::Mouse, ShaderParam::Vector2(0.5, 0.5)),
            (Uniform::Velocity, ShaderParam::Scalar(0.0)),
            (Uniform::Greyscale, ShaderParam::Scalar(0.0)),
            (Uniform::MotionBlur, ShaderParam::Scalar(0.0)),
            (Uniform::Opacity, ShaderParam::Scalar(opacity)),
            (
                Uniform::MorphIntensity,
                ShaderParam::Scalar(self.options.morph_intensity),
            ),
            (Uniform::WaveSpeed, ShaderParam::Scalar(self.options.wave_speed)),
            (
                Uniform::VelocityMultiplier,
                ShaderParam::Scalar(self.options.velocity_multiplier),
            ),
            (
                Uniform::PullStrength,
                ShaderParam::Scalar(self.options.pull_strength),
            ),
            (Uniform::CornerRadius, ShaderParam::Scalar(corner_radius_uv)),
        ]
    }

    /// Re-send the tunable morph inputs to every surface, e.g. after a reload.
    pub fn push_tuning(&mut self, layout: &InfiniteLayout, backend: &mut dyn RenderBackend) {
        let tuning = [
            (Uniform::MorphIntensity, self.options.morph_intensity),
            (Uniform::WaveSpeed, self.options.wave_speed),
            (Uniform::VelocityMultiplier, self.options.velocity_multiplier),
            (Uniform::PullStrength, self.options.pull_strength),
        ];
        for item in layout.items() {
            let Some(surface) = item.surface else { continue };
            for (uniform, value) in tuning {
                let value = ShaderParam::Scalar(value);
                if self.cache.changed(item.id, uniform, value) {
                    backend.set_param(surface, uniform, value);
                }
            }
        }
    }

    /// Show every card at full opacity, bypassing culling.
    pub fn restore_opacity(
        &mut self,
        layout: &mut InfiniteLayout,
        backend: &mut dyn RenderBackend,
    ) {
        for item in layout.items_mut() {
            item.visual.opacity_target = 1.0;
            item.visual.opacity_current = 1.0;
            if let Some(surface) = item.surface {
                let value = ShaderParam::Scalar(1.0);
                self.cache.changed(item.id, Uniform::Opacity, value);
                backend.set_param(surface, Uniform::Opacity, value);
            }
        }
    }

    pub fn update(
        &mut self,
        layout: &mut InfiniteLayout,
        frame: &FrameContext,
        backend: &mut dyn RenderBackend,
    ) -> VisualStats {
        let mut stats = VisualStats::default();
        let hovered = if frame.dragging { None } else { frame.hovered };
        let any_hovered = hovered.is_some();
        let transition = if frame.mode.heavy {
            self.options.heavy_step
        } else {
            1.0 - self.options.retention.powf(frame.step.scaled)
        };
        let push_uniforms = !frame.mode.heavy || frame.frame % 2 == 0;
        let motion_blur = (frame.velocity.abs() * 2.0).min(1.0);
        let rendered_position = frame.rendered_position;

        for item in layout.items_mut() {
            let Some(surface) = item.surface else { continue };

            let transform = match item.intro_pose {
                Some(pose) => Transform {
                    x: pose.x,
                    y: 0.0,
                    scale: pose.scale,
                },
                None => Transform::at(item.resolved_offset() - rendered_position),
            };
            if item.last_transform != Some(transform) {
                backend.set_transform(surface, transform);
                item.last_transform = Some(transform);
                stats.pushed += 1;
            }
            if let Some(pose) = item.intro_pose {
                let value = ShaderParam::Scalar(pose.opacity);
                if self.cache.changed(item.id, Uniform::Opacity, value) {
                    backend.set_param(surface, Uniform::Opacity, value);
                    stats.pushed += 1;
                }
            }

            if transform.x.abs() > frame.cull_distance {
                stats.culled += 1;
                continue;
            }
            stats.visible += 1;

            let is_hovered = hovered == Some(item.id);
            relax(item, is_hovered, any_hovered, transition, &self.options);

            if !push_uniforms {
                continue;
            }
            let opacity = match item.intro_pose {
                Some(pose) => pose.opacity,
                None => item.visual.opacity_current,
            };
            let params = [
                (Uniform::Time, ShaderParam::Scalar(frame.elapsed_secs)),
                (Uniform::Hover, ShaderParam::Scalar(item.visual.hover_current)),
                (
                    Uniform::Mouse,
                    ShaderParam::Vector2(frame.pointer_ndc[0], frame.pointer_ndc[1]),
                ),
                (Uniform::Velocity, ShaderParam::Scalar(frame.velocity)),
                (
                    Uniform::Greyscale,
                    ShaderParam::Scalar(item.visual.greyscale_current),
                ),
                (Uniform::MotionBlur, ShaderParam::Scalar(motion_blur)),
                (Uniform::Opacity, ShaderParam::Scalar(opacity)),
            ];
            for (uniform, value) in params {
                if self.cache.changed(item.id, uniform, value) {
                    backend.set_param(surface, uniform, value);
                    stats.pushed += 1;
                }
            }
        }
        stats
    }
}

fn relax(
    item: &mut Item,
    is_hovered: bool,
    any_hovered: bool,
    transition: f64,
    options: &VisualOptions,
) {
    let dimmed = any_hovered && !is_hovered;
    let v = &mut item.visual;
    v.hover_target = if is_hovered { 1.0 } else { 0.0 };
    v.greyscale_target = if dimmed { 1.0 } else { 0.0 };
    v.opacity_target = if dimmed { options.dimmed_opacity } else { 1.0 };

    v.hover_current += (v.hover_target - v.hover_current) * transition;
    v.greyscale_current += (v.greyscale_target - v.greyscale_current) * transition;
    v.opacity_current += (v.opacity_target - v.opacity_current) * transition;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsOptions;
    use crate::gallery::backend::{
        RenderFault, SurfaceId, SurfaceSpec, TextureId, TextureSource,
    };
    use crate::gallery::layout::CardMetrics;

    #[derive(Default)]
    struct Recorder {
        params: Vec<(SurfaceId, Uniform, ShaderParam)>,
        transforms: Vec<(SurfaceId, Transform)>,
    }

    impl RenderBackend for Recorder {
        fn upload_texture(&mut self, _source: &TextureSource) -> TextureId {
            TextureId(0)
        }
        fn create_surface(&mut self, _spec: SurfaceSpec) -> SurfaceId {
            SurfaceId(0)
        }
        fn set_param(&mut self, surface: SurfaceId, uniform: Uniform, value: ShaderParam) {
            self.params.push((surface, uniform, value));
        }
        fn set_transform(&mut self, surface: SurfaceId, transform: Transform) {
            self.transforms.push((surface, transform));
        }
        fn intersect(&self, _ndc: [f64; 2], _candidates: &[SurfaceId]) -> Option<SurfaceId> {
            None
        }
        fn render(&mut self) -> Result<(), RenderFault> {
            Ok(())
        }
        fn resize(&mut self, _width_px: u32, _height_px: u32) {}
        fn restore(&mut self) -> Result<(), RenderFault> {
            Ok(())
        }
        fn clear(&mut self) {}
    }

    /// Five cards at -4, -2, 0, 2 and 4; each card's surface id equals its item id.
    fn strip() -> InfiniteLayout {
        let mut layout = InfiniteLayout::build(
            5,
            1,
            CardMetrics {
                width: 1.8,
                height: 1.2,
                spacing: 2.0,
                corner_radius_uv: 0.0,
            },
        );
        for item in layout.items_mut() {
            item.surface = Some(SurfaceId(item.id.0 as u32));
        }
        layout
    }

    fn frame(n: u64, mode: PerformanceMode) -> FrameContext {
        FrameContext {
            step: FrameStep::reference(&PhysicsOptions::default()),
            frame: n,
            elapsed_secs: 1.0,
            rendered_position: 0.0,
            velocity: 0.0,
            pointer_ndc: [0.0, 0.0],
            hovered: None,
            dragging: false,
            mode,
            cull_distance: 3.0,
        }
    }

    const PER_CARD_UNIFORMS: usize = 7;

    #[test]
    fn culled_cards_get_transforms_but_no_uniforms() {
        let mut engine = VisualEngine::new(VisualOptions::default());
        let mut layout = strip();
        let mut backend = Recorder::default();

        let stats = engine.update(&mut layout, &frame(1, PerformanceMode::default()), &mut backend);
        assert_eq!(stats.visible, 3);
        assert_eq!(stats.culled, 2);
        assert_eq!(backend.transforms.len(), 5);
        assert_eq!(backend.params.len(), 3 * PER_CARD_UNIFORMS);
        assert_eq!(stats.pushed, 5 + 3 * PER_CARD_UNIFORMS);
        assert!(
            backend
                .params
                .iter()
                .all(|(surface, _, _)| *surface != SurfaceId(0) && *surface != SurfaceId(4))
        );
    }

    #[test]
    fn unchanged_frame_pushes_nothing() {
        let mut engine = VisualEngine::new(VisualOptions::default());
        let mut layout = strip();
        let mut backend = Recorder::default();
        engine.update(&mut layout, &frame(1, PerformanceMode::default()), &mut backend);

        let mut backend = Recorder::default();
        let stats = engine.update(&mut layout, &frame(2, PerformanceMode::default()), &mut backend);
        assert_eq!(stats.pushed, 0);
        assert!(backend.params.is_empty());
        assert!(backend.transforms.is_empty());
        assert_eq!(stats.visible, 3);
    }

    #[test]
    fn heavy_load_pushes_uniforms_on_even_frames_only() {
        let heavy = PerformanceMode {
            heavy: true,
            slow_frames: false,
        };
        let mut engine = VisualEngine::new(VisualOptions::default());
        let mut layout = strip();

        let mut backend = Recorder::default();
        let stats = engine.update(&mut layout, &frame(1, heavy), &mut backend);
        assert!(backend.params.is_empty());
        assert_eq!(backend.transforms.len(), 5);
        assert_eq!(stats.pushed, 5);
        assert_eq!(stats.visible, 3);

        let mut backend = Recorder::default();
        let stats = engine.update(&mut layout, &frame(2, heavy), &mut backend);
        assert_eq!(backend.params.len(), 3 * PER_CARD_UNIFORMS);
        assert_eq!(stats.pushed, 3 * PER_CARD_UNIFORMS);
    }

    #[test]
    fn invalidate_resends_every_uniform() {
        let mut engine = VisualEngine::new(VisualOptions::default());
        let mut layout = strip();
        let mut backend = Recorder::default();
        engine.update(&mut layout, &frame(1, PerformanceMode::default()), &mut backend);

        engine.invalidate();
        let mut backend = Recorder::default();
        let stats = engine.update(&mut layout, &frame(2, PerformanceMode::default()), &mut backend);
        assert_eq!(backend.params.len(), 3 * PER_CARD_UNIFORMS);
        assert!(backend.transforms.is_empty());
        assert_eq!(stats.pushed, 3 * PER_CARD_UNIFORMS);
    }

    #[test]
    fn coarse_step_only_under_heavy_load() {
        let options = VisualOptions::default();
        let hover_after_one_frame = |mode: PerformanceMode| {
            let mut engine = VisualEngine::new(options.clone());
            let mut layout = strip();
            let mut backend = Recorder::default();
            let mut ctx = frame(2, mode);
            ctx.hovered = Some(ItemId(2));
            engine.update(&mut layout, &ctx, &mut backend);
            layout.items()[2].visual.hover_current
        };

        let slow = PerformanceMode {
            heavy: false,
            slow_frames: true,
        };
        let heavy = PerformanceMode {
            heavy: true,
            slow_frames: false,
        };
        let calm = hover_after_one_frame(PerformanceMode::default());
        assert!((calm - (1.0 - options.retention)).abs() < 1e-6);
        assert!((hover_after_one_frame(slow) - calm).abs() < 1e-12);
        assert!((hover_after_one_frame(heavy) - options.heavy_step).abs() < 1e-12);
    }

    #[test]
    fn cache_reports_only_changes() {
        let mut cache = UniformCache::default();
        let id = ItemId(3);
        assert!(cache.changed(id, Uniform::Hover, ShaderParam::Scalar(0.5)));
        assert!(!cache.changed(id, Uniform::Hover, ShaderParam::Scalar(0.5)));
        assert!(cache.changed(id, Uniform::Hover, ShaderParam::Scalar(0.6)));
        assert!(cache.changed(id, Uniform::Mouse, ShaderParam::Vector2(0.1, 0.2)));
        assert!(!cache.changed(id, Uniform::Mouse, ShaderParam::Vector2(0.1, 0.2)));
        assert!(cache.changed(id, Uniform::Mouse, ShaderParam::Vector2(0.1, 0.3)));
        assert!(cache.changed(ItemId(4), Uniform::Hover, ShaderParam::Scalar(0.6)));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.changed(id, Uniform::Hover, ShaderParam::Scalar(0.6)));
    }

    #[test]
    fn hovered_card_brightens_and_others_dim() {
        let options = VisualOptions::default();
        let mut layout = InfiniteLayout::build(
            2,
            1,
            crate::gallery::layout::CardMetrics {
                width: 1.0,
                height: 1.0,
                spacing: 1.2,
                corner_radius_uv: 0.0,
            },
        );
        let (first, rest) = layout.items_mut().split_at_mut(1);
        for _ in 0..200 {
            relax(&mut first[0], true, true, 0.1, &options);
            relax(&mut rest[0], false, true, 0.1, &options);
        }
        let hovered = &layout.items()[0].visual;
        let other = &layout.items()[1].visual;
        assert!((hovered.hover_current - 1.0).abs() < 1e-6);
        assert!(hovered.greyscale_current.abs() < 1e-6);
        assert!((other.greyscale_current - 1.0).abs() < 1e-6);
        assert!((other.opacity_current - options.dimmed_opacity).abs() < 1e-6);
    }
}
