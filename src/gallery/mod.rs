//! Scroll physics and per-frame pipeline of the coverflow strip.
//!
//! [`Gallery`] owns every piece of simulation state and runs one ordered tick
//! per displayed frame: tweens, wrap, integrate, snap, smooth, wrap, hover,
//! visual state, render. Input arrives between ticks through the handlers
//! registered by [`Gallery::bind`].

pub mod backend;
pub mod hover;
pub mod input;
pub mod intro;
pub mod layout;
pub mod momentum;
pub mod scheduler;
pub mod simulator;
pub mod snap;
pub mod subscription;
pub mod viewport;
pub mod visual;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use content_model::ContentSnapshot;
use tracing::{debug, info, trace, warn};

use crate::config::Configuration;
use crate::error::Error;
use crate::events::{
    CursorIntent, GalleryEvent, HoverInfo, InputEvent, InputKind, NudgeDirection, PointerKind,
    TextureOutcome, TextureRequest, TextureResult,
};
use backend::{
    RenderBackend, RenderFault, SurfaceId, SurfaceSpec, TextureId, TextureSource, Transform,
    TweenEngine, TweenEvent,
};
use hover::HoverTracker;
use input::InputAggregator;
use intro::IntroSequencer;
use layout::{CardMetrics, InfiniteLayout, ItemId};
use scheduler::AnimationScheduler;
use simulator::{FrameStep, ScrollSimulator};
use snap::{SnapController, SnapOutcome};
use subscription::{InputRouter, SubscriptionSet};
use viewport::Viewport;
use visual::{FrameContext, VisualEngine};

static GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting for textures; frames render but nothing moves.
    Loading,
    Intro,
    Interactive,
    /// Rendering stopped until [`Gallery::reinitialize`].
    ContextLost,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureStatus {
    Pending,
    Ready(TextureId),
}

#[derive(Debug, Clone, Copy)]
struct Press {
    kind: PointerKind,
    x: f64,
}

pub struct Gallery<B> {
    backend: B,
    content: Arc<ContentSnapshot>,
    config: Configuration,
    generation: u64,
    viewport: Viewport,
    layout: InfiniteLayout,
    sim: ScrollSimulator,
    snap: SnapController,
    input: InputAggregator,
    hover: HoverTracker,
    intro: IntroSequencer,
    visual: VisualEngine,
    scheduler: AnimationScheduler,
    textures: HashMap<String, TextureStatus>,
    placeholder: Option<TextureId>,
    surfaces: HashMap<SurfaceId, ItemId>,
    lifecycle: Lifecycle,
    resume: Lifecycle,
    press: Option<Press>,
    started_at: Instant,
    last_frame: Option<Instant>,
    frame: u64,
    tween_events: Vec<TweenEvent>,
    events: Vec<GalleryEvent>,
}

impl<B: RenderBackend> Gallery<B> {
    /// Lay out every (record, ring) card. Cards whose record has no image get the
    /// placeholder straight away; the rest wait for [`Gallery::on_texture`].
    pub fn new(
        content: Arc<ContentSnapshot>,
        config: &Configuration,
        viewport: Viewport,
        backend: B,
        engine: Box<dyn TweenEngine>,
        now: Instant,
    ) -> Result<Self, Error> {
        if content.is_empty() {
            return Err(Error::EmptyContent);
        }
        let metrics = CardMetrics::from_viewport(&viewport, &config.layout);
        let layout = InfiniteLayout::build(content.len(), config.layout.rings, metrics);
        let home = layout.home_position();

        let mut textures = HashMap::new();
        for record in &content.projects {
            textures
                .entry(record.image_url.clone())
                .or_insert(TextureStatus::Pending);
        }

        let generation = GENERATION.fetch_add(1, Ordering::Relaxed);
        info!(
            generation,
            records = content.len(),
            cards = layout.items().len(),
            card_width = metrics.width,
            spacing = metrics.spacing,
            "gallery built"
        );

        let mut gallery = Self {
            backend,
            content,
            config: config.clone(),
            generation,
            viewport,
            sim: ScrollSimulator::new(config.physics.clone(), home),
            snap: SnapController::new(config.snap.clone()),
            input: InputAggregator::new(
                &config.physics,
                config.drag.clone(),
                config.keyboard.clone(),
            ),
            hover: HoverTracker::new(config.visual.hover_pick_interval),
            intro: IntroSequencer::new(config.intro.clone()),
            visual: VisualEngine::new(config.visual.clone()),
            scheduler: AnimationScheduler::new(engine, config.visual.heavy_animation_threshold),
            layout,
            textures,
            placeholder: None,
            surfaces: HashMap::new(),
            lifecycle: Lifecycle::Loading,
            resume: Lifecycle::Loading,
            press: None,
            started_at: now,
            last_frame: None,
            frame: 0,
            tween_events: Vec::new(),
            events: Vec::new(),
        };
        if gallery.textures.contains_key("") {
            gallery.resolve_texture("", TextureSource::Solid(config.loader.placeholder_color));
        }
        gallery.finish_loading_if_ready();
        Ok(gallery)
    }

    /// Register the gallery's input handlers on `router`.
    pub fn bind(router: &InputRouter<Self>) -> SubscriptionSet
    where
        B: 'static,
    {
        let mut set = SubscriptionSet::default();
        set.push(router.subscribe(InputKind::Wheel, |gallery: &mut Self, event| {
            if let InputEvent::Wheel { delta_y } = *event {
                gallery.on_wheel(delta_y);
            }
        }));
        set.push(router.subscribe(InputKind::Pointer, |gallery: &mut Self, event| {
            gallery.on_pointer(event);
        }));
        set.push(router.subscribe(InputKind::Keyboard, |gallery: &mut Self, event| {
            if let InputEvent::Key(direction) = *event {
                gallery.on_key(direction);
            }
        }));
        set.push(router.subscribe(InputKind::Resize, |gallery: &mut Self, event| {
            if let InputEvent::Resize {
                width_px,
                height_px,
            } = *event
            {
                gallery.on_resize(width_px, height_px);
            }
        }));
        set
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn simulator(&self) -> &ScrollSimulator {
        &self.sim
    }

    pub fn layout(&self) -> &InfiniteLayout {
        &self.layout
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn snap_target(&self) -> Option<ItemId> {
        self.snap.target().map(|t| t.item)
    }

    pub fn hovered(&self) -> Option<ItemId> {
        self.hover.hovered()
    }

    pub fn is_dragging(&self) -> bool {
        self.input.is_dragging()
    }

    pub fn active_animations(&self) -> usize {
        self.scheduler.active_count()
    }

    pub fn cursor(&self) -> CursorIntent {
        if self.input.is_dragging() {
            CursorIntent::Grabbing
        } else if self.hover.hovered().is_some() {
            CursorIntent::Pointer
        } else {
            CursorIntent::Default
        }
    }

    pub fn drain_events(&mut self) -> Vec<GalleryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Unique image URLs still waiting for a texture.
    pub fn texture_requests(&self) -> Vec<TextureRequest> {
        let mut urls: Vec<&String> = self
            .textures
            .iter()
            .filter(|(url, status)| !url.is_empty() && **status == TextureStatus::Pending)
            .map(|(url, _)| url)
            .collect();
        urls.sort();
        urls.into_iter()
            .map(|url| TextureRequest {
                url: url.clone(),
                generation: self.generation,
            })
            .collect()
    }

    /// Accept a finished load. Results for another build, a torn-down gallery,
    /// or an already resolved URL are ignored.
    pub fn on_texture(&mut self, result: TextureResult) {
        if self.lifecycle == Lifecycle::TornDown || result.generation != self.generation {
            debug!(url = %result.url, "ignoring stale texture result");
            return;
        }
        if self.textures.get(&result.url) != Some(&TextureStatus::Pending) {
            return;
        }
        let source = match result.outcome {
            TextureOutcome::Loaded(image) => TextureSource::Image(image),
            TextureOutcome::Failed => {
                warn!(url = %result.url, "texture unavailable, using placeholder");
                TextureSource::Solid(self.config.loader.placeholder_color)
            }
        };
        self.resolve_texture(&result.url, source);
        self.finish_loading_if_ready();
    }

    fn resolve_texture(&mut self, url: &str, source: TextureSource) {
        let texture = match source {
            TextureSource::Solid(_) => match self.placeholder {
                Some(id) => id,
                None => {
                    let id = self.backend.upload_texture(&source);
                    self.placeholder = Some(id);
                    id
                }
            },
            TextureSource::Image(_) => self.backend.upload_texture(&source),
        };
        self.textures
            .insert(url.to_owned(), TextureStatus::Ready(texture));

        let metrics = self.layout.metrics();
        let opacity = if self.config.intro.enabled && !self.intro.is_done() {
            0.0
        } else {
            1.0
        };
        let params = self.visual.initial_params(metrics.corner_radius_uv, opacity);
        let position = self.sim.rendered_position();
        let mut created = 0;
        for item in self.layout.items_mut() {
            if item.surface.is_some() || self.content.projects[item.index].image_url != url {
                continue;
            }
            let transform = Transform::at(item.resolved_offset() - position);
            let surface = self.backend.create_surface(SurfaceSpec {
                texture,
                width: metrics.width,
                height: metrics.height,
                transform,
                params: params.clone(),
            });
            item.surface = Some(surface);
            item.last_transform = Some(transform);
            self.surfaces.insert(surface, item.id);
            created += 1;
        }
        debug!(url, created, "texture resolved");
    }

    fn finish_loading_if_ready(&mut self) {
        if self.lifecycle != Lifecycle::Loading {
            return;
        }
        if self
            .textures
            .values()
            .any(|status| *status == TextureStatus::Pending)
        {
            return;
        }

        let started = self.config.intro.enabled
            && self.intro.start(
                &mut self.layout,
                &mut self.scheduler,
                self.viewport.width_units(),
            );
        if started {
            self.lifecycle = Lifecycle::Intro;
            self.events.push(GalleryEvent::IntroStarted);
        } else {
            self.intro.skip();
            self.visual
                .restore_opacity(&mut self.layout, &mut self.backend);
            self.lifecycle = Lifecycle::Interactive;
        }
        info!(lifecycle = ?self.lifecycle, "all textures resolved");
    }

    fn accepts_motion(&self) -> bool {
        self.lifecycle == Lifecycle::Interactive
    }

    pub fn on_wheel(&mut self, delta_y: f64) {
        if self.accepts_motion() {
            self.input.on_wheel(&mut self.sim, delta_y);
        }
    }

    pub fn on_key(&mut self, direction: NudgeDirection) {
        if self.accepts_motion() {
            self.input.on_key_nudge(&mut self.sim, direction);
        }
    }

    pub fn on_resize(&mut self, width_px: f64, height_px: f64) {
        self.viewport.width_px = width_px;
        self.viewport.height_px = height_px;
        if width_px > 0.0 && height_px > 0.0 {
            self.backend.resize(width_px as u32, height_px as u32);
        }
    }

    pub fn on_pointer(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::PointerDown { kind, x, y, at } => self.pointer_down(kind, x, y, at),
            InputEvent::PointerMove { kind, x, y, at } => self.pointer_move(kind, x, y, at),
            InputEvent::PointerUp { kind, x, y, at } => self.pointer_up(kind, x, y, at),
            InputEvent::PointerLeft => self.pointer_left(),
            _ => {}
        }
    }

    fn pointer_down(&mut self, kind: PointerKind, x: f64, y: f64, at: Instant) {
        let ndc = self.viewport.to_ndc(x, y);
        self.hover.pointer_moved(ndc);
        self.press = Some(Press { kind, x });
        if !self.accepts_motion() {
            return;
        }
        // A mouse only grabs the strip when pressed on a card.
        let grabs = match kind {
            PointerKind::Touch => true,
            PointerKind::Mouse => self.pick(ndc).is_some(),
        };
        if grabs {
            self.input.on_drag_start(kind, x, at);
            self.snap.clear();
            debug!(?kind, x, "drag started");
        }
    }

    fn pointer_move(&mut self, kind: PointerKind, x: f64, y: f64, at: Instant) {
        self.hover.pointer_moved(self.viewport.to_ndc(x, y));
        if self.input.drag_kind() == Some(kind) {
            let upp = self.viewport.units_per_pixel();
            self.input.on_drag_move(&mut self.sim, x, at, upp);
        }
    }

    fn pointer_up(&mut self, kind: PointerKind, x: f64, y: f64, at: Instant) {
        if self.input.drag_kind() == Some(kind) {
            let upp = self.viewport.units_per_pixel();
            self.input.on_drag_end(&mut self.sim, at, upp);
            // Re-pick on the next eligible tick.
            self.hover.pointer_moved(self.viewport.to_ndc(x, y));
            debug!(velocity = self.sim.velocity(), "drag released");
        }

        let Some(press) = self.press.take() else {
            return;
        };
        if press.kind != kind
            || (x - press.x).abs() > self.config.drag.click_slop_px
            || !self.accepts_motion()
        {
            return;
        }
        let ndc = self.viewport.to_ndc(x, y);
        let Some(item) = self.pick(ndc) else {
            return;
        };
        let Some(record) = self
            .layout
            .get(item)
            .and_then(|item| self.content.get(item.index))
        else {
            return;
        };
        if let Some(url) = record.destination() {
            info!(url, title = %record.title, "navigate");
            self.events.push(GalleryEvent::Navigate {
                url: url.to_owned(),
            });
        }
    }

    fn pointer_left(&mut self) {
        self.hover.pointer_left();
        if self.input.drag_kind() == Some(PointerKind::Mouse) {
            self.input.cancel_drag();
        }
        self.press = None;
    }

    fn cull_distance(&self) -> f64 {
        self.viewport.width_units() * 0.7 + self.layout.metrics().width * 2.0
    }

    fn pickable_surfaces(&self) -> Vec<SurfaceId> {
        let cull = self.cull_distance();
        let position = self.sim.rendered_position();
        self.layout
            .items()
            .iter()
            .filter(|item| item.intro_pose.is_none())
            .filter(|item| (item.resolved_offset() - position).abs() <= cull)
            .filter_map(|item| item.surface)
            .collect()
    }

    fn pick(&self, ndc: [f64; 2]) -> Option<ItemId> {
        let candidates = self.pickable_surfaces();
        self.backend
            .intersect(ndc, &candidates)
            .and_then(|surface| self.surfaces.get(&surface).copied())
    }

    /// Run one frame. Does nothing once the context is lost or after teardown.
    pub fn tick(&mut self, now: Instant) {
        let raw = self
            .last_frame
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        self.last_frame = Some(now);

        match self.lifecycle {
            Lifecycle::ContextLost | Lifecycle::TornDown => return,
            Lifecycle::Loading => {
                self.render();
                return;
            }
            Lifecycle::Intro | Lifecycle::Interactive => {}
        }

        let step = FrameStep::new(raw, &self.config.physics);
        self.frame += 1;

        let mut tween_events = std::mem::take(&mut self.tween_events);
        tween_events.clear();
        self.scheduler.advance(step.dt, &mut tween_events);
        for event in &tween_events {
            if self
                .intro
                .on_event(event, &mut self.layout, &mut self.sim, now)
            {
                self.visual
                    .restore_opacity(&mut self.layout, &mut self.backend);
                self.lifecycle = Lifecycle::Interactive;
                self.events.push(GalleryEvent::IntroFinished);
            }
        }
        self.tween_events = tween_events;

        let intro_active = self.intro.is_active();
        let dragging = self.input.is_dragging();
        if !intro_active {
            self.layout.rewrap(self.sim.rendered_position());
            self.sim.integrate(step, now);
            if let SnapOutcome::Completed { item } =
                self.snap
                    .evaluate(&mut self.sim, &self.layout, dragging, step, now)
            {
                debug!(item = item.0, "settled on card");
            }
        }
        self.sim.smooth(step);
        if !intro_active {
            self.layout.rewrap(self.sim.rendered_position());
        }

        if self.scheduler.observe_frame(now, raw) {
            self.visual.invalidate();
        }
        let mode = self.scheduler.mode();

        let moving = self.sim.is_moving();
        let candidates = self.pickable_surfaces();
        let backend = &self.backend;
        let surfaces = &self.surfaces;
        let change = self
            .hover
            .update(self.frame, dragging || intro_active, moving, mode, |ndc| {
                backend
                    .intersect(ndc, &candidates)
                    .and_then(|surface| surfaces.get(&surface).copied())
            });
        if let Some(hovered) = change {
            let info = hovered
                .and_then(|id| self.layout.get(id))
                .and_then(|item| {
                    self.content.get(item.index).map(|record| HoverInfo {
                        index: item.index,
                        title: record.title.clone(),
                        category: record.category.clone(),
                    })
                });
            self.events.push(GalleryEvent::HoverChanged(info));
        }

        let frame = FrameContext {
            step,
            frame: self.frame,
            elapsed_secs: now.saturating_duration_since(self.started_at).as_secs_f64(),
            rendered_position: self.sim.rendered_position(),
            velocity: self.sim.velocity(),
            pointer_ndc: self.hover.pointer_ndc(),
            hovered: self.hover.hovered(),
            dragging,
            mode,
            cull_distance: self.cull_distance(),
        };
        let stats = self
            .visual
            .update(&mut self.layout, &frame, &mut self.backend);
        trace!(
            visible = stats.visible,
            culled = stats.culled,
            pushed = stats.pushed,
            "visual pass"
        );

        self.render();
    }

    fn render(&mut self) {
        match self.backend.render() {
            Ok(()) => {}
            Err(RenderFault::ContextLost) => self.context_lost(),
            Err(fault) => warn!(%fault, "frame dropped"),
        }
    }

    /// Stop per-frame work until [`Gallery::reinitialize`] is called.
    pub fn context_lost(&mut self) {
        if matches!(
            self.lifecycle,
            Lifecycle::ContextLost | Lifecycle::TornDown
        ) {
            return;
        }
        warn!(lifecycle = ?self.lifecycle, "rendering context lost");
        self.resume = self.lifecycle;
        self.lifecycle = Lifecycle::ContextLost;
        self.input.cancel_drag();
    }

    /// Resume after a context loss. Every uniform and transform is re-sent on
    /// the next tick.
    pub fn reinitialize(&mut self) -> Result<(), RenderFault> {
        if self.lifecycle != Lifecycle::ContextLost {
            return Ok(());
        }
        self.backend.restore()?;
        self.visual.invalidate();
        for item in self.layout.items_mut() {
            item.last_transform = None;
        }
        self.last_frame = None;
        self.lifecycle = self.resume;
        info!(lifecycle = ?self.lifecycle, "rendering context restored");
        Ok(())
    }

    /// Hot-reloadable tuning: physics, drag, keyboard, snap and visual options.
    /// Layout, intro and loader settings only apply to the next build.
    pub fn apply_tuning(&mut self, config: &Configuration) {
        if config.layout != self.config.layout
            || config.intro != self.config.intro
            || config.loader != self.config.loader
        {
            info!("layout, intro and loader changes apply on the next start");
        }
        self.sim.set_physics(config.physics.clone());
        self.input
            .retune(&config.physics, config.drag.clone(), config.keyboard.clone());
        self.snap.set_options(config.snap.clone());
        self.hover.set_pick_interval(config.visual.hover_pick_interval);
        self.scheduler
            .set_heavy_threshold(config.visual.heavy_animation_threshold);
        self.visual.set_options(config.visual.clone());
        self.visual.push_tuning(&self.layout, &mut self.backend);

        let layout = self.config.layout.clone();
        let intro = self.config.intro.clone();
        let loader = self.config.loader.clone();
        self.config = Configuration {
            layout,
            intro,
            loader,
            ..config.clone()
        };
        info!("tuning applied");
    }

    /// Release every animation, surface and texture. Late texture results are
    /// ignored from here on.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        self.scheduler.kill_all();
        self.intro.abort(&mut self.layout);
        self.input.cancel_drag();
        self.snap.clear();
        self.hover.clear();
        self.backend.clear();
        for item in self.layout.items_mut() {
            item.surface = None;
            item.last_transform = None;
        }
        self.surfaces.clear();
        self.placeholder = None;
        self.lifecycle = Lifecycle::TornDown;
        info!("gallery torn down");
    }
}
