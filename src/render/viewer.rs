use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use content_model::ContentSnapshot;
use crossbeam_channel::Receiver;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{CursorIcon, Fullscreen, Window, WindowAttributes},
};

use crate::config::Configuration;
use crate::events::{
    CursorIntent, GalleryEvent, InputEvent, NudgeDirection, PointerKind, TextureRequest,
    TextureResult,
};
use crate::gallery::subscription::{InputRouter, SubscriptionSet};
use crate::gallery::{Gallery, Lifecycle};
use crate::tween::Timelines;

use super::WgpuBackend;

/// Pixels per wheel "line", matching what browsers report for one notch.
const LINE_HEIGHT_PX: f64 = 40.0;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

type CardGallery = Gallery<WgpuBackend>;

/// Channels the viewer shares with the background tasks.
pub struct ViewerLinks {
    /// Receives the texture list once the gallery is built.
    pub to_loader: oneshot::Sender<Vec<TextureRequest>>,
    pub from_loader: Receiver<TextureResult>,
    pub from_watcher: Receiver<Configuration>,
}

struct ViewerApp {
    cfg: Configuration,
    content: Arc<ContentSnapshot>,
    cancel: CancellationToken,
    window: Option<Arc<Window>>,
    gallery: Option<CardGallery>,
    router: InputRouter<CardGallery>,
    subscriptions: SubscriptionSet,
    to_loader: Option<oneshot::Sender<Vec<TextureRequest>>>,
    from_loader: Receiver<TextureResult>,
    from_watcher: Receiver<Configuration>,
    cursor_at: PhysicalPosition<f64>,
    cursor: CursorIntent,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        content: Arc<ContentSnapshot>,
        cancel: CancellationToken,
        links: ViewerLinks,
    ) -> Self {
        Self {
            cfg,
            content,
            cancel,
            window: None,
            gallery: None,
            router: InputRouter::new(),
            subscriptions: SubscriptionSet::default(),
            to_loader: Some(links.to_loader),
            from_loader: links.from_loader,
            from_watcher: links.from_watcher,
            cursor_at: PhysicalPosition::new(0.0, 0.0),
            cursor: CursorIntent::Default,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title(self.cfg.window.title.clone());
        if self.cfg.window.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gallery(&mut self, window: Arc<Window>) -> Result<()> {
        let backend = WgpuBackend::new(
            window,
            &self.cfg.layout.camera,
            self.cfg.window.background,
        )?;
        let viewport = *backend.viewport();
        let gallery = Gallery::new(
            self.content.clone(),
            &self.cfg,
            viewport,
            backend,
            Box::new(Timelines::new()),
            Instant::now(),
        )
        .context("failed to build gallery")?;

        self.subscriptions = Gallery::bind(&self.router);
        if let Some(to_loader) = self.to_loader.take() {
            let requests = gallery.texture_requests();
            debug!(count = requests.len(), "requesting textures");
            if to_loader.send(requests).is_err() {
                warn!("texture loader is gone; cards keep their placeholders");
            }
        }
        self.gallery = Some(gallery);
        Ok(())
    }

    fn dispatch(&mut self, event: InputEvent) {
        if let Some(gallery) = self.gallery.as_mut() {
            self.router.dispatch(gallery, &event);
        }
    }

    fn pointer(&mut self, kind: PointerKind, phase: TouchPhase, x: f64, y: f64) {
        let at = Instant::now();
        let event = match phase {
            TouchPhase::Started => InputEvent::PointerDown { kind, x, y, at },
            TouchPhase::Moved => InputEvent::PointerMove { kind, x, y, at },
            TouchPhase::Ended | TouchPhase::Cancelled => InputEvent::PointerUp { kind, x, y, at },
        };
        self.dispatch(event);
    }

    fn drain_channels(&mut self) {
        let Some(gallery) = self.gallery.as_mut() else {
            return;
        };
        for result in self.from_loader.try_iter() {
            gallery.on_texture(result);
        }
        if let Some(cfg) = self.from_watcher.try_iter().last() {
            gallery.apply_tuning(&cfg);
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gallery) = self.gallery.as_mut() else {
            return;
        };
        gallery.tick(Instant::now());

        if gallery.lifecycle() == Lifecycle::ContextLost {
            if let Err(fault) = gallery.reinitialize() {
                error!(%fault, "failed to restore rendering; exiting event loop");
                event_loop.exit();
                return;
            }
        }

        let events = gallery.drain_events();
        let cursor = gallery.cursor();
        for event in events {
            match event {
                GalleryEvent::Navigate { url } => info!(%url, "open requested"),
                GalleryEvent::HoverChanged(info) => {
                    if let Some(window) = self.window.as_ref() {
                        let title = match info {
                            Some(info) if info.category.is_empty() => {
                                format!("{} | {}", info.title, self.cfg.window.title)
                            }
                            Some(info) => format!(
                                "{} ({}) | {}",
                                info.title, info.category, self.cfg.window.title
                            ),
                            None => self.cfg.window.title.clone(),
                        };
                        window.set_title(&title);
                    }
                }
                GalleryEvent::IntroStarted => debug!("intro started"),
                GalleryEvent::IntroFinished => debug!("intro finished"),
            }
        }
        if cursor != self.cursor {
            self.cursor = cursor;
            if let Some(window) = self.window.as_ref() {
                window.set_cursor(match cursor {
                    CursorIntent::Default => CursorIcon::Default,
                    CursorIntent::Pointer => CursorIcon::Pointer,
                    CursorIntent::Grabbing => CursorIcon::Grabbing,
                });
            }
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gallery.is_none() {
            if let Err(err) = self.init_gallery(window.clone()) {
                error!(error = ?err, "failed to initialize gallery");
                event_loop.exit();
                return;
            }
        }

        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.dispatch(InputEvent::Resize {
                    width_px: f64::from(size.width),
                    height_px: f64::from(size.height),
                });
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.dispatch(InputEvent::Resize {
                    width_px: f64::from(size.width),
                    height_px: f64::from(size.height),
                });
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_at = position;
                self.pointer(PointerKind::Mouse, TouchPhase::Moved, position.x, position.y);
            }
            WindowEvent::CursorLeft { .. } => self.dispatch(InputEvent::PointerLeft),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let phase = match state {
                    ElementState::Pressed => TouchPhase::Started,
                    ElementState::Released => TouchPhase::Ended,
                };
                let PhysicalPosition { x, y } = self.cursor_at;
                self.pointer(PointerKind::Mouse, phase, x, y);
            }
            WindowEvent::Touch(touch) => {
                let PhysicalPosition { x, y } = touch.location;
                self.pointer(PointerKind::Touch, touch.phase, x, y);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // Positive means "scroll down", as in a browser wheel event.
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -f64::from(y) * LINE_HEIGHT_PX,
                    MouseScrollDelta::PixelDelta(pos) => -pos.y,
                };
                self.dispatch(InputEvent::Wheel { delta_y });
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key {
                    Key::Named(NamedKey::ArrowLeft) => {
                        self.dispatch(InputEvent::Key(NudgeDirection::Left))
                    }
                    Key::Named(NamedKey::ArrowRight) => {
                        self.dispatch(InputEvent::Key(NudgeDirection::Right))
                    }
                    Key::Named(NamedKey::Escape) => event_loop.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.drain_channels();
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.subscriptions.dispose();
        if let Some(gallery) = self.gallery.as_mut() {
            gallery.teardown();
        }
        self.cancel.cancel();
    }
}

/// Run the gallery window on the current thread until it closes or `cancel` fires.
pub fn run_windowed(
    cfg: Configuration,
    content: Arc<ContentSnapshot>,
    cancel: CancellationToken,
    links: ViewerLinks,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, content, cancel, links);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}
