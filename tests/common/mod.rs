#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use content_model::{ContentSnapshot, ProjectRecord};
use rust_coverflow::config::Configuration;
use rust_coverflow::events::{DecodedImage, TextureOutcome, TextureResult};
use rust_coverflow::gallery::Gallery;
use rust_coverflow::gallery::backend::{
    RenderBackend, RenderFault, SurfaceId, SurfaceSpec, TextureId, TextureSource, Transform,
};
use rust_coverflow::gallery::viewport::Viewport;
use rust_coverflow::gallery::visual::{ShaderParam, Uniform};
use rust_coverflow::tween::Timelines;

pub const WIDTH_PX: f64 = 1600.0;
pub const HEIGHT_PX: f64 = 900.0;
pub const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct FakeSurface {
    pub texture: TextureId,
    pub width: f64,
    pub height: f64,
    pub transform: Transform,
    pub params: HashMap<Uniform, ShaderParam>,
}

/// Records everything the gallery asks of a renderer. Hit tests use the same
/// plane projection as the wgpu backend.
#[derive(Debug)]
pub struct FakeBackend {
    pub viewport: Viewport,
    pub textures: Vec<TextureSource>,
    pub surfaces: Vec<FakeSurface>,
    pub param_writes: usize,
    pub transform_writes: usize,
    pub renders: usize,
    pub restores: usize,
    pub clears: usize,
    pub fail_next_render: Option<RenderFault>,
}

impl FakeBackend {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            textures: Vec::new(),
            surfaces: Vec::new(),
            param_writes: 0,
            transform_writes: 0,
            renders: 0,
            restores: 0,
            clears: 0,
            fail_next_render: None,
        }
    }

    pub fn surface(&self, id: SurfaceId) -> &FakeSurface {
        &self.surfaces[id.0 as usize]
    }

    pub fn scalar(&self, id: SurfaceId, uniform: Uniform) -> Option<f64> {
        match self.surface(id).params.get(&uniform) {
            Some(ShaderParam::Scalar(v)) => Some(*v),
            _ => None,
        }
    }
}

impl RenderBackend for FakeBackend {
    fn upload_texture(&mut self, source: &TextureSource) -> TextureId {
        self.textures.push(source.clone());
        TextureId(self.textures.len() as u32 - 1)
    }

    fn create_surface(&mut self, spec: SurfaceSpec) -> SurfaceId {
        self.surfaces.push(FakeSurface {
            texture: spec.texture,
            width: spec.width,
            height: spec.height,
            transform: spec.transform,
            params: spec.params.into_iter().collect(),
        });
        SurfaceId(self.surfaces.len() as u32 - 1)
    }

    fn set_param(&mut self, surface: SurfaceId, uniform: Uniform, value: ShaderParam) {
        self.param_writes += 1;
        if let Some(s) = self.surfaces.get_mut(surface.0 as usize) {
            s.params.insert(uniform, value);
        }
    }

    fn set_transform(&mut self, surface: SurfaceId, transform: Transform) {
        self.transform_writes += 1;
        if let Some(s) = self.surfaces.get_mut(surface.0 as usize) {
            s.transform = transform;
        }
    }

    fn intersect(&self, ndc: [f64; 2], candidates: &[SurfaceId]) -> Option<SurfaceId> {
        let [x, y] = self.viewport.ndc_to_plane(ndc);
        candidates
            .iter()
            .copied()
            .filter(|id| {
                let s = self.surface(*id);
                let half_w = s.width * s.transform.scale / 2.0;
                let half_h = s.height * s.transform.scale / 2.0;
                (x - s.transform.x).abs() <= half_w && (y - s.transform.y).abs() <= half_h
            })
            .min_by(|a, b| {
                let da = (self.surface(*a).transform.x - x).abs();
                let db = (self.surface(*b).transform.x - x).abs();
                da.total_cmp(&db)
            })
    }

    fn render(&mut self) -> Result<(), RenderFault> {
        if let Some(fault) = self.fail_next_render.take() {
            return Err(fault);
        }
        self.renders += 1;
        Ok(())
    }

    fn resize(&mut self, width_px: u32, height_px: u32) {
        self.viewport.width_px = f64::from(width_px);
        self.viewport.height_px = f64::from(height_px);
    }

    fn restore(&mut self) -> Result<(), RenderFault> {
        self.restores += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.surfaces.clear();
        self.textures.clear();
    }
}

pub fn snapshot(n: usize) -> Arc<ContentSnapshot> {
    Arc::new(ContentSnapshot {
        projects: (0..n)
            .map(|i| ProjectRecord {
                title: format!("Project {i}"),
                category: "Branding".into(),
                image_url: format!("img/{i}.png"),
                url: format!("https://example.com/work/{i}"),
            })
            .collect(),
    })
}

pub fn config(intro: bool) -> Configuration {
    let mut cfg = Configuration::default();
    cfg.intro.enabled = intro;
    cfg
}

pub fn viewport(cfg: &Configuration) -> Viewport {
    Viewport::new(WIDTH_PX, HEIGHT_PX, &cfg.layout.camera)
}

pub fn build(
    content: Arc<ContentSnapshot>,
    cfg: &Configuration,
    now: Instant,
) -> Gallery<FakeBackend> {
    let viewport = viewport(cfg);
    Gallery::new(
        content,
        cfg,
        viewport,
        FakeBackend::new(viewport),
        Box::new(Timelines::new()),
        now,
    )
    .unwrap()
}

pub fn tiny_image() -> Arc<DecodedImage> {
    Arc::new(DecodedImage {
        width: 1,
        height: 1,
        pixels: vec![200, 40, 40, 255],
    })
}

/// Answer every outstanding texture request with a decoded image.
pub fn load_all(gallery: &mut Gallery<FakeBackend>) {
    for request in gallery.texture_requests() {
        gallery.on_texture(TextureResult {
            url: request.url,
            generation: request.generation,
            outcome: TextureOutcome::Loaded(tiny_image()),
        });
    }
}

/// A gallery past loading, without intro, ticked once.
pub fn interactive(n: usize) -> (Gallery<FakeBackend>, Instant) {
    let now = Instant::now();
    let cfg = config(false);
    let mut gallery = build(snapshot(n), &cfg, now);
    load_all(&mut gallery);
    gallery.tick(now);
    (gallery, now)
}

/// Tick `frames` times at 16 ms spacing; returns the last frame time.
pub fn run_frames(gallery: &mut Gallery<FakeBackend>, mut now: Instant, frames: usize) -> Instant {
    for _ in 0..frames {
        now += FRAME;
        gallery.tick(now);
    }
    now
}

/// Pixel coordinates of the viewport centre.
pub fn centre() -> (f64, f64) {
    (WIDTH_PX / 2.0, HEIGHT_PX / 2.0)
}
