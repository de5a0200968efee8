//! Collaborator contracts the gallery core drives.
//!
//! The core never names a graphics API or an animation library. A renderer
//! implements [`RenderBackend`]; a timeline engine implements [`TweenEngine`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::events::DecodedImage;
use crate::gallery::layout::ItemId;
use crate::gallery::visual::{ShaderParam, Uniform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone)]
pub enum TextureSource {
    Image(Arc<DecodedImage>),
    /// Flat colour used once a load has permanently failed.
    Solid([u8; 3]),
}

/// Placement of a card on the z = 0 plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Transform {
    pub fn at(x: f64) -> Self {
        Self {
            x,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// A textured, shader-parameterized quad.
#[derive(Debug, Clone)]
pub struct SurfaceSpec {
    pub texture: TextureId,
    pub width: f64,
    pub height: f64,
    pub transform: Transform,
    pub params: Vec<(Uniform, ShaderParam)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFault {
    /// Device or drawing context is gone; nothing renders until re-initialized.
    ContextLost,
    Other(String),
}

impl fmt::Display for RenderFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContextLost => f.write_str("rendering context lost"),
            Self::Other(reason) => write!(f, "render failed: {reason}"),
        }
    }
}

impl std::error::Error for RenderFault {}

pub trait RenderBackend {
    fn upload_texture(&mut self, source: &TextureSource) -> TextureId;
    fn create_surface(&mut self, spec: SurfaceSpec) -> SurfaceId;
    fn set_param(&mut self, surface: SurfaceId, uniform: Uniform, value: ShaderParam);
    fn set_transform(&mut self, surface: SurfaceId, transform: Transform);
    /// Closest candidate hit by the ray through `ndc`, if any.
    fn intersect(&self, ndc: [f64; 2], candidates: &[SurfaceId]) -> Option<SurfaceId>;
    fn render(&mut self) -> Result<(), RenderFault>;
    fn resize(&mut self, width_px: u32, height_px: u32);
    /// Rebuild whatever the lost context took with it. Surfaces and textures
    /// created earlier stay valid.
    fn restore(&mut self) -> Result<(), RenderFault>;
    /// Drop every surface and texture.
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimelineId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TweenProperty {
    X,
    Scale,
    Opacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TweenChannel {
    pub item: ItemId,
    pub property: TweenProperty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    Power2Out,
    Power3Out,
    ExpoOut,
    CubicBezier(f64, f64, f64, f64),
}

/// Animate `channel` from `from` to `to` after `delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenSpec {
    pub channel: TweenChannel,
    pub from: f64,
    pub to: f64,
    pub delay: Duration,
    pub duration: Duration,
    pub easing: Easing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub tweens: Vec<TweenSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenEvent {
    Value {
        timeline: TimelineId,
        channel: TweenChannel,
        value: f64,
    },
    Finished(TimelineId),
}

pub trait TweenEngine {
    fn play(&mut self, timeline: Timeline) -> TimelineId;
    /// Advance every running timeline, appending produced values and completions.
    fn advance(&mut self, dt: Duration, out: &mut Vec<TweenEvent>);
    fn kill_all(&mut self);
}
