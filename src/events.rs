use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NudgeDirection {
    Left,
    Right,
}

impl NudgeDirection {
    pub fn sign(self) -> f64 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Host input, already translated from window-system events. Pointer coordinates
/// are physical pixels from the top-left corner of the drawable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Wheel {
        delta_y: f64,
    },
    PointerDown {
        kind: PointerKind,
        x: f64,
        y: f64,
        at: Instant,
    },
    PointerMove {
        kind: PointerKind,
        x: f64,
        y: f64,
        at: Instant,
    },
    PointerUp {
        kind: PointerKind,
        x: f64,
        y: f64,
        at: Instant,
    },
    PointerLeft,
    Key(NudgeDirection),
    Resize {
        width_px: f64,
        height_px: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Wheel,
    Pointer,
    Keyboard,
    Resize,
}

impl InputEvent {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Wheel { .. } => InputKind::Wheel,
            Self::PointerDown { .. }
            | Self::PointerMove { .. }
            | Self::PointerUp { .. }
            | Self::PointerLeft => InputKind::Pointer,
            Self::Key(_) => InputKind::Keyboard,
            Self::Resize { .. } => InputKind::Resize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverInfo {
    pub index: usize,
    pub title: String,
    pub category: String,
}

/// Outward notifications drained by the host after each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    /// A clicked card carries a destination.
    Navigate { url: String },
    HoverChanged(Option<HoverInfo>),
    IntroStarted,
    IntroFinished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorIntent {
    #[default]
    Default,
    Pointer,
    Grabbing,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureRequest {
    pub url: String,
    /// Gallery build the request belongs to; results from older builds are ignored.
    pub generation: u64,
}

/// RGBA8 pixels ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum TextureOutcome {
    Loaded(Arc<DecodedImage>),
    /// Retries are exhausted; the card shows the placeholder.
    Failed,
}

#[derive(Debug, Clone)]
pub struct TextureResult {
    pub url: String,
    pub generation: u64,
    pub outcome: TextureOutcome,
}
