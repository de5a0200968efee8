use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

/// Continuous-time scroll physics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PhysicsOptions {
    /// Velocity retained per reference frame (0.8 = quick stop, 0.9 = long glide).
    pub speed_decay: f64,
    /// Fraction of the remaining distance the rendered position covers per reference frame.
    pub lerp_factor: f64,
    /// Wheel sensitivity multiplier.
    pub velocity_scale: f64,
    /// Velocity clamp, in world units per reference frame.
    pub max_velocity: f64,
    /// Below this speed the simulator considers itself at rest.
    pub stop_threshold: f64,
    /// Frame rate the per-frame factors above were tuned at.
    pub reference_fps: f64,
    /// Longest frame delta fed to the integrator.
    #[serde(with = "humantime_serde")]
    pub max_frame_delta: Duration,
}

impl PhysicsOptions {
    /// Wheel deltas arrive in pixels; this maps them onto the velocity scale.
    pub const WHEEL_PIXEL_FACTOR: f64 = 0.01;

    fn validate(&self) -> Result<()> {
        ensure!(
            self.speed_decay > 0.0 && self.speed_decay < 1.0,
            "physics.speed-decay must be within (0, 1)"
        );
        ensure!(
            self.lerp_factor > 0.0 && self.lerp_factor < 1.0,
            "physics.lerp-factor must be within (0, 1)"
        );
        ensure!(
            self.velocity_scale > 0.0,
            "physics.velocity-scale must be positive"
        );
        ensure!(
            self.max_velocity > 0.0,
            "physics.max-velocity must be positive"
        );
        ensure!(
            self.stop_threshold > 0.0 && self.stop_threshold < self.max_velocity,
            "physics.stop-threshold must be positive and below max-velocity"
        );
        ensure!(
            self.reference_fps > 0.0,
            "physics.reference-fps must be positive"
        );
        ensure!(
            self.max_frame_delta > Duration::ZERO,
            "physics.max-frame-delta must be positive"
        );
        Ok(())
    }

    /// Upper bound of `dt * reference_fps` after frame-delta clamping.
    pub fn max_scaled_step(&self) -> f64 {
        self.max_frame_delta.as_secs_f64() * self.reference_fps
    }
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self {
            speed_decay: 0.85,
            lerp_factor: 0.12,
            velocity_scale: 0.8,
            max_velocity: 8.0,
            stop_threshold: 0.01,
            reference_fps: 60.0,
            max_frame_delta: Duration::from_secs_f64(1.0 / 30.0),
        }
    }
}

/// Pointer and touch drag behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DragOptions {
    /// Live velocity nudge per world unit dragged with a mouse.
    pub mouse_nudge: f64,
    /// Live velocity nudge per world unit dragged with a finger.
    pub touch_nudge: f64,
    /// Scale applied to the release momentum of a mouse drag.
    pub mouse_momentum: f64,
    /// Scale applied to the release momentum of a touch drag.
    pub touch_momentum: f64,
    /// Trailing window considered when estimating release momentum.
    #[serde(with = "humantime_serde")]
    pub sample_window: Duration,
    /// Maximum number of drag samples retained.
    pub max_samples: usize,
    /// Horizontal travel (px) beyond which a press is a drag rather than a click.
    pub click_slop_px: f64,
}

impl DragOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.mouse_nudge >= 0.0 && self.touch_nudge >= 0.0,
            "drag nudges must not be negative"
        );
        ensure!(
            self.mouse_momentum >= 0.0 && self.touch_momentum >= 0.0,
            "drag momentum scales must not be negative"
        );
        ensure!(
            self.max_samples >= 2,
            "drag.max-samples must be at least 2"
        );
        ensure!(
            self.sample_window > Duration::ZERO,
            "drag.sample-window must be positive"
        );
        ensure!(
            self.click_slop_px >= 0.0,
            "drag.click-slop-px must not be negative"
        );
        Ok(())
    }
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            mouse_nudge: 0.3,
            touch_nudge: 0.4,
            mouse_momentum: 0.8,
            touch_momentum: 1.2,
            sample_window: Duration::from_millis(100),
            max_samples: 10,
            click_slop_px: 10.0,
        }
    }
}

/// Arrow-key navigation. Each tap adds a fixed velocity impulse; the magnetic snap
/// then settles on whichever card the glide ends nearest to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KeyboardOptions {
    pub impulse: f64,
}

impl Default for KeyboardOptions {
    fn default() -> Self {
        Self { impulse: 0.5 }
    }
}

/// Magnetic snap-to-card settling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SnapOptions {
    pub enabled: bool,
    /// Speed below which snapping may engage. Twice this speed cancels a pursuit.
    pub threshold: f64,
    /// Proportional pull applied per reference frame.
    pub strength: f64,
    /// Cards further than this from the current position are never acquired.
    pub detection_range: f64,
    /// How long the simulator must have been at rest before a new card is acquired.
    #[serde(with = "humantime_serde")]
    pub min_settle_time: Duration,
    /// Minimum spacing between nearest-card searches.
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Remaining distance at which the pursuit completes exactly on the card.
    pub completion_epsilon: f64,
}

impl SnapOptions {
    fn validate(&self, physics: &PhysicsOptions) -> Result<()> {
        ensure!(self.threshold > 0.0, "snap.threshold must be positive");
        ensure!(self.strength > 0.0, "snap.strength must be positive");
        // The pull moves `strength * dt_scaled` of the remaining distance; beyond one
        // full distance per step the pursuit overshoots and oscillates.
        ensure!(
            self.strength * physics.max_scaled_step() <= 1.0,
            "snap.strength {} overshoots at the longest frame step ({:.2} reference frames)",
            self.strength,
            physics.max_scaled_step()
        );
        ensure!(
            self.detection_range > 0.0,
            "snap.detection-range must be positive"
        );
        ensure!(
            self.completion_epsilon > 0.0,
            "snap.completion-epsilon must be positive"
        );
        Ok(())
    }
}

impl Default for SnapOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.15,
            strength: 0.08,
            detection_range: 2.0,
            min_settle_time: Duration::from_millis(300),
            check_interval: Duration::from_millis(100),
            completion_epsilon: 0.01,
        }
    }
}

/// Perspective camera used to convert between pixels and world units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CameraOptions {
    pub fov_degrees: f64,
    pub distance: f64,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fov_degrees: 40.0,
            distance: 10.0,
        }
    }
}

/// Card geometry and ring duplication. Resolved once when the gallery is built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LayoutOptions {
    pub card_width_px: f64,
    pub max_card_height_px: f64,
    /// Width over height.
    pub card_aspect: f64,
    pub card_gap_px: f64,
    pub corner_radius_px: f64,
    /// Number of duplicate rings kept alive around the viewer. Must be odd.
    pub rings: usize,
    pub camera: CameraOptions,
}

impl LayoutOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.card_width_px > 0.0 && self.max_card_height_px > 0.0,
            "layout card dimensions must be positive"
        );
        ensure!(self.card_aspect > 0.0, "layout.card-aspect must be positive");
        ensure!(self.card_gap_px >= 0.0, "layout.card-gap-px must not be negative");
        ensure!(
            self.rings >= 3 && self.rings % 2 == 1,
            "layout.rings must be an odd number of at least 3"
        );
        ensure!(
            self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0,
            "layout.camera.fov-degrees must be within (0, 180)"
        );
        ensure!(
            self.camera.distance > 0.0,
            "layout.camera.distance must be positive"
        );
        Ok(())
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            card_width_px: 640.0,
            max_card_height_px: 320.0,
            card_aspect: 1.5,
            card_gap_px: 24.0,
            corner_radius_px: 8.0,
            rings: 5,
            camera: CameraOptions::default(),
        }
    }
}

/// Per-card hover, greyscale and opacity shading plus the velocity morph shader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VisualOptions {
    /// Share of the gap to its target a visual value keeps per reference frame.
    pub retention: f64,
    /// Flat per-tick approach step used under heavy animation load.
    pub heavy_step: f64,
    /// Opacity of cards that are not hovered while another card is.
    pub dimmed_opacity: f64,
    /// Pointer pick runs on every n-th eligible tick while in performance mode.
    pub hover_pick_interval: u32,
    pub morph_intensity: f64,
    pub wave_speed: f64,
    pub velocity_multiplier: f64,
    pub pull_strength: f64,
    /// Concurrent external animations at which performance mode engages.
    pub heavy_animation_threshold: usize,
}

impl VisualOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.retention > 0.0 && self.retention < 1.0,
            "visual.retention must be within (0, 1)"
        );
        ensure!(
            self.heavy_step > 0.0 && self.heavy_step <= 1.0,
            "visual.heavy-step must be within (0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.dimmed_opacity),
            "visual.dimmed-opacity must be within [0, 1]"
        );
        ensure!(
            self.hover_pick_interval > 0,
            "visual.hover-pick-interval must be greater than zero"
        );
        ensure!(
            self.heavy_animation_threshold > 0,
            "visual.heavy-animation-threshold must be greater than zero"
        );
        Ok(())
    }
}

impl Default for VisualOptions {
    fn default() -> Self {
        Self {
            retention: 0.92,
            heavy_step: 0.1,
            dimmed_opacity: 0.2,
            hover_pick_interval: 3,
            morph_intensity: 0.08,
            wave_speed: 0.08,
            velocity_multiplier: 6.0,
            pull_strength: 0.3,
            heavy_animation_threshold: 6,
        }
    }
}

/// One-shot entrance choreography.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IntroOptions {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(with = "humantime_serde")]
    pub stagger: Duration,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Opacity fade starts this long after the card's slide.
    #[serde(with = "humantime_serde")]
    pub opacity_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub opacity_duration: Duration,
    pub initial_scale: f64,
    /// Signed ring-relative card indices taking part (0 = first card of the primary ring).
    pub first_index: i64,
    pub last_index: i64,
}

impl IntroOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.duration > Duration::ZERO,
            "intro.duration must be positive"
        );
        ensure!(
            self.first_index <= self.last_index,
            "intro.first-index must not exceed intro.last-index"
        );
        ensure!(
            self.initial_scale > 0.0,
            "intro.initial-scale must be positive"
        );
        Ok(())
    }
}

impl Default for IntroOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: Duration::from_millis(1400),
            stagger: Duration::from_millis(80),
            initial_delay: Duration::from_millis(150),
            opacity_delay: Duration::from_millis(120),
            opacity_duration: Duration::from_millis(1000),
            initial_scale: 1.08,
            first_index: -4,
            last_index: 2,
        }
    }
}

/// Texture loading and its bounded retry policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoaderOptions {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    pub max_concurrent: usize,
    /// Longest texture edge uploaded to the GPU.
    pub max_texture_dim: u32,
    pub placeholder_color: [u8; 3],
}

impl LoaderOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.max_concurrent > 0,
            "loader.max-concurrent must be greater than zero"
        );
        ensure!(
            self.max_texture_dim > 0,
            "loader.max-texture-dim must be greater than zero"
        );
        Ok(())
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            max_concurrent: 4,
            max_texture_dim: 2048,
            placeholder_color: [0x33, 0x33, 0x33],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WindowOptions {
    pub title: String,
    pub fullscreen: bool,
    pub background: [u8; 3],
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Coverflow".into(),
            fullscreen: false,
            background: [0x0e, 0x0e, 0x0e],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Content manifest (YAML or JSON) listing the gallery's projects.
    pub content_path: Option<PathBuf>,
    pub physics: PhysicsOptions,
    pub drag: DragOptions,
    pub keyboard: KeyboardOptions,
    pub snap: SnapOptions,
    pub layout: LayoutOptions,
    pub visual: VisualOptions,
    pub intro: IntroOptions,
    pub loader: LoaderOptions,
    pub window: WindowOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.physics.validate()?;
        self.drag.validate()?;
        self.snap.validate(&self.physics)?;
        self.layout.validate()?;
        self.visual.validate()?;
        self.intro.validate()?;
        self.loader.validate()?;
        Ok(self)
    }
}
