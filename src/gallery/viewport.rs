use crate::config::CameraOptions;

/// Pixel-to-world ratio used before a drawable size is known.
pub const FALLBACK_UNITS_PER_PIXEL: f64 = 0.01;

/// Drawable size plus the perspective camera looking down -z at the card plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width_px: f64,
    pub height_px: f64,
    pub fov_degrees: f64,
    pub camera_distance: f64,
}

impl Viewport {
    pub fn new(width_px: f64, height_px: f64, camera: &CameraOptions) -> Self {
        Self {
            width_px,
            height_px,
            fov_degrees: camera.fov_degrees,
            camera_distance: camera.distance,
        }
    }

    pub fn has_area(&self) -> bool {
        self.width_px > 0.0 && self.height_px > 0.0
    }

    pub fn aspect(&self) -> f64 {
        if self.has_area() {
            self.width_px / self.height_px
        } else {
            1.0
        }
    }

    /// Visible height of the z = 0 plane in world units.
    pub fn height_units(&self) -> f64 {
        2.0 * self.camera_distance * (self.fov_degrees.to_radians() / 2.0).tan()
    }

    pub fn width_units(&self) -> f64 {
        self.height_units() * self.aspect()
    }

    pub fn units_per_pixel(&self) -> f64 {
        if self.has_area() {
            self.width_units() / self.width_px
        } else {
            FALLBACK_UNITS_PER_PIXEL
        }
    }

    pub fn pixels_to_world(&self, px: f64) -> f64 {
        px * self.units_per_pixel()
    }

    /// Normalised device coordinates, +y up.
    pub fn to_ndc(&self, x_px: f64, y_px: f64) -> [f64; 2] {
        if !self.has_area() {
            return [0.0, 0.0];
        }
        [
            (x_px / self.width_px) * 2.0 - 1.0,
            -((y_px / self.height_px) * 2.0 - 1.0),
        ]
    }

    /// Project an NDC point onto the z = 0 plane.
    pub fn ndc_to_plane(&self, ndc: [f64; 2]) -> [f64; 2] {
        [
            ndc[0] * self.width_units() / 2.0,
            ndc[1] * self.height_units() / 2.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(w: f64, h: f64) -> Viewport {
        Viewport::new(w, h, &CameraOptions::default())
    }

    #[test]
    fn zero_sized_drawable_uses_fallback_ratio() {
        let vp = viewport(0.0, 0.0);
        assert_eq!(vp.units_per_pixel(), FALLBACK_UNITS_PER_PIXEL);
        assert_eq!(vp.to_ndc(10.0, 10.0), [0.0, 0.0]);
    }

    #[test]
    fn ratio_matches_frustum_width() {
        let vp = viewport(1600.0, 900.0);
        let expected = 2.0 * 10.0 * 20f64.to_radians().tan() * (1600.0 / 900.0) / 1600.0;
        assert!((vp.units_per_pixel() - expected).abs() < 1e-12);
        assert!((vp.pixels_to_world(1600.0) - vp.width_units()).abs() < 1e-9);
    }

    #[test]
    fn ndc_corners() {
        let vp = viewport(800.0, 600.0);
        assert_eq!(vp.to_ndc(0.0, 0.0), [-1.0, 1.0]);
        assert_eq!(vp.to_ndc(800.0, 600.0), [1.0, -1.0]);
        assert_eq!(vp.to_ndc(400.0, 300.0), [0.0, 0.0]);
    }
}
