use crate::gallery::backend::Transform;
use crate::gallery::viewport::Viewport;

const NEAR: f64 = 0.1;
const FAR: f64 = 100.0;

/// Column-major projection * view for a camera at (0, 0, distance) looking
/// down -z, with wgpu's 0..1 clip depth.
pub fn view_projection(viewport: &Viewport) -> [[f32; 4]; 4] {
    let f = 1.0 / (viewport.fov_degrees.to_radians() / 2.0).tan();
    let depth = FAR / (NEAR - FAR);
    let distance = viewport.camera_distance;
    [
        [(f / viewport.aspect()) as f32, 0.0, 0.0, 0.0],
        [0.0, f as f32, 0.0, 0.0],
        [0.0, 0.0, depth as f32, -1.0],
        [0.0, 0.0, (depth * (NEAR - distance)) as f32, distance as f32],
    ]
}

/// Whether `point` on the card plane falls inside a `width` x `height` card
/// placed at `transform`.
pub fn contains(point: [f64; 2], transform: &Transform, width: f64, height: f64) -> bool {
    let half_w = width * transform.scale / 2.0;
    let half_h = height * transform.scale / 2.0;
    (point[0] - transform.x).abs() <= half_w && (point[1] - transform.y).abs() <= half_h
}

/// Whether any part of the card can be on screen horizontally.
pub fn in_view(viewport: &Viewport, transform: &Transform, width: f64) -> bool {
    let reach = viewport.width_units() / 2.0 + width * transform.scale / 2.0;
    transform.x.abs() <= reach
}
