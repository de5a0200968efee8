//! wgpu card renderer and the winit window that drives the gallery.

mod camera;
mod gpu;
pub mod viewer;

pub use gpu::WgpuBackend;
