use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;
use wgpu::SurfaceError;
use winit::window::Window;

use crate::config::CameraOptions;
use crate::gallery::backend::{
    RenderBackend, RenderFault, SurfaceId, SurfaceSpec, TextureId, TextureSource, Transform,
};
use crate::gallery::viewport::Viewport;
use crate::gallery::visual::{ShaderParam, Uniform};

use super::camera;

/// Segments per card edge; the vertex waves need a dense mesh.
const GRID_SEGMENTS: u32 = 32;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CardVertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CardUniforms {
    view_proj: [[f32; 4]; 4],
    placement: [f32; 4],
    size: [f32; 4],
    motion: [f32; 4],
    morph: [f32; 4],
    mouse: [f32; 4],
}

impl CardUniforms {
    fn opacity(&self) -> f32 {
        self.size[3]
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct Card {
    width: f64,
    height: f64,
    transform: Transform,
    uniforms: CardUniforms,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    dirty: bool,
}

fn grid_mesh(segments: u32) -> (Vec<CardVertex>, Vec<u32>) {
    let n = segments;
    let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
    for row in 0..=n {
        let v = row as f32 / n as f32;
        for col in 0..=n {
            let u = col as f32 / n as f32;
            vertices.push(CardVertex {
                pos: [u - 0.5, 0.5 - v],
                uv: [u, v],
            });
        }
    }
    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    for row in 0..n {
        for col in 0..n {
            let a = row * (n + 1) + col;
            let b = a + n + 1;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    (vertices, indices)
}

/// Card renderer on a window surface.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    clear: wgpu::Color,
    viewport: Viewport,
    textures: Vec<Option<GpuTexture>>,
    cards: Vec<Option<Card>>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>, camera: &CameraOptions, background: [u8; 3]) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("coverflow-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "card surface configured",
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("card-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/card.wgsl").into()),
        });
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("card-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("card-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("card-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<CardVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("card-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let (mesh_vertices, mesh_indices) = grid_mesh(GRID_SEGMENTS);
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("card-vertices"),
            contents: bytemuck::cast_slice(&mesh_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("card-indices"),
            contents: bytemuck::cast_slice(&mesh_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let [r, g, b] = background.map(|c| f64::from(c) / 255.0);
        Ok(Self {
            surface,
            device,
            queue,
            pipeline,
            bind_layout,
            sampler,
            vertices,
            indices,
            index_count: mesh_indices.len() as u32,
            clear: wgpu::Color { r, g, b, a: 1.0 },
            viewport: Viewport::new(
                f64::from(config.width),
                f64::from(config.height),
                camera,
            ),
            config,
            textures: Vec::new(),
            cards: Vec::new(),
        })
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.textures
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .map(|t| &t.view)
    }

    fn card_mut(&mut self, id: SurfaceId) -> Option<&mut Card> {
        self.cards.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn write_rgba(&self, width: u32, height: u32, pixels: &[u8]) -> GpuTexture {
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("card-texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            texture.as_image_copy(),
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            extent,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            _texture: texture,
            view,
        }
    }

    fn refresh_projection(&mut self) {
        let view_proj = camera::view_projection(&self.viewport);
        for card in self.cards.iter_mut().flatten() {
            card.uniforms.view_proj = view_proj;
            card.dirty = true;
        }
    }
}

fn apply_param(
    uniforms: &mut CardUniforms,
    uniform: Uniform,
    value: ShaderParam,
    viewport: &Viewport,
) {
    let scalar = match value {
        ShaderParam::Scalar(v) => v as f32,
        ShaderParam::Vector2(x, _) => x as f32,
    };
    match uniform {
        Uniform::Time => uniforms.placement[3] = scalar,
        Uniform::CornerRadius => uniforms.size[2] = scalar,
        Uniform::Opacity => uniforms.size[3] = scalar,
        Uniform::Velocity => uniforms.motion[0] = scalar,
        Uniform::MotionBlur => uniforms.motion[1] = scalar,
        Uniform::Hover => uniforms.motion[2] = scalar,
        Uniform::Greyscale => uniforms.motion[3] = scalar,
        Uniform::MorphIntensity => uniforms.morph[0] = scalar,
        Uniform::WaveSpeed => uniforms.morph[1] = scalar,
        Uniform::VelocityMultiplier => uniforms.morph[2] = scalar,
        Uniform::PullStrength => uniforms.morph[3] = scalar,
        Uniform::Mouse => {
            let ndc = match value {
                ShaderParam::Vector2(x, y) => [x, y],
                ShaderParam::Scalar(v) => [v, v],
            };
            let [x, y] = viewport.ndc_to_plane(ndc);
            uniforms.mouse = [x as f32, y as f32, 0.0, 0.0];
        }
    }
}

fn apply_transform(uniforms: &mut CardUniforms, transform: Transform) {
    uniforms.placement[0] = transform.x as f32;
    uniforms.placement[1] = transform.y as f32;
    uniforms.placement[2] = transform.scale as f32;
}

impl RenderBackend for WgpuBackend {
    fn upload_texture(&mut self, source: &TextureSource) -> TextureId {
        let texture = match source {
            TextureSource::Image(image) => {
                self.write_rgba(image.width, image.height, &image.pixels)
            }
            TextureSource::Solid([r, g, b]) => self.write_rgba(1, 1, &[*r, *g, *b, 255]),
        };
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(Some(texture));
        debug!(texture = id.0, "texture uploaded");
        id
    }

    fn create_surface(&mut self, spec: SurfaceSpec) -> SurfaceId {
        let id = SurfaceId(self.cards.len() as u32);
        let mut uniforms = CardUniforms::zeroed();
        uniforms.view_proj = camera::view_projection(&self.viewport);
        uniforms.size[0] = spec.width as f32;
        uniforms.size[1] = spec.height as f32;
        apply_transform(&mut uniforms, spec.transform);
        for (uniform, value) in &spec.params {
            apply_param(&mut uniforms, *uniform, *value, &self.viewport);
        }

        let Some(view) = self.texture_view(spec.texture) else {
            warn!(texture = spec.texture.0, "surface references an unknown texture");
            self.cards.push(None);
            return id;
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("card-uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("card-bind"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.cards.push(Some(Card {
            width: spec.width,
            height: spec.height,
            transform: spec.transform,
            uniforms,
            buffer,
            bind_group,
            dirty: false,
        }));
        id
    }

    fn set_param(&mut self, surface: SurfaceId, uniform: Uniform, value: ShaderParam) {
        let viewport = self.viewport;
        if let Some(card) = self.card_mut(surface) {
            apply_param(&mut card.uniforms, uniform, value, &viewport);
            card.dirty = true;
        }
    }

    fn set_transform(&mut self, surface: SurfaceId, transform: Transform) {
        if let Some(card) = self.card_mut(surface) {
            card.transform = transform;
            apply_transform(&mut card.uniforms, transform);
            card.dirty = true;
        }
    }

    fn intersect(&self, ndc: [f64; 2], candidates: &[SurfaceId]) -> Option<SurfaceId> {
        let point = self.viewport.ndc_to_plane(ndc);
        candidates
            .iter()
            .filter_map(|id| {
                let card = self.cards.get(id.0 as usize)?.as_ref()?;
                camera::contains(point, &card.transform, card.width, card.height)
                    .then(|| (*id, (card.transform.x - point[0]).abs()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn render(&mut self) -> Result<(), RenderFault> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost) => return Err(RenderFault::ContextLost),
            Err(SurfaceError::Outdated) => {
                debug!("card surface outdated; reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("card surface out of memory");
                return Err(RenderFault::Other("out of memory".into()));
            }
            Err(SurfaceError::Timeout) => {
                warn!("card surface acquisition timed out");
                return Ok(());
            }
            Err(SurfaceError::Other) => {
                warn!("card surface reported an unknown error; retrying");
                self.reconfigure();
                return Ok(());
            }
        };

        for card in self.cards.iter_mut().flatten().filter(|c| c.dirty) {
            self.queue
                .write_buffer(&card.buffer, 0, bytemuck::bytes_of(&card.uniforms));
            card.dirty = false;
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("card-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("card-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_vertex_buffer(0, self.vertices.slice(..));
            rpass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
            for card in self.cards.iter().flatten() {
                if card.uniforms.opacity() <= 0.001
                    || !camera::in_view(&self.viewport, &card.transform, card.width)
                {
                    continue;
                }
                rpass.set_bind_group(0, &card.bind_group, &[]);
                rpass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width_px: u32, height_px: u32) {
        self.config.width = width_px.max(1);
        self.config.height = height_px.max(1);
        self.reconfigure();
        self.viewport.width_px = f64::from(self.config.width);
        self.viewport.height_px = f64::from(self.config.height);
        self.refresh_projection();
        debug!(
            width = self.config.width,
            height = self.config.height,
            "card surface resized",
        );
    }

    fn restore(&mut self) -> Result<(), RenderFault> {
        self.reconfigure();
        self.refresh_projection();
        info!("card surface reconfigured");
        Ok(())
    }

    fn clear(&mut self) {
        let cards = self.cards.iter().flatten().count();
        self.cards.clear();
        self.textures.clear();
        debug!(cards, "card surfaces released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_the_unit_card() {
        let (vertices, indices) = grid_mesh(4);
        assert_eq!(vertices.len(), 25);
        assert_eq!(indices.len(), 4 * 4 * 6);
        assert_eq!(vertices[0].pos, [-0.5, 0.5]);
        assert_eq!(vertices[24].pos, [0.5, -0.5]);
        assert_eq!(vertices[24].uv, [1.0, 1.0]);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn uniforms_pack_to_std140_size() {
        assert_eq!(std::mem::size_of::<CardUniforms>(), 64 + 5 * 16);
    }

    #[test]
    fn params_land_in_their_slots() {
        let viewport = Viewport::new(1000.0, 500.0, &CameraOptions::default());
        let mut uniforms = CardUniforms::zeroed();
        apply_param(&mut uniforms, Uniform::Opacity, ShaderParam::Scalar(0.5), &viewport);
        apply_param(&mut uniforms, Uniform::Greyscale, ShaderParam::Scalar(1.0), &viewport);
        apply_param(&mut uniforms, Uniform::Mouse, ShaderParam::Vector2(1.0, 0.0), &viewport);
        assert_eq!(uniforms.opacity(), 0.5);
        assert_eq!(uniforms.motion[3], 1.0);
        assert!((f64::from(uniforms.mouse[0]) - viewport.width_units() / 2.0).abs() < 1e-4);

        apply_transform(&mut uniforms, Transform::at(3.0));
        assert_eq!(uniforms.placement[..3], [3.0, 0.0, 1.0]);
    }
}
