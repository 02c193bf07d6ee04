use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    renderer::{
        mesh::{MeshPipeline, MeshRenderer},
        particle::{ParticlePipeline, ParticleRenderer},
        render_target::{RenderTarget, DEPTH_TEXTURE_FORMAT},
        samplers::Samplers,
    },
    viewport::{Drawable, Viewport, ViewportId, ViewportState},
    window::{PixelRect, Size, Window},
};

/// `#050816`, the page background behind every viewport.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0017,
    g: 0.0024,
    b: 0.0080,
    a: 1.0,
};

/// Identifies the scene a set of GPU resources was built from. Remounting
/// bumps the revision and finishing a load changes the state, both of which
/// invalidate the upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ResourceKey {
    revision: u64,
    state: ViewportState,
}

impl ResourceKey {
    fn of(viewport: &Viewport) -> Option<Self> {
        viewport.is_mounted().then(|| Self {
            revision: viewport.revision(),
            state: viewport.state(),
        })
    }
}

enum GpuDrawable {
    Points(ParticleRenderer),
    Mesh(MeshRenderer),
}

struct ViewportResources {
    key: ResourceKey,
    drawable: GpuDrawable,
}

pub struct Renderer {
    surface: wgpu::Surface,
    surface_format: wgpu::TextureFormat,
    size: Size,
    device: wgpu::Device,
    queue: wgpu::Queue,
    depth: RenderTarget,
    samplers: Samplers,
    particle_pipeline: ParticlePipeline,
    mesh_pipeline: MeshPipeline,
    resources: HashMap<ViewportId, ViewportResources>,
}

impl Renderer {
    pub async fn new(window: &impl Window) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::Backends::PRIMARY);
        let surface = unsafe { instance.create_surface(&window) };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No adapter found")?;
        info!("Using adapter {:?}", adapter.get_info());

        let surface_format = surface
            .get_preferred_format(&adapter)
            .context("No preferred format found")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await?;

        let size = window.size();

        Self::configure_surface(&surface, &device, surface_format, size);

        let depth = RenderTarget::new(&device, "Depth Texture", DEPTH_TEXTURE_FORMAT, size);
        let samplers = Samplers::new(&device);
        let particle_pipeline = ParticlePipeline::new(&device, surface_format, depth.format);
        let mesh_pipeline = MeshPipeline::new(&device, surface_format, depth.format);

        Ok(Self {
            surface,
            surface_format,
            size,
            device,
            queue,
            depth,
            samplers,
            particle_pipeline,
            mesh_pipeline,
            resources: HashMap::new(),
        })
    }

    fn configure_surface(
        surface: &wgpu::Surface,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: Size,
    ) {
        surface.configure(
            device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: size.width,
                height: size.height,
                present_mode: wgpu::PresentMode::Fifo,
            },
        )
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
        if size.is_empty() {
            return;
        }
        Self::configure_surface(&self.surface, &self.device, self.surface_format, size);
        self.depth = RenderTarget::new(&self.device, "Depth Texture", DEPTH_TEXTURE_FORMAT, size);
    }

    /// Drops uploads of viewports that went away or changed scene and
    /// uploads whatever is missing.
    fn sync(&mut self, viewports: &[Viewport]) {
        self.resources.retain(|id, resources| {
            let current = viewports
                .iter()
                .find(|viewport| viewport.id() == *id)
                .and_then(ResourceKey::of);
            let keep = current == Some(resources.key);
            if !keep {
                debug!("Releasing GPU resources of viewport {:?}", id);
            }
            keep
        });

        for viewport in viewports {
            if self.resources.contains_key(&viewport.id()) {
                continue;
            }
            let (key, drawable) = match (ResourceKey::of(viewport), viewport.drawable()) {
                (Some(key), Some(drawable)) => (key, drawable),
                _ => continue,
            };
            let drawable = match drawable {
                Drawable::Points { positions, .. } => GpuDrawable::Points(
                    self.particle_pipeline.create_renderer(&self.device, positions),
                ),
                Drawable::Mesh { mesh, texture, .. } => {
                    GpuDrawable::Mesh(self.mesh_pipeline.create_renderer(
                        &self.device,
                        &self.queue,
                        &self.samplers,
                        mesh,
                        texture,
                    ))
                }
            };
            debug!("Uploaded viewport {:?} in state {:?}", viewport.id(), key.state);
            self.resources
                .insert(viewport.id(), ViewportResources { key, drawable });
        }
    }

    /// Draws every mounted viewport, in slice order, into its region of one
    /// shared frame.
    pub fn render(&mut self, viewports: &[Viewport]) -> Result<()> {
        if self.size.is_empty() {
            return Ok(());
        }

        self.sync(viewports);

        let mut draws: Vec<(&ViewportResources, PixelRect)> = Vec::new();
        for viewport in viewports {
            let rect = viewport.rect().to_pixels(self.size);
            if rect.is_empty() {
                continue;
            }
            let (resources, drawable) =
                match (self.resources.get(&viewport.id()), viewport.drawable()) {
                    (Some(resources), Some(drawable)) => (resources, drawable),
                    _ => continue,
                };
            match (&resources.drawable, drawable) {
                (
                    GpuDrawable::Points(renderer),
                    Drawable::Points {
                        model,
                        camera,
                        material,
                        ..
                    },
                ) => renderer.update(&self.queue, model, &camera, &material, rect),
                (
                    GpuDrawable::Mesh(renderer),
                    Drawable::Mesh {
                        decal,
                        model,
                        camera,
                        material,
                        ..
                    },
                ) => renderer.update(&self.queue, model, decal, &camera, &material, rect),
                _ => continue,
            }
            draws.push((resources, rect));
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                Self::configure_surface(&self.surface, &self.device, self.surface_format, self.size);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Timed out acquiring the next surface texture");
                return Ok(());
            }
            Err(error) => return Err(error).context("Failed to get next surface texture"),
        };

        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewports Command Encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewports Render Pass"),
                color_attachments: &[wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: true,
                    },
                }],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.texture_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: false,
                    }),
                    stencil_ops: None,
                }),
            });

            for (resources, rect) in draws {
                rpass.set_viewport(
                    rect.x as f32,
                    rect.y as f32,
                    rect.width as f32,
                    rect.height as f32,
                    0.,
                    1.,
                );
                rpass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
                match &resources.drawable {
                    GpuDrawable::Points(renderer) => {
                        renderer.draw(&self.particle_pipeline, &mut rpass)
                    }
                    GpuDrawable::Mesh(renderer) => renderer.draw(&self.mesh_pipeline, &mut rpass),
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));

        surface_texture.present();

        Ok(())
    }
}
