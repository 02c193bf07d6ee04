use std::mem::size_of;

use bytemuck::{bytes_of, cast_slice, Pod, Zeroable};
use glam::{const_vec3, vec2, vec4, Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::{
    entity::{Camera, PointMaterial},
    window::PixelRect,
};

const QUAD_VERTICES: [Vec3; 4] = [
    const_vec3!([-0.5, -0.5, 0.]),
    const_vec3!([-0.5, 0.5, 0.]),
    const_vec3!([0.5, -0.5, 0.]),
    const_vec3!([0.5, 0.5, 0.]),
];
const QUAD_INDICES: [u16; 6] = [0, 2, 1, 1, 2, 3];

#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
#[repr(C)]
struct Uniforms {
    mv_mat: Mat4,
    p_mat: Mat4,
    color: Vec4,
    viewport_size: Vec2,
    /// Pixels, or pixels at unit view depth when attenuated.
    particle_size: f32,
    min_pixel_size: f32,
    size_attenuation: u32,
    _pad0: [u32; 3],
}

impl Uniforms {
    fn new(model: Mat4, camera: &Camera, material: &PointMaterial, rect: PixelRect) -> Self {
        let viewport_size = vec2(rect.width.max(1) as f32, rect.height.max(1) as f32);
        // Attenuated points scale with half the viewport height over depth.
        let particle_size = if material.size_attenuation {
            material.size * viewport_size.y * 0.5
        } else {
            material.size
        };
        Self {
            mv_mat: camera.view_matrix() * model,
            p_mat: camera.projection_matrix(rect.aspect_ratio()),
            color: material.color,
            viewport_size,
            particle_size,
            min_pixel_size: material.min_pixel_size,
            size_attenuation: material.size_attenuation as u32,
            ..Default::default()
        }
    }
}

/// Pads flat `(x, y, z)` triples to the 16 byte stride storage buffers use.
fn instances(positions: &[f32]) -> Vec<Vec4> {
    positions
        .chunks_exact(3)
        .map(|p| vec4(p[0], p[1], p[2], 1.))
        .collect()
}

/// Pipeline state shared by every point drawing viewport.
pub struct ParticlePipeline {
    bind_group_layout: wgpu::BindGroupLayout,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

impl ParticlePipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Vertex Buffer"),
            contents: bytes_of(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Index Buffer"),
            contents: bytes_of(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size_of::<Vec4>() as _),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size_of::<Uniforms>() as _),
                    },
                    count: None,
                },
            ],
        });

        let shader_module = device.create_shader_module(&wgpu::include_wgsl!("particle.wgsl"));

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: size_of::<Vec3>() as _,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: "fs_main",
                targets: &[wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                }],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            // Points never occlude each other.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            bind_group_layout,
            render_pipeline,
            vertex_buffer,
            index_buffer,
        }
    }

    /// Uploads a point set once. The buffer lives as long as the returned
    /// renderer.
    pub fn create_renderer(&self, device: &wgpu::Device, positions: &[f32]) -> ParticleRenderer {
        let instances = instances(positions);
        let instance_count = instances.len() as u32;

        // Storage bindings may not be empty.
        let contents = if instances.is_empty() {
            vec![Vec4::ZERO]
        } else {
            instances
        };
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Instance Buffer"),
            contents: cast_slice(contents.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: size_of::<Uniforms>() as _,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: instance_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        ParticleRenderer {
            uniform_buffer,
            _instance_buffer: instance_buffer,
            instance_count,
            bind_group,
        }
    }
}

/// GPU side of one point set.
pub struct ParticleRenderer {
    uniform_buffer: wgpu::Buffer,
    _instance_buffer: wgpu::Buffer,
    instance_count: u32,
    bind_group: wgpu::BindGroup,
}

impl ParticleRenderer {
    pub fn update(
        &self,
        queue: &wgpu::Queue,
        model: Mat4,
        camera: &Camera,
        material: &PointMaterial,
        rect: PixelRect,
    ) {
        let uniforms = Uniforms::new(model, camera, material, rect);
        queue.write_buffer(&self.uniform_buffer, 0, bytes_of(&uniforms));
    }

    pub fn draw<'rpass>(
        &'rpass self,
        pipeline: &'rpass ParticlePipeline,
        rpass: &mut wgpu::RenderPass<'rpass>,
    ) {
        if self.instance_count == 0 {
            return;
        }
        rpass.set_pipeline(&pipeline.render_pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, pipeline.vertex_buffer.slice(..));
        rpass.set_index_buffer(pipeline.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..(QUAD_INDICES.len() as _), 0, 0..self.instance_count);
    }
}
