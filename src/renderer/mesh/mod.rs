use std::{mem::size_of, num::NonZeroU32};

use bytemuck::{bytes_of, cast_slice, Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;

use crate::{
    assets::TextureData,
    entity::{Camera, MeshMaterial},
    geometry::{MeshData, MeshVertex},
    renderer::samplers::Samplers,
    window::PixelRect,
};

pub const DECAL_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
#[repr(C)]
struct Uniforms {
    mvp_mat: Mat4,
    m_mat: Mat4,
    decal_mat: Mat4,
    color: Vec4,
    /// xyz: direction towards the light, w: ambient term.
    light: Vec4,
    camera_position: Vec4,
    /// x: decal enabled, y: flat shading, z: base color texture.
    flags: [u32; 4],
}

impl Uniforms {
    fn new(
        model: Mat4,
        decal: Option<Mat4>,
        textured: bool,
        camera: &Camera,
        material: &MeshMaterial,
        rect: PixelRect,
    ) -> Self {
        let p_mat = camera.projection_matrix(rect.aspect_ratio());
        let v_mat = camera.view_matrix();

        Self {
            mvp_mat: p_mat * v_mat * model,
            m_mat: model,
            decal_mat: decal.unwrap_or(Mat4::IDENTITY),
            color: material.color,
            light: material.light_direction.normalize_or_zero().extend(material.ambient),
            camera_position: camera.position.extend(1.),
            flags: [
                decal.is_some() as u32,
                material.flat_shading as u32,
                (textured && decal.is_none()) as u32,
                0,
            ],
        }
    }
}

/// Pipeline state shared by every mesh drawing viewport.
pub struct MeshPipeline {
    bind_group_layout: wgpu::BindGroupLayout,
    render_pipeline: wgpu::RenderPipeline,
}

impl MeshPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size_of::<Uniforms>() as _),
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

        let shader_module = device.create_shader_module(&wgpu::include_wgsl!("mesh.wgsl"));

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: size_of::<MeshVertex>() as _,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x3,
                        2 => Float32x4,
                        3 => Float32x2,
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: "fs_main",
                targets: &[color_format.into()],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Imported models do not agree on winding.
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
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
        }
    }

    /// Uploads geometry and the optional texture, used as the decal when one
    /// is projected and as the base color map otherwise. Meshes without a
    /// texture bind a single white texel.
    pub fn create_renderer(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        samplers: &Samplers,
        mesh: &MeshData,
        texture: Option<&TextureData>,
    ) -> MeshRenderer {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: cast_slice(mesh.vertices.as_slice()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: cast_slice(mesh.indices.as_slice()),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Uniform Buffer"),
            size: size_of::<Uniforms>() as _,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let textured = texture.is_some();
        let white;
        let texture = match texture {
            Some(texture) => texture,
            None => {
                white = TextureData::solid([255; 4]);
                &white
            }
        };
        let decal_texture = create_texture(device, queue, texture);
        let decal_texture_view = decal_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&decal_texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&samplers.bilinear),
                },
            ],
        });

        MeshRenderer {
            uniform_buffer,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            textured,
            _decal_texture: decal_texture,
            bind_group,
        }
    }
}

fn create_texture(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Decal Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DECAL_TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: NonZeroU32::new(4 * data.width),
            rows_per_image: NonZeroU32::new(data.height),
        },
        size,
    );
    texture
}

/// GPU side of one mesh and its decal.
pub struct MeshRenderer {
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    textured: bool,
    _decal_texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl MeshRenderer {
    pub fn update(
        &self,
        queue: &wgpu::Queue,
        model: Mat4,
        decal: Option<Mat4>,
        camera: &Camera,
        material: &MeshMaterial,
        rect: PixelRect,
    ) {
        let uniforms = Uniforms::new(model, decal, self.textured, camera, material, rect);
        queue.write_buffer(&self.uniform_buffer, 0, bytes_of(&uniforms));
    }

    pub fn draw<'rpass>(
        &'rpass self,
        pipeline: &'rpass MeshPipeline,
        rpass: &mut wgpu::RenderPass<'rpass>,
    ) {
        if self.index_count == 0 {
            return;
        }
        rpass.set_pipeline(&pipeline.render_pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Vec3};

    use super::*;
    use crate::entity::Decal;

    #[test]
    fn uniforms_match_the_shader_layout() {
        assert_eq!(size_of::<Uniforms>(), 256);
        assert_eq!(size_of::<MeshVertex>(), 48);
    }

    #[test]
    fn flags_follow_decal_and_shading() {
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 200,
            height: 200,
        };
        let camera = Camera::default();

        let ball = Uniforms::new(
            Mat4::IDENTITY,
            Some(Decal::front().projection()),
            true,
            &camera,
            &MeshMaterial::ball(),
            rect,
        );
        assert_eq!(ball.flags, [1, 1, 0, 0]);
        assert_eq!(ball.light, vec3(0., 0., 1.).extend(0.25));

        let planet = Uniforms::new(
            Mat4::IDENTITY,
            None,
            false,
            &camera,
            &MeshMaterial::planet(),
            rect,
        );
        assert_eq!(planet.flags, [0, 0, 0, 0]);
        assert_eq!(planet.decal_mat, Mat4::IDENTITY);
        assert_eq!(planet.camera_position, Vec3::new(0., 0., 5.).extend(1.));
    }

    #[test]
    fn texture_without_decal_is_the_base_color_map() {
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 300,
            height: 200,
        };
        let globe = Uniforms::new(
            Mat4::IDENTITY,
            None,
            true,
            &Camera::default(),
            &MeshMaterial::planet(),
            rect,
        );
        assert_eq!(globe.flags, [0, 0, 1, 0]);
    }
}
