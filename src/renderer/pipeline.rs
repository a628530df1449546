//! WebGPU render pipeline: lit, textured, instanced meshes with depth
//!
//! `RenderState` is the real `GpuResources` implementation. Allocations are
//! kept in a table keyed by `ResourceId`; the world and particle burst only
//! ever hold ids, so releasing an id drops the buffers here.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::vertex::{self, colors};
use crate::driver::FrameTarget;
use crate::error::GameError;
use crate::game::Game;
use crate::world::mesh::MeshData;
use crate::world::{GpuResources, InstanceData, ResourceId, SceneObject};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

enum GpuResource {
    Mesh {
        vertices: wgpu::Buffer,
        indices: wgpu::Buffer,
        index_count: u32,
    },
    Texture {
        texture: wgpu::Texture,
        bind_group: wgpu::BindGroup,
    },
    Instances {
        buffer: wgpu::Buffer,
        capacity: usize,
    },
}

impl GpuResource {
    fn destroy(self) {
        match self {
            GpuResource::Mesh {
                vertices, indices, ..
            } => {
                vertices.destroy();
                indices.destroy();
            }
            GpuResource::Texture { texture, .. } => texture.destroy(),
            GpuResource::Instances { buffer, .. } => buffer.destroy(),
        }
    }
}

/// Main render state
pub struct RenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// 1x1 white, bound for untextured objects
    blank_texture: (wgpu::Texture, wgpu::BindGroup),
    depth_view: wgpu::TextureView,
    /// Per-object instances for the draw list, regrown on demand
    frame_instances: wgpu::Buffer,
    frame_capacity: usize,
    resources: HashMap<ResourceId, GpuResource>,
    next_id: u64,
    /// Viewport size in pixels
    pub size: (u32, u32),
}

impl RenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
    ) -> Result<Self, GameError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("cube-runner-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(|e| GameError::Initialization(format!("device: {}", e)))?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| GameError::Initialization("no surface formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!(
            "Surface config: {}x{}, format {:?}",
            config.width,
            config.height,
            surface_format
        );
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniforms"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("surface_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex::mesh_layout(), vertex::instance_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                // Ground and finish planes are seen from below by the orbit camera
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let blank = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let blank_texture = upload_texture(
            &device,
            &queue,
            &texture_layout,
            &sampler,
            "blank_texture",
            &blank,
        );

        let frame_capacity = 64;
        let frame_instances = create_instance_buffer(&device, "frame_instances", frame_capacity);
        let depth_view = create_depth_view(&device, config.width, config.height);

        Ok(Self {
            surface,
            device,
            queue,
            size: (config.width, config.height),
            config,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler,
            blank_texture,
            depth_view,
            frame_instances,
            frame_capacity,
            resources: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, new_width, new_height);
        }
    }

    /// Number of live allocations
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    fn insert(&mut self, resource: GpuResource) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.resources.insert(id, resource);
        id
    }

    fn texture_bind_group(&self, texture: Option<ResourceId>) -> &wgpu::BindGroup {
        match texture.and_then(|id| self.resources.get(&id)) {
            Some(GpuResource::Texture { bind_group, .. }) => bind_group,
            _ => &self.blank_texture.1,
        }
    }

    fn mesh(&self, id: ResourceId) -> Result<(&wgpu::Buffer, &wgpu::Buffer, u32), GameError> {
        match self.resources.get(&id) {
            Some(GpuResource::Mesh {
                vertices,
                indices,
                index_count,
            }) => Ok((vertices, indices, *index_count)),
            _ => Err(GameError::TransientRender(format!(
                "mesh {:?} is not live",
                id
            ))),
        }
    }

    /// Upload camera and per-object instances for this frame
    fn prepare(&mut self, game: &Game, items: &[SceneObject]) {
        let view_proj = game.camera().view_projection();
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: view_proj.to_cols_array_2d(),
            }),
        );

        if items.len() > self.frame_capacity {
            self.frame_capacity = items.len().next_power_of_two();
            self.frame_instances.destroy();
            self.frame_instances =
                create_instance_buffer(&self.device, "frame_instances", self.frame_capacity);
            log::debug!("Frame instance buffer grown to {}", self.frame_capacity);
        }
        let instances: Vec<InstanceData> = items.iter().map(SceneObject::instance).collect();
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.frame_instances, 0, bytemuck::cast_slice(&instances));
        }
    }

    fn render(&mut self, game: &Game) -> Result<(), GameError> {
        let items = game.world().map(|w| w.draw_list()).unwrap_or_default();
        self.prepare(game, &items);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                let (w, h) = self.size;
                self.resize(w, h);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(GameError::TransientRender(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(colors::SKY),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(1, self.frame_instances.slice(..));

            for (i, item) in items.iter().enumerate() {
                let (vertices, indices, index_count) = self.mesh(item.mesh)?;
                pass.set_bind_group(1, self.texture_bind_group(item.texture), &[]);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                let instance = i as u32;
                pass.draw_indexed(0..index_count, 0, instance..instance + 1);
            }

            if let Some(burst) = game.particles() {
                if let (Some(mesh), Some(instances)) = (burst.mesh(), burst.instance_buffer()) {
                    let (vertices, indices, index_count) = self.mesh(mesh)?;
                    if let Some(GpuResource::Instances { buffer, capacity }) =
                        self.resources.get(&instances)
                    {
                        let count = burst.particles().len().min(*capacity) as u32;
                        pass.set_bind_group(1, &self.blank_texture.1, &[]);
                        pass.set_vertex_buffer(0, vertices.slice(..));
                        pass.set_vertex_buffer(1, buffer.slice(..));
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                        pass.draw_indexed(0..index_count, 0, 0..count);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Release every allocation, including ones the game never handed back
    pub fn dispose(&mut self) {
        let leaked = self.resources.len();
        if leaked > 0 {
            log::warn!("Releasing {} GPU resources still held at teardown", leaked);
        }
        for (_, resource) in self.resources.drain() {
            resource.destroy();
        }
    }
}

impl GpuResources for RenderState {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<ResourceId, GameError> {
        if mesh.indices.is_empty() {
            return Err(GameError::SceneBuild(format!("mesh '{}' is empty", label)));
        }
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        Ok(self.insert(GpuResource::Mesh {
            vertices,
            indices,
            index_count: mesh.indices.len() as u32,
        }))
    }

    fn create_texture(&mut self, label: &str, image: &RgbaImage) -> Result<ResourceId, GameError> {
        let max = self.device.limits().max_texture_dimension_2d;
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 || w > max || h > max {
            return Err(GameError::TextureLoad(format!(
                "texture '{}' is {}x{} (limit {})",
                label, w, h, max
            )));
        }
        let (texture, bind_group) = upload_texture(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            label,
            image,
        );
        Ok(self.insert(GpuResource::Texture {
            texture,
            bind_group,
        }))
    }

    fn create_instance_buffer(
        &mut self,
        label: &str,
        capacity: usize,
    ) -> Result<ResourceId, GameError> {
        let buffer = create_instance_buffer(&self.device, label, capacity);
        Ok(self.insert(GpuResource::Instances { buffer, capacity }))
    }

    fn write_instances(
        &mut self,
        id: ResourceId,
        instances: &[InstanceData],
    ) -> Result<(), GameError> {
        match self.resources.get(&id) {
            Some(GpuResource::Instances { buffer, capacity }) if instances.len() <= *capacity => {
                if !instances.is_empty() {
                    self.queue
                        .write_buffer(buffer, 0, bytemuck::cast_slice(instances));
                }
                Ok(())
            }
            Some(GpuResource::Instances { capacity, .. }) => Err(GameError::TransientRender(
                format!("{} instances exceed capacity {}", instances.len(), capacity),
            )),
            _ => Err(GameError::TransientRender(format!(
                "instance buffer {:?} is not live",
                id
            ))),
        }
    }

    fn release(&mut self, id: ResourceId) {
        if let Some(resource) = self.resources.remove(&id) {
            resource.destroy();
        }
    }
}

impl FrameTarget for RenderState {
    fn draw(&mut self, game: &Game) -> Result<(), GameError> {
        self.render(game)
    }
}

fn create_instance_buffer(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (capacity.max(1) * std::mem::size_of::<InstanceData>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    label: &str,
    image: &RgbaImage,
) -> (wgpu::Texture, wgpu::BindGroup) {
    let (width, height) = image.dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    (texture, bind_group)
}
