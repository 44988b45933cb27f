use std::collections::HashMap;

use tracing::{debug, warn};
use wgpu::*;

use crate::model::{Camera, DirectionalLight, Scene, SceneNode};
use crate::utils::{MeshBuffer, Vertex};
use crate::view::texture::{GpuTexture, TextureImage};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    pub light_dir: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub ambient: f32,
}

impl From<&DirectionalLight> for LightingUniform {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            light_dir: light.direction().to_array(),
            intensity: light.intensity,
            color: light.color,
            ambient: light.ambient,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl From<&SceneNode> for NodeUniform {
    fn from(node: &SceneNode) -> Self {
        let [r, g, b] = node.material.color;
        Self {
            model: node.model_matrix().to_cols_array_2d(),
            color: [r, g, b, 1.0],
        }
    }
}

// Camera and lighting, shared by every draw
pub struct GlobalResources {
    pub camera_buffer: Buffer,
    pub lighting_buffer: Buffer,
    pub bind_group_layout: BindGroupLayout,
    pub bind_group: BindGroup,
}

pub fn create_depth_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
    let depth_texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn create_global_resources(device: &Device) -> GlobalResources {
    let camera_buffer = device.create_buffer(&BufferDescriptor {
        label: Some("camera_buffer"),
        size: std::mem::size_of::<CameraUniform>() as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let lighting_buffer = device.create_buffer(&BufferDescriptor {
        label: Some("lighting_buffer"),
        size: std::mem::size_of::<LightingUniform>() as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("globals_bind_group_layout"),
        entries: &[
            uniform_entry(0, ShaderStages::VERTEX),
            uniform_entry(1, ShaderStages::FRAGMENT),
        ],
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("globals_bind_group"),
        layout: &bind_group_layout,
        entries: &[
            BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
            BindGroupEntry { binding: 1, resource: lighting_buffer.as_entire_binding() },
        ],
    });

    GlobalResources { camera_buffer, lighting_buffer, bind_group_layout, bind_group }
}

pub fn create_node_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("node_bind_group_layout"),
        entries: &[
            uniform_entry(0, ShaderStages::VERTEX | ShaderStages::FRAGMENT),
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub fn create_mesh_pipeline(
    device: &Device,
    format: TextureFormat,
    globals_layout: &BindGroupLayout,
    node_layout: &BindGroupLayout,
) -> RenderPipeline {
    let shader_src = include_str!("../shaders/mesh.wgsl");
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("mesh_shader"),
        source: ShaderSource::Wgsl(shader_src.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("mesh_pipeline_layout"),
        bind_group_layouts: &[globals_layout, node_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("mesh_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
                step_mode: VertexStepMode::Vertex,
                attributes: &[
                    VertexAttribute { offset: 0, shader_location: 0, format: VertexFormat::Float32x3 },
                    VertexAttribute { offset: 12, shader_location: 1, format: VertexFormat::Float32x3 },
                    VertexAttribute { offset: 24, shader_location: 2, format: VertexFormat::Float32x2 },
                ],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState { format, blend: Some(BlendState::REPLACE), write_mask: ColorWrites::ALL })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            cull_mode: Some(Face::Back),
            polygon_mode: PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

/// GPU copy of one scene node
struct NodeResources {
    mesh: MeshBuffer,
    revision: u64,
    uniform_buffer: Buffer,
    bind_group: BindGroup,
    _texture: GpuTexture,
}

///////////////////////////////////////////////////////////////////////////////

/// Forward renderer for a [`Scene`] plus the egui overlay
pub struct Renderer {
    pub format: TextureFormat,
    pub alpha_mode: CompositeAlphaMode,
    pub width: u32,
    pub height: u32,

    pipeline: RenderPipeline,
    globals: GlobalResources,
    depth_view: TextureView,
    nodes: Vec<NodeResources>,
    clear_color: Color,

    // UI
    pub egui_renderer: egui_wgpu::Renderer,
    pub egui_primitives: Option<Vec<egui::ClippedPrimitive>>,
    pub egui_full_output: Option<egui::FullOutput>,
    pub egui_dpr: f32,
}

impl Renderer {
    /// `images` maps material texture paths to decoded images; missing entries render white
    pub fn new(
        device: &Device,
        queue: &Queue,
        surface_config: &SurfaceConfiguration,
        scene: &Scene,
        images: &HashMap<String, TextureImage>,
    ) -> Self {
        let globals = create_global_resources(device);
        let node_layout = create_node_bind_group_layout(device);
        let pipeline = create_mesh_pipeline(device, surface_config.format, &globals.bind_group_layout, &node_layout);
        let (_, depth_view) = create_depth_texture(device, surface_config.width, surface_config.height);

        let white = TextureImage::white();
        let nodes = scene
            .nodes
            .iter()
            .map(|node| {
                let image = match &node.material.texture {
                    Some(path) => images.get(path).unwrap_or_else(|| {
                        warn!(node = %node.name, path = %path, "no image loaded for texture");
                        &white
                    }),
                    None => &white,
                };
                let texture = GpuTexture::upload(device, queue, image, &node.name);
                let uniform_buffer = device.create_buffer(&BufferDescriptor {
                    label: Some(node.name.as_str()),
                    size: std::mem::size_of::<NodeUniform>() as BufferAddress,
                    usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&BindGroupDescriptor {
                    label: Some(node.name.as_str()),
                    layout: &node_layout,
                    entries: &[
                        BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                        BindGroupEntry { binding: 1, resource: BindingResource::TextureView(&texture.view) },
                        BindGroupEntry { binding: 2, resource: BindingResource::Sampler(&texture.sampler) },
                    ],
                });
                NodeResources {
                    mesh: node.mesh.upload(device),
                    revision: node.revision,
                    uniform_buffer,
                    bind_group,
                    _texture: texture,
                }
            })
            .collect();

        let [r, g, b] = scene.background;
        Self {
            format: surface_config.format,
            alpha_mode: surface_config.alpha_mode,
            width: surface_config.width,
            height: surface_config.height,
            pipeline,
            globals,
            depth_view,
            nodes,
            clear_color: Color { r: r as f64, g: g as f64, b: b as f64, a: 1.0 },
            egui_renderer: egui_wgpu::Renderer::new(device, surface_config.format, egui_wgpu::RendererOptions::default()),
            egui_primitives: None,
            egui_full_output: None,
            egui_dpr: 1.0,
        }
    }

    fn surface_config(&self) -> SurfaceConfiguration {
        SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.format,
            width: self.width,
            height: self.height,
            present_mode: PresentMode::Fifo,
            alpha_mode: self.alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    /// Reconfigure the surface and depth buffer; zero sizes (minimised window) are ignored
    pub fn resize(&mut self, device: &Device, surface: &Surface, width: u32, height: u32) {
        if width == 0 || height == 0 || (width == self.width && height == self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        surface.configure(device, &self.surface_config());
        self.depth_view = create_depth_texture(device, width, height).1;
        debug!(width, height, "surface resized");
    }

    /// Upload camera, light and node state for the coming frame
    pub fn prepare(&mut self, device: &Device, queue: &Queue, scene: &Scene, camera: &Camera) {
        let camera_uniform = CameraUniform { view_proj: camera.view_proj().to_cols_array_2d() };
        queue.write_buffer(&self.globals.camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));
        let lighting = LightingUniform::from(&scene.light);
        queue.write_buffer(&self.globals.lighting_buffer, 0, bytemuck::bytes_of(&lighting));

        for (node, gpu) in scene.nodes.iter().zip(self.nodes.iter_mut()) {
            if node.revision != gpu.revision {
                gpu.mesh = node.mesh.upload(device);
                gpu.revision = node.revision;
            }
            queue.write_buffer(&gpu.uniform_buffer, 0, bytemuck::bytes_of(&NodeUniform::from(node)));
        }
    }

    pub fn draw_frame(&mut self, device: &Device, queue: &Queue, surface: &Surface) -> Result<(), SurfaceError> {
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                surface.configure(device, &self.surface_config());
                surface.get_current_texture()?
            }
            Err(SurfaceError::Timeout) => {
                warn!("surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("encoder"),
        });

        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.globals.bind_group, &[]);

            for node in &self.nodes {
                if node.mesh.index_count == 0 {
                    continue;
                }
                rp.set_bind_group(1, &node.bind_group, &[]);
                rp.set_vertex_buffer(0, node.mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(node.mesh.index_buffer.slice(..), IndexFormat::Uint32);
                rp.draw_indexed(0..node.mesh.index_count, 0, 0..1);
            }
        }

        let mut command_buffers = Vec::new();
        if let (Some(egui_primitives), Some(egui_full_output)) = (self.egui_primitives.take(), self.egui_full_output.take()) {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.width, self.height],
                pixels_per_point: self.egui_dpr,
            };

            // Upload egui textures
            for (id, image_delta) in &egui_full_output.textures_delta.set {
                self.egui_renderer.update_texture(device, queue, *id, image_delta);
            }
            command_buffers = self
                .egui_renderer
                .update_buffers(device, queue, &mut encoder, &egui_primitives, &screen_descriptor);

            // Render egui overlay
            {
                let egui_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some("egui_render_pass"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                self.egui_renderer
                    .render(&mut egui_pass.forget_lifetime(), &egui_primitives, &screen_descriptor);
            }

            for id in &egui_full_output.textures_delta.free {
                self.egui_renderer.free_texture(id);
            }
        }

        queue.submit(command_buffers.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();
        Ok(())
    }
}
