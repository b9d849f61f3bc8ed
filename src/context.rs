//! The `wgpu` backend: window surface, device, queue and the scene pipeline.

use std::{cell::Cell, collections::HashMap, iter, sync::Arc};

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    data_structures::{
        mesh::SimpleVertex,
        texture::{self, Sampler, Texture},
    },
    gpu::{CompressedImage, DrawContext, GfxError, GraphicsDevice, PrimitiveTopology, ShaderStages, Viewport},
    pipelines::basic::{MATERIAL_GROUP, SceneLayouts, mk_scene_pipeline},
};

/// A GPU buffer. Constant buffers carry the bind group that exposes them to the shader.
#[derive(Debug)]
pub struct Buffer {
    pub buffer: wgpu::Buffer,
    pub bind_group: Option<wgpu::BindGroup>,
}

pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    layouts: SceneLayouts,
    default_texture: Texture,
    next_id: Cell<u64>,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("creating the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter is compatible with the window surface")?;
        log::info!("device and queue");
        // DDS textures are uploaded block-compressed where the adapter allows it.
        let required_features = adapter.features() & wgpu::Features::TEXTURE_COMPRESSION_BC;
        if required_features.is_empty() {
            log::warn!("Adapter has no BC texture compression, compressed DDS textures will fail");
        }
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("requesting the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour; an sRGB surface does the conversion.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let layouts = SceneLayouts::new(&device);
        let pipeline = mk_scene_pipeline(&device, &config, &layouts);
        let default_texture = Texture::create_default(&device, &queue, 0);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            layouts,
            default_texture,
            next_id: Cell::new(1),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn check_size(&self, call: &'static str, label: &str, size: u64) -> Result<(), GfxError> {
        let max = self.device.limits().max_buffer_size;
        if size > max {
            log::error!("{call}: '{label}' needs {size} bytes, the device allows {max}");
            return Err(GfxError::native(
                call,
                format!("{size} bytes exceed the {max} byte limit"),
            ));
        }
        Ok(())
    }

    fn create_buffer_with(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }
}

impl GraphicsDevice for Context {
    type Buffer = Buffer;
    type Texture = Texture;
    type Sampler = Sampler;
    type DepthTarget = Texture;
    type Frame<'a> = Frame<'a>;

    fn create_vertex_buffer(
        &self,
        label: &str,
        vertices: &[SimpleVertex],
    ) -> Result<Buffer, GfxError> {
        if vertices.is_empty() {
            log::error!("create_vertex_buffer: '{label}' has no vertices");
            return Err(GfxError::invalid(format!("vertex buffer '{label}' is empty")));
        }
        let contents: &[u8] = bytemuck::cast_slice(vertices);
        self.check_size("create_vertex_buffer", label, contents.len() as u64)?;
        Ok(Buffer {
            buffer: self.create_buffer_with(label, contents, wgpu::BufferUsages::VERTEX),
            bind_group: None,
        })
    }

    fn create_index_buffer(&self, label: &str, indices: &[u32]) -> Result<Buffer, GfxError> {
        if indices.is_empty() {
            log::error!("create_index_buffer: '{label}' has no indices");
            return Err(GfxError::invalid(format!("index buffer '{label}' is empty")));
        }
        let contents: &[u8] = bytemuck::cast_slice(indices);
        self.check_size("create_index_buffer", label, contents.len() as u64)?;
        Ok(Buffer {
            buffer: self.create_buffer_with(label, contents, wgpu::BufferUsages::INDEX),
            bind_group: None,
        })
    }

    fn create_constant_buffer(&self, label: &str, size: u64) -> Result<Buffer, GfxError> {
        if size == 0 {
            log::error!("create_constant_buffer: '{label}' has zero size");
            return Err(GfxError::invalid(format!("constant buffer '{label}' has zero size")));
        }
        self.check_size("create_constant_buffer", label, size)?;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layouts.uniform,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        });
        Ok(Buffer {
            buffer,
            bind_group: Some(bind_group),
        })
    }

    fn write_buffer(&self, buffer: &Buffer, data: &[u8]) -> Result<(), GfxError> {
        if data.len() as u64 > buffer.buffer.size() {
            return Err(GfxError::invalid(format!(
                "{} bytes do not fit a {} byte buffer",
                data.len(),
                buffer.buffer.size()
            )));
        }
        self.queue.write_buffer(&buffer.buffer, 0, data);
        Ok(())
    }

    fn create_sampler(&self, label: &str) -> Result<Sampler, GfxError> {
        Ok(Sampler::create(&self.device, self.next_id(), label))
    }

    fn create_texture(&self, label: &str, image: &image::DynamicImage) -> Result<Texture, GfxError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(GfxError::invalid(format!("texture '{label}' has no pixels")));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            log::error!("create_texture: '{label}' is {width}x{height}, the device allows {max}");
            return Err(GfxError::native(
                "create_texture",
                format!("{width}x{height} exceeds the {max} texel limit"),
            ));
        }
        Ok(Texture::from_image(
            &self.device,
            &self.queue,
            self.next_id(),
            image,
            Some(label),
        ))
    }

    fn create_compressed_texture(&self, label: &str, image: &CompressedImage) -> Result<Texture, GfxError> {
        image.validate(label)?;
        if !self
            .device
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
        {
            log::error!("create_compressed_texture: '{label}' needs BC texture compression");
            return Err(GfxError::native(
                "create_compressed_texture",
                "the device does not support BC texture compression",
            ));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if image.width > max || image.height > max {
            log::error!(
                "create_compressed_texture: '{label}' is {}x{}, the device allows {max}",
                image.width,
                image.height
            );
            return Err(GfxError::native(
                "create_compressed_texture",
                format!("{}x{} exceeds the {max} texel limit", image.width, image.height),
            ));
        }
        Ok(Texture::from_blocks(
            &self.device,
            &self.queue,
            self.next_id(),
            image,
            Some(label),
        ))
    }

    fn create_depth_target(&self, width: u32, height: u32) -> Result<Texture, GfxError> {
        if width == 0 || height == 0 {
            return Err(GfxError::invalid(format!(
                "depth target dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Texture::create_depth_texture(
            &self.device,
            self.next_id(),
            [width, height],
            "depth_texture",
        ))
    }

    fn resize_swap_chain(&mut self, width: u32, height: u32) -> Result<(), GfxError> {
        if width == 0 || height == 0 {
            return Err(GfxError::invalid(format!(
                "swap chain dimensions must be non-zero, got {width}x{height}"
            )));
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        Ok(())
    }

    fn begin_frame<'a>(
        &'a self,
        depth: &'a Texture,
        viewport: Viewport,
        clear_colour: wgpu::Color,
    ) -> Result<Frame<'a>, GfxError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                return Err(GfxError::SurfaceLost);
            }
            Err(e) => return Err(GfxError::native("get_current_texture", e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            })
            .forget_lifetime();

        pass.set_pipeline(&self.pipeline);
        pass.set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            viewport.min_depth,
            viewport.max_depth,
        );

        Ok(Frame {
            ctx: self,
            output,
            encoder,
            pass: Some(pass),
            texture: None,
            sampler: None,
            materials: HashMap::new(),
            bound_material: None,
            topology: PrimitiveTopology::TriangleList,
        })
    }
}

/// One frame of recording into the swap chain's current texture.
pub struct Frame<'a> {
    ctx: &'a Context,
    output: wgpu::SurfaceTexture,
    encoder: wgpu::CommandEncoder,
    pass: Option<wgpu::RenderPass<'static>>,
    texture: Option<(u64, wgpu::TextureView)>,
    sampler: Option<(u64, wgpu::Sampler)>,
    materials: HashMap<(u64, u64), wgpu::BindGroup>,
    bound_material: Option<(u64, u64)>,
    topology: PrimitiveTopology,
}

impl Frame<'_> {
    /// Binds the texture/sampler pair at group 3, building its bind group on first use.
    fn bind_material(&mut self) -> bool {
        let (Some((texture_id, view)), Some((sampler_id, sampler))) = (&self.texture, &self.sampler)
        else {
            log::warn!("draw_indexed: no texture or sampler bound, skipping draw");
            return false;
        };
        let key = (*texture_id, *sampler_id);
        if self.bound_material == Some(key) {
            return true;
        }
        let group = self.materials.entry(key).or_insert_with(|| {
            texture::material_bind_group(&self.ctx.device, &self.ctx.layouts.material, view, sampler)
        });
        if let Some(pass) = self.pass.as_mut() {
            pass.set_bind_group(MATERIAL_GROUP, &*group, &[]);
        }
        self.bound_material = Some(key);
        true
    }
}

impl DrawContext<Context> for Frame<'_> {
    fn set_constant_buffer(&mut self, slot: u32, buffer: &Buffer, _stages: ShaderStages) {
        // Uniform bind groups are visible to vertex and fragment stages alike.
        let (Some(pass), Some(group)) = (self.pass.as_mut(), buffer.bind_group.as_ref()) else {
            log::warn!("set_constant_buffer: slot {slot} got a buffer without a bind group");
            return;
        };
        pass.set_bind_group(slot, group, &[]);
    }

    fn set_sampler(&mut self, _slot: u32, sampler: &Sampler) {
        self.sampler = Some((sampler.id, sampler.sampler.clone()));
    }

    fn set_texture(&mut self, _slot: u32, texture: &Texture) {
        self.texture = Some((texture.id, texture.view.clone()));
    }

    fn set_default_texture(&mut self, _slot: u32) {
        let default = &self.ctx.default_texture;
        self.texture = Some((default.id, default.view.clone()));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &Buffer) {
        if let Some(pass) = self.pass.as_mut() {
            pass.set_vertex_buffer(slot, buffer.buffer.slice(..));
        }
    }

    fn set_index_buffer(&mut self, buffer: &Buffer) {
        if let Some(pass) = self.pass.as_mut() {
            pass.set_index_buffer(buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
        }
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.topology = topology;
    }

    fn draw_indexed(&mut self, index_count: u32) {
        if self.topology != PrimitiveTopology::TriangleList {
            log::warn!(
                "draw_indexed: the scene pipeline only draws triangle lists, got {:?}",
                self.topology
            );
            return;
        }
        if !self.bind_material() {
            return;
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.draw_indexed(0..index_count, 0, 0..1);
        }
    }

    fn present(mut self) -> Result<(), GfxError> {
        drop(self.pass.take());
        self.ctx.queue.submit(iter::once(self.encoder.finish()));
        self.output.present();
        Ok(())
    }
}
