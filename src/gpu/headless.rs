//! A backend without a GPU.
//!
//! [`HeadlessDevice`] hands out handles that only carry an id. Every bind,
//! upload and draw is appended to a command log, and every handle records its
//! release when dropped. Creation and resize can be forced to fail so error
//! paths are reachable without a misbehaving driver.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use super::{BlockFormat, CompressedImage, DrawContext, GfxError, GraphicsDevice, PrimitiveTopology, ShaderStages, Viewport};
use crate::data_structures::mesh::SimpleVertex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    VertexBuffer,
    IndexBuffer,
    ConstantBuffer,
    Texture,
    Sampler,
    DepthTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub label: String,
    pub releases: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame {
        viewport: Viewport,
        clear_colour: wgpu::Color,
    },
    WriteBuffer {
        buffer: ResourceId,
        len: usize,
    },
    ResizeSwapChain {
        width: u32,
        height: u32,
    },
    CreateCompressedTexture {
        texture: ResourceId,
        format: BlockFormat,
    },
    SetConstantBuffer {
        slot: u32,
        buffer: ResourceId,
        stages: ShaderStages,
    },
    SetSampler {
        slot: u32,
        sampler: ResourceId,
    },
    SetTexture {
        slot: u32,
        texture: ResourceId,
    },
    SetDefaultTexture {
        slot: u32,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: ResourceId,
    },
    SetIndexBuffer {
        buffer: ResourceId,
    },
    SetTopology(PrimitiveTopology),
    DrawIndexed {
        index_count: u32,
    },
    Present,
}

/// Shared between the device and every handle it created.
#[derive(Debug, Default)]
struct Ledger {
    next_id: Cell<u64>,
    resources: RefCell<HashMap<ResourceId, ResourceRecord>>,
    contents: RefCell<HashMap<ResourceId, Vec<u8>>>,
    commands: RefCell<Vec<Command>>,
    released: RefCell<Vec<(ResourceId, ResourceKind)>>,
}

impl Ledger {
    fn register(&self, kind: ResourceKind, label: &str) -> ResourceId {
        let id = ResourceId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.resources.borrow_mut().insert(
            id,
            ResourceRecord {
                kind,
                label: label.to_string(),
                releases: 0,
            },
        );
        id
    }

    fn release(&self, id: ResourceId) {
        if let Some(record) = self.resources.borrow_mut().get_mut(&id) {
            record.releases += 1;
            self.released.borrow_mut().push((id, record.kind));
        }
    }

    fn record(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }
}

/// Owns one headless resource id. Dropping it counts one release.
#[derive(Debug)]
pub struct Handle {
    id: ResourceId,
    ledger: Rc<Ledger>,
}

impl Handle {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.ledger.release(self.id);
    }
}

#[derive(Debug)]
pub struct HeadlessBuffer {
    pub handle: Handle,
    pub kind: ResourceKind,
    pub size: u64,
}

#[derive(Debug)]
pub struct HeadlessTexture {
    pub handle: Handle,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct HeadlessSampler {
    pub handle: Handle,
}

#[derive(Debug)]
pub struct HeadlessDepthTarget {
    pub handle: Handle,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ReleaseLog {
    ledger: Rc<Ledger>,
}

impl ReleaseLog {
    /// Released resources, oldest first.
    pub fn released(&self) -> Vec<(ResourceId, ResourceKind)> {
        self.ledger.released.borrow().clone()
    }

    pub fn label(&self, id: ResourceId) -> Option<String> {
        self.ledger.resources.borrow().get(&id).map(|r| r.label.clone())
    }
}

#[derive(Debug)]
pub struct HeadlessDevice {
    ledger: Rc<Ledger>,
    swap_chain_size: (u32, u32),
    max_buffer_size: u64,
    creations_before_failure: Cell<Option<usize>>,
    fail_resize: Cell<bool>,
    fail_writes: Cell<bool>,
    surface_lost: Cell<bool>,
}

impl HeadlessDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            ledger: Rc::new(Ledger::default()),
            swap_chain_size: (width, height),
            max_buffer_size: 256 << 20,
            creations_before_failure: Cell::new(None),
            fail_resize: Cell::new(false),
            fail_writes: Cell::new(false),
            surface_lost: Cell::new(false),
        }
    }

    /// Buffers above `max` bytes are rejected like a driver would.
    pub fn with_max_buffer_size(mut self, max: u64) -> Self {
        self.max_buffer_size = max;
        self
    }

    /// Lets `successes` more resource creations through, then fails every one after.
    pub fn fail_creation_after(&self, successes: usize) {
        self.creations_before_failure.set(Some(successes));
    }

    pub fn stop_failing(&self) {
        self.creations_before_failure.set(None);
        self.fail_resize.set(false);
        self.fail_writes.set(false);
    }

    pub fn fail_resize(&self, fail: bool) {
        self.fail_resize.set(fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// The next `begin_frame` reports a lost surface.
    pub fn lose_surface(&self) {
        self.surface_lost.set(true);
    }

    pub fn swap_chain_size(&self) -> (u32, u32) {
        self.swap_chain_size
    }

    pub fn commands(&self) -> Vec<Command> {
        self.ledger.commands.borrow().clone()
    }

    pub fn clear_commands(&self) {
        self.ledger.commands.borrow_mut().clear();
    }

    /// Index counts of every draw recorded so far, in submission order.
    pub fn draws(&self) -> Vec<u32> {
        self.ledger
            .commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed { index_count } => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    pub fn resource(&self, id: ResourceId) -> Option<ResourceRecord> {
        self.ledger.resources.borrow().get(&id).cloned()
    }

    pub fn created(&self, kind: ResourceKind) -> usize {
        self.ledger
            .resources
            .borrow()
            .values()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Resources created and not yet released.
    pub fn live(&self) -> usize {
        self.ledger
            .resources
            .borrow()
            .values()
            .filter(|r| r.releases == 0)
            .count()
    }

    /// True when no resource was released more than once.
    pub fn no_double_release(&self) -> bool {
        self.ledger
            .resources
            .borrow()
            .values()
            .all(|r| r.releases <= 1)
    }

    /// Kinds of released resources, oldest first.
    pub fn release_order(&self) -> Vec<ResourceKind> {
        self.ledger.released.borrow().iter().map(|(_, kind)| *kind).collect()
    }

    /// A view of the release log that stays readable after the device is dropped.
    pub fn release_log(&self) -> ReleaseLog {
        ReleaseLog {
            ledger: self.ledger.clone(),
        }
    }

    /// The bytes most recently written to `buffer`.
    pub fn buffer_contents(&self, buffer: &HeadlessBuffer) -> Option<Vec<u8>> {
        self.ledger.contents.borrow().get(&buffer.handle.id).cloned()
    }

    fn allocate(&self, kind: ResourceKind, label: &str, call: &'static str) -> Result<Handle, GfxError> {
        if let Some(left) = self.creations_before_failure.get() {
            if left == 0 {
                log::error!("{call}: creation of '{label}' rejected");
                return Err(GfxError::native(call, format!("creation of '{label}' rejected")));
            }
            self.creations_before_failure.set(Some(left - 1));
        }
        Ok(Handle {
            id: self.ledger.register(kind, label),
            ledger: self.ledger.clone(),
        })
    }

    fn allocate_buffer(
        &self,
        kind: ResourceKind,
        label: &str,
        size: u64,
        call: &'static str,
    ) -> Result<HeadlessBuffer, GfxError> {
        if size > self.max_buffer_size {
            log::error!("{call}: '{label}' needs {size} bytes, limit is {}", self.max_buffer_size);
            return Err(GfxError::native(
                call,
                format!("{size} bytes exceed the {} byte limit", self.max_buffer_size),
            ));
        }
        let handle = self.allocate(kind, label, call)?;
        Ok(HeadlessBuffer { handle, kind, size })
    }
}

impl GraphicsDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type Sampler = HeadlessSampler;
    type DepthTarget = HeadlessDepthTarget;
    type Frame<'a> = HeadlessFrame<'a>;

    fn create_vertex_buffer(
        &self,
        label: &str,
        vertices: &[SimpleVertex],
    ) -> Result<HeadlessBuffer, GfxError> {
        if vertices.is_empty() {
            log::error!("create_vertex_buffer: '{label}' has no vertices");
            return Err(GfxError::invalid(format!("vertex buffer '{label}' is empty")));
        }
        let size = std::mem::size_of_val(vertices) as u64;
        self.allocate_buffer(ResourceKind::VertexBuffer, label, size, "create_vertex_buffer")
    }

    fn create_index_buffer(&self, label: &str, indices: &[u32]) -> Result<HeadlessBuffer, GfxError> {
        if indices.is_empty() {
            log::error!("create_index_buffer: '{label}' has no indices");
            return Err(GfxError::invalid(format!("index buffer '{label}' is empty")));
        }
        let size = std::mem::size_of_val(indices) as u64;
        self.allocate_buffer(ResourceKind::IndexBuffer, label, size, "create_index_buffer")
    }

    fn create_constant_buffer(&self, label: &str, size: u64) -> Result<HeadlessBuffer, GfxError> {
        if size == 0 {
            log::error!("create_constant_buffer: '{label}' has zero size");
            return Err(GfxError::invalid(format!("constant buffer '{label}' has zero size")));
        }
        self.allocate_buffer(ResourceKind::ConstantBuffer, label, size, "create_constant_buffer")
    }

    fn write_buffer(&self, buffer: &HeadlessBuffer, data: &[u8]) -> Result<(), GfxError> {
        if self.fail_writes.get() {
            log::error!("write_buffer: write of {} bytes rejected", data.len());
            return Err(GfxError::native("write_buffer", "write rejected"));
        }
        if data.len() as u64 > buffer.size {
            return Err(GfxError::invalid(format!(
                "{} bytes do not fit a {} byte buffer",
                data.len(),
                buffer.size
            )));
        }
        let id = buffer.handle.id;
        self.ledger.contents.borrow_mut().insert(id, data.to_vec());
        self.ledger.record(Command::WriteBuffer {
            buffer: id,
            len: data.len(),
        });
        Ok(())
    }

    fn create_sampler(&self, label: &str) -> Result<HeadlessSampler, GfxError> {
        let handle = self.allocate(ResourceKind::Sampler, label, "create_sampler")?;
        Ok(HeadlessSampler { handle })
    }

    fn create_texture(
        &self,
        label: &str,
        image: &image::DynamicImage,
    ) -> Result<HeadlessTexture, GfxError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(GfxError::invalid(format!("texture '{label}' has no pixels")));
        }
        let handle = self.allocate(ResourceKind::Texture, label, "create_texture")?;
        Ok(HeadlessTexture {
            handle,
            width,
            height,
        })
    }

    fn create_compressed_texture(
        &self,
        label: &str,
        image: &CompressedImage,
    ) -> Result<HeadlessTexture, GfxError> {
        image.validate(label)?;
        let handle = self.allocate(ResourceKind::Texture, label, "create_compressed_texture")?;
        self.ledger.record(Command::CreateCompressedTexture {
            texture: handle.id,
            format: image.format,
        });
        Ok(HeadlessTexture {
            handle,
            width: image.width,
            height: image.height,
        })
    }

    fn create_depth_target(&self, width: u32, height: u32) -> Result<HeadlessDepthTarget, GfxError> {
        if width == 0 || height == 0 {
            return Err(GfxError::invalid(format!(
                "depth target dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let handle = self.allocate(ResourceKind::DepthTarget, "depth_texture", "create_depth_target")?;
        Ok(HeadlessDepthTarget {
            handle,
            width,
            height,
        })
    }

    fn resize_swap_chain(&mut self, width: u32, height: u32) -> Result<(), GfxError> {
        if self.fail_resize.get() {
            log::error!("resize_swap_chain: resize to {width}x{height} rejected");
            return Err(GfxError::native("resize_swap_chain", "resize rejected"));
        }
        self.swap_chain_size = (width, height);
        self.ledger.record(Command::ResizeSwapChain { width, height });
        Ok(())
    }

    fn begin_frame<'a>(
        &'a self,
        _depth: &'a HeadlessDepthTarget,
        viewport: Viewport,
        clear_colour: wgpu::Color,
    ) -> Result<HeadlessFrame<'a>, GfxError> {
        if self.surface_lost.replace(false) {
            return Err(GfxError::SurfaceLost);
        }
        self.ledger.record(Command::BeginFrame {
            viewport,
            clear_colour,
        });
        Ok(HeadlessFrame { device: self })
    }
}

pub struct HeadlessFrame<'a> {
    device: &'a HeadlessDevice,
}

impl HeadlessFrame<'_> {
    fn record(&self, command: Command) {
        self.device.ledger.record(command);
    }
}

impl DrawContext<HeadlessDevice> for HeadlessFrame<'_> {
    fn set_constant_buffer(&mut self, slot: u32, buffer: &HeadlessBuffer, stages: ShaderStages) {
        self.record(Command::SetConstantBuffer {
            slot,
            buffer: buffer.handle.id,
            stages,
        });
    }

    fn set_sampler(&mut self, slot: u32, sampler: &HeadlessSampler) {
        self.record(Command::SetSampler {
            slot,
            sampler: sampler.handle.id,
        });
    }

    fn set_texture(&mut self, slot: u32, texture: &HeadlessTexture) {
        self.record(Command::SetTexture {
            slot,
            texture: texture.handle.id,
        });
    }

    fn set_default_texture(&mut self, slot: u32) {
        self.record(Command::SetDefaultTexture { slot });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &HeadlessBuffer) {
        self.record(Command::SetVertexBuffer {
            slot,
            buffer: buffer.handle.id,
        });
    }

    fn set_index_buffer(&mut self, buffer: &HeadlessBuffer) {
        self.record(Command::SetIndexBuffer {
            buffer: buffer.handle.id,
        });
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::SetTopology(topology));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.record(Command::DrawIndexed { index_count });
    }

    fn present(self) -> Result<(), GfxError> {
        self.record(Command::Present);
        Ok(())
    }
}
