//! The graphics seam: resource creation and per-draw binding.
//!
//! Everything above this module (actors, the scene driver) talks to the GPU
//! only through [`GraphicsDevice`] and [`DrawContext`]. Two backends exist:
//!
//! - [`crate::context::Context`] drives a real `wgpu` surface
//! - [`headless::HeadlessDevice`] records every command, counts creations and
//!   releases and can be told to fail. The tests run on it.
//!
//! Resource handles are owned values. Dropping one releases the native
//! resource, so there is no separate `destroy` call on this layer.

pub mod headless;

use thiserror::Error;

use crate::data_structures::mesh::SimpleVertex;

pub use wgpu::{PrimitiveTopology, ShaderStages};

/// Failures reported by a graphics backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GfxError {
    /// A null/empty/zero-sized input was rejected before reaching the backend.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend refused to create or update a resource.
    #[error("{call} failed: {reason}")]
    Native { call: &'static str, reason: String },

    /// The swap chain is lost or outdated and has to be reconfigured.
    #[error("the swap chain surface is lost or outdated")]
    SurfaceLost,

    /// The resource was already destroyed.
    #[error("{0} was already released")]
    Released(&'static str),
}

impl GfxError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn native(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Native {
            call,
            reason: reason.into(),
        }
    }
}

/// Screen-space rectangle the rasterizer maps clip space onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// A full-window viewport. Zero dimensions are rejected.
    pub fn new(width: u32, height: u32) -> Result<Self, GfxError> {
        if width == 0 || height == 0 {
            log::error!("Viewport::new: invalid dimensions {width}x{height}");
            return Err(GfxError::invalid(format!(
                "viewport dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        })
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Block-compressed texel layouts a DDS file can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    Bc1,
    Bc3,
    Bc7,
}

impl BlockFormat {
    /// Bytes per 4x4 block.
    pub fn block_bytes(self) -> usize {
        match self {
            Self::Bc1 => 8,
            Self::Bc3 | Self::Bc7 => 16,
        }
    }

    pub fn wgpu_format(self, srgb: bool) -> wgpu::TextureFormat {
        use wgpu::TextureFormat as F;
        match (self, srgb) {
            (Self::Bc1, false) => F::Bc1RgbaUnorm,
            (Self::Bc1, true) => F::Bc1RgbaUnormSrgb,
            (Self::Bc3, false) => F::Bc3RgbaUnorm,
            (Self::Bc3, true) => F::Bc3RgbaUnormSrgb,
            (Self::Bc7, false) => F::Bc7RgbaUnorm,
            (Self::Bc7, true) => F::Bc7RgbaUnormSrgb,
        }
    }
}

/// The top mip level of a block-compressed image, uploaded as is.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub format: BlockFormat,
    pub srgb: bool,
    pub width: u32,
    pub height: u32,
    pub blocks: Vec<u8>,
}

impl CompressedImage {
    pub fn blocks_per_row(&self) -> u32 {
        self.width.div_ceil(4)
    }

    pub fn block_rows(&self) -> u32 {
        self.height.div_ceil(4)
    }

    /// Byte length of one full level.
    pub fn level_len(&self) -> usize {
        self.blocks_per_row() as usize * self.block_rows() as usize * self.format.block_bytes()
    }

    /// Checks the size and block data before a backend sees them.
    pub fn validate(&self, label: &str) -> Result<(), GfxError> {
        if self.width == 0 || self.height == 0 {
            return Err(GfxError::invalid(format!("texture '{label}' has no pixels")));
        }
        if self.blocks.len() != self.level_len() {
            return Err(GfxError::invalid(format!(
                "texture '{label}': {:?} data is {} bytes, expected {}",
                self.format,
                self.blocks.len(),
                self.level_len()
            )));
        }
        Ok(())
    }
}

/// Creates, uploads and presents. Implemented once per backend.
///
/// All handles are associated types so each backend keeps its native objects
/// without boxing. Callers borrow the device for the length of one call only.
pub trait GraphicsDevice: Sized {
    type Buffer;
    type Texture;
    type Sampler;
    type DepthTarget;
    type Frame<'a>: DrawContext<Self>
    where
        Self: 'a;

    fn create_vertex_buffer(
        &self,
        label: &str,
        vertices: &[SimpleVertex],
    ) -> Result<Self::Buffer, GfxError>;

    fn create_index_buffer(&self, label: &str, indices: &[u32]) -> Result<Self::Buffer, GfxError>;

    /// A uniform buffer of `size` bytes, zero initialised.
    fn create_constant_buffer(&self, label: &str, size: u64) -> Result<Self::Buffer, GfxError>;

    /// Overwrites the start of `buffer` with `data`.
    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> Result<(), GfxError>;

    fn create_sampler(&self, label: &str) -> Result<Self::Sampler, GfxError>;

    fn create_texture(
        &self,
        label: &str,
        image: &image::DynamicImage,
    ) -> Result<Self::Texture, GfxError>;

    /// Uploads BC blocks without decompressing them.
    fn create_compressed_texture(
        &self,
        label: &str,
        image: &CompressedImage,
    ) -> Result<Self::Texture, GfxError>;

    fn create_depth_target(&self, width: u32, height: u32) -> Result<Self::DepthTarget, GfxError>;

    /// Resizes the swap chain buffers. The back buffer is re-acquired on the
    /// next [`GraphicsDevice::begin_frame`].
    fn resize_swap_chain(&mut self, width: u32, height: u32) -> Result<(), GfxError>;

    /// Acquires the back buffer, clears colour and depth and sets the viewport.
    fn begin_frame<'a>(
        &'a self,
        depth: &'a Self::DepthTarget,
        viewport: Viewport,
        clear_colour: wgpu::Color,
    ) -> Result<Self::Frame<'a>, GfxError>;
}

/// Pipeline binding and draw submission for a single frame.
///
/// Slots follow the shader layout: constant buffer slot 0 is the view, slot 1
/// the projection and slot 2 the per-actor model block.
pub trait DrawContext<D: GraphicsDevice> {
    fn set_constant_buffer(&mut self, slot: u32, buffer: &D::Buffer, stages: ShaderStages);

    fn set_sampler(&mut self, slot: u32, sampler: &D::Sampler);

    fn set_texture(&mut self, slot: u32, texture: &D::Texture);

    /// Binds the backend's fallback texture.
    fn set_default_texture(&mut self, slot: u32);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &D::Buffer);

    /// Index buffers are always 32-bit.
    fn set_index_buffer(&mut self, buffer: &D::Buffer);

    fn set_topology(&mut self, topology: PrimitiveTopology);

    fn draw_indexed(&mut self, index_count: u32);

    /// Submits the recorded commands and presents the back buffer.
    fn present(self) -> Result<(), GfxError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_rejects_zero_dimensions() {
        assert!(matches!(
            Viewport::new(0, 600),
            Err(GfxError::InvalidArgument(_))
        ));
        assert!(matches!(
            Viewport::new(800, 0),
            Err(GfxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn viewport_covers_the_window() {
        let vp = Viewport::new(1280, 720).unwrap();
        assert_eq!((vp.x, vp.y), (0.0, 0.0));
        assert_eq!((vp.width, vp.height), (1280.0, 720.0));
        assert_eq!((vp.min_depth, vp.max_depth), (0.0, 1.0));
        assert!((vp.aspect() - 1280.0 / 720.0).abs() < f32::EPSILON);
    }

    #[test]
    fn compressed_level_length_rounds_up_to_whole_blocks() {
        let image = CompressedImage {
            format: BlockFormat::Bc1,
            srgb: false,
            width: 5,
            height: 3,
            blocks: vec![0; 16],
        };
        assert_eq!((image.blocks_per_row(), image.block_rows()), (2, 1));
        assert_eq!(image.level_len(), 16);
        assert!(image.validate("bc1").is_ok());

        let short = CompressedImage {
            format: BlockFormat::Bc7,
            blocks: vec![0; 16],
            ..image
        };
        assert!(matches!(short.validate("bc7"), Err(GfxError::InvalidArgument(_))));
    }
}
