//! GPU textures and samplers for the `wgpu` backend.
//!
//! [`Texture`] wraps a `wgpu` texture with its view. Depth targets, the 1x1
//! fallback texture and decoded images all go through it. Every wrapper
//! carries an id so frames can cache texture/sampler bind groups per pair.

use image::GenericImageView;

use crate::gpu::CompressedImage;

/// A GPU texture with a view.
#[derive(Clone, Debug)]
pub struct Texture {
    pub id: u64,
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// A filtering sampler.
#[derive(Clone, Debug)]
pub struct Sampler {
    pub id: u64,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// The returned texture is suitable for use as a `RENDER_ATTACHMENT` in
    /// render passes. Callers validate the size, zero extents are not clamped.
    pub fn create_depth_texture(device: &wgpu::Device, id: u64, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0],
            height: size[1],
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { id, texture, view }
    }

    /// A single opaque white texel, bound whenever a mesh has no texture of its own.
    ///
    /// White keeps the material tint as the visible colour.
    pub fn create_default(device: &wgpu::Device, queue: &wgpu::Queue, id: u64) -> Self {
        let white = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            1,
            1,
            image::Rgba([255, 255, 255, 255]),
        ));
        Self::from_image(device, queue, id, &white, Some("default texture"))
    }

    /// Uploads `img` as an sRGB RGBA8 texture. Callers reject empty images.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: u64,
        img: &image::DynamicImage,
        label: Option<&str>,
    ) -> Self {
        let dimensions = img.dimensions();
        let rgba = img.to_rgba8();

        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { id, texture, view }
    }

    /// Uploads BC blocks as they are. Callers validate the image and check
    /// that the device has `TEXTURE_COMPRESSION_BC`.
    pub fn from_blocks(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: u64,
        img: &CompressedImage,
        label: Option<&str>,
    ) -> Self {
        // Block formats need the physical size rounded up to whole blocks.
        let size = wgpu::Extent3d {
            width: img.blocks_per_row() * 4,
            height: img.block_rows() * 4,
            depth_or_array_layers: 1,
        };
        let format = img.format.wgpu_format(img.srgb);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &img.blocks,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(img.blocks_per_row() * img.format.block_bytes() as u32),
                rows_per_image: Some(img.block_rows()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { id, texture, view }
    }
}

impl Sampler {
    /// Linear filtering, repeat addressing on every axis.
    pub fn create(device: &wgpu::Device, id: u64, label: &str) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self { id, sampler }
    }
}

/// Texture at binding 0, sampler at binding 1. Bind group 3 of the scene pipeline.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
        label: Some("material_bind_group_layout"),
    })
}

pub fn material_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(texture),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("material_bind_group"),
    })
}
