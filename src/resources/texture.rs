use std::{io::Cursor, path::Path};

use anyhow::{Context, anyhow, bail};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::gpu::{BlockFormat, CompressedImage, GfxError, GraphicsDevice};

use super::{TextureSource, load_binary};

/// Image containers the loader decodes. Anything else is rejected up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Dds,
    Png,
    Jpg,
}

impl ImageKind {
    /// Accepts a bare tag (`"dds"`), a MIME type (`"image/png"`) or a file extension.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.rsplit('/').next().unwrap_or(tag).to_ascii_lowercase();
        match tag.as_str() {
            "dds" => Some(Self::Dds),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpg),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_tag)
    }
}

/// A decoded texture. BC data stays compressed until the backend uploads it.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureImage {
    Pixels(DynamicImage),
    Blocks(CompressedImage),
}

impl TextureImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Pixels(img) => (img.width(), img.height()),
            Self::Blocks(img) => (img.width, img.height),
        }
    }

    pub fn create<D: GraphicsDevice>(&self, device: &D, label: &str) -> Result<D::Texture, GfxError> {
        match self {
            Self::Pixels(img) => device.create_texture(label, img),
            Self::Blocks(img) => device.create_compressed_texture(label, img),
        }
    }
}

pub fn decode_image(bytes: &[u8], kind: ImageKind) -> anyhow::Result<TextureImage> {
    match kind {
        ImageKind::Png => Ok(TextureImage::Pixels(image::load_from_memory_with_format(
            bytes,
            ImageFormat::Png,
        )?)),
        ImageKind::Jpg => Ok(TextureImage::Pixels(image::load_from_memory_with_format(
            bytes,
            ImageFormat::Jpeg,
        )?)),
        ImageKind::Dds => decode_dds(bytes),
    }
}

/// BC1/BC3/BC7 and uncompressed 32-bit DDS files, top mip level.
fn decode_dds(bytes: &[u8]) -> anyhow::Result<TextureImage> {
    let mut cursor = Cursor::new(bytes);
    let dds = ddsfile::Dds::read(&mut cursor).map_err(|e| anyhow!("invalid DDS: {e:?}"))?;

    let width = dds.get_width();
    let height = dds.get_height();
    if width == 0 || height == 0 {
        bail!("DDS has zero size");
    }

    if let Some((format, srgb)) = block_format(&dds) {
        let mut image = CompressedImage {
            format,
            srgb,
            width,
            height,
            blocks: Vec::new(),
        };
        let data: &[u8] = dds.data.as_ref();
        let expected_len = image.level_len();
        if data.len() < expected_len {
            bail!(
                "DDS data too small for {format:?} level 0: got={}, need={}",
                data.len(),
                expected_len
            );
        }
        image.blocks = data[..expected_len].to_vec();
        return Ok(TextureImage::Blocks(image));
    }

    let bgra = match (dds.get_dxgi_format(), dds.get_d3d_format()) {
        (
            Some(ddsfile::DxgiFormat::R8G8B8A8_UNorm | ddsfile::DxgiFormat::R8G8B8A8_UNorm_sRGB),
            _,
        ) => false,
        (
            Some(ddsfile::DxgiFormat::B8G8R8A8_UNorm | ddsfile::DxgiFormat::B8G8R8A8_UNorm_sRGB),
            _,
        ) => true,
        (None, Some(ddsfile::D3DFormat::A8B8G8R8)) => false,
        (None, Some(ddsfile::D3DFormat::A8R8G8B8)) => true,
        (dxgi, d3d) => bail!("unsupported DDS pixel format (dxgi {dxgi:?}, d3d {d3d:?})"),
    };

    let expected_len = width as usize * height as usize * 4;
    let data: &[u8] = dds.data.as_ref();
    if data.len() < expected_len {
        bail!(
            "DDS data too small for level 0: got={}, need={}",
            data.len(),
            expected_len
        );
    }
    let mut pixels = data[..expected_len].to_vec();
    if bgra {
        pixels.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
    }
    let rgba = RgbaImage::from_raw(width, height, pixels)
        .context("DDS pixel buffer does not match its dimensions")?;
    Ok(TextureImage::Pixels(DynamicImage::ImageRgba8(rgba)))
}

/// Legacy DXT1/DXT5 headers report as sRGB BC1/BC3.
fn block_format(dds: &ddsfile::Dds) -> Option<(BlockFormat, bool)> {
    use ddsfile::DxgiFormat;
    match dds.get_dxgi_format()? {
        DxgiFormat::BC1_UNorm => Some((BlockFormat::Bc1, false)),
        DxgiFormat::BC1_UNorm_sRGB => Some((BlockFormat::Bc1, true)),
        DxgiFormat::BC3_UNorm => Some((BlockFormat::Bc3, false)),
        DxgiFormat::BC3_UNorm_sRGB => Some((BlockFormat::Bc3, true)),
        DxgiFormat::BC7_UNorm => Some((BlockFormat::Bc7, false)),
        DxgiFormat::BC7_UNorm_sRGB => Some((BlockFormat::Bc7, true)),
        _ => None,
    }
}

/// Reads and decodes `file_name` under `root`.
pub async fn load_image(
    root: &Path,
    file_name: &str,
    kind: ImageKind,
) -> anyhow::Result<TextureImage> {
    let data = load_binary(root, file_name).await?;
    decode_image(&data, kind).with_context(|| format!("decoding {file_name} as {kind:?}"))
}

async fn load_source(root: &Path, source: &TextureSource) -> anyhow::Result<TextureImage> {
    match source {
        TextureSource::File(name) => {
            let kind = ImageKind::from_path(name)
                .with_context(|| format!("{name}: unsupported image type"))?;
            load_image(root, name, kind).await
        }
        TextureSource::Embedded { data, kind } => decode_image(data, *kind),
    }
}

/// Decodes every source concurrently, then creates the textures in order.
///
/// `None` entries become a plain white texture so later meshes keep their index.
pub async fn load_textures<D: GraphicsDevice>(
    device: &D,
    root: &Path,
    label: &str,
    sources: &[Option<TextureSource>],
) -> anyhow::Result<Vec<D::Texture>> {
    let images = futures::future::try_join_all(sources.iter().map(|source| async move {
        match source {
            Some(source) => load_source(root, source).await.map(Some),
            None => Ok(None),
        }
    }))
    .await?;

    images
        .into_iter()
        .enumerate()
        .map(|(i, decoded)| {
            let decoded = decoded.unwrap_or_else(|| {
                TextureImage::Pixels(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                    1,
                    1,
                    image::Rgba([255; 4]),
                )))
            });
            decoded
                .create(device, &format!("{label}/texture{i}"))
                .with_context(|| format!("{label}: creating texture {i}"))
        })
        .collect()
}
