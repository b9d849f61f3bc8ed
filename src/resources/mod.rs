//! Loading meshes and textures from files under an asset root.
//!
//! Loaders only produce CPU data ([`LoadedModel`]); GPU resources are created
//! afterwards through [`crate::gpu::GraphicsDevice`].

use std::{
    io::{BufReader, Cursor},
    path::Path,
};

use anyhow::{Context, bail};
use base64::Engine;

use crate::data_structures::mesh::MeshComponent;

pub mod mesh;
pub mod texture;

pub use texture::{ImageKind, TextureImage, decode_image, load_image, load_textures};

/// Where a mesh's texture comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// A file relative to the asset root.
    File(String),
    /// Encoded image bytes stored inside the model file.
    Embedded { data: Vec<u8>, kind: ImageKind },
}

/// Meshes plus one optional texture per mesh, same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedModel {
    pub meshes: Vec<MeshComponent>,
    pub textures: Vec<Option<TextureSource>>,
}

impl LoadedModel {
    /// Drops trailing meshes-without-texture from the texture list; those meshes
    /// fall back to the default texture when drawn.
    fn trim_textures(mut self) -> Self {
        while matches!(self.textures.last(), Some(None)) {
            self.textures.pop();
        }
        self
    }
}

pub async fn load_string(root: &Path, file_name: &str) -> anyhow::Result<String> {
    let path = root.join(file_name);
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

pub async fn load_binary(root: &Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = root.join(file_name);
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

/// Splits a `data:<mime>;base64,<payload>` URI into its mime type and bytes.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<(&str, Vec<u8>)> {
    let rest = uri.strip_prefix("data:").context("not a data URI")?;
    let (header, payload) = rest
        .split_once(',')
        .context("data URI has no payload")?;
    let Some(mime_type) = header.strip_suffix(";base64") else {
        bail!("data URI is not base64 encoded ({header})");
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("decoding data URI payload")?;
    Ok((mime_type, bytes))
}

/// Embedded `data:` URIs are decoded in place, anything else is a file under `root`.
async fn load_uri(root: &Path, uri: &str) -> anyhow::Result<Vec<u8>> {
    if uri.starts_with("data:") {
        decode_data_uri(uri).map(|(_, bytes)| bytes)
    } else {
        load_binary(root, uri).await
    }
}

/// Picks the parser from the file extension.
pub async fn load_model(root: &Path, file_name: &str) -> anyhow::Result<LoadedModel> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("obj") => load_model_obj(root, file_name).await,
        Some("gltf" | "glb") => load_model_gltf(root, file_name).await,
        _ => bail!("{file_name}: unsupported model format"),
    }
}

pub async fn load_model_obj(root: &Path, file_name: &str) -> anyhow::Result<LoadedModel> {
    let obj_text = load_string(root, file_name).await?;
    let obj_cursor = Cursor::new(obj_text);
    let mut obj_reader = BufReader::new(obj_cursor);

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| async move {
            match load_string(root, &p).await {
                Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                Err(e) => {
                    log::warn!("{file_name}: material library {p} unavailable: {e:#}");
                    Err(tobj::LoadError::OpenFileFailed)
                }
            }
        },
    )
    .await
    .with_context(|| format!("parsing {file_name}"))?;

    let materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("{file_name}: no materials, meshes use the default texture ({e})");
        Vec::new()
    });

    let mut meshes = Vec::new();
    let mut textures = Vec::new();
    for (i, model) in models.iter().enumerate() {
        let Some(mesh) = mesh::from_obj_model(model, i, file_name) else {
            continue;
        };
        meshes.push(mesh);
        textures.push(
            model
                .mesh
                .material_id
                .and_then(|id| materials.get(id))
                .and_then(|mat| mat.diffuse_texture.clone())
                .map(TextureSource::File),
        );
    }

    Ok(LoadedModel { meshes, textures }.trim_textures())
}

pub async fn load_model_gltf(root: &Path, file_name: &str) -> anyhow::Result<LoadedModel> {
    let gltf_bytes = load_binary(root, file_name).await?;
    let gltf = gltf::Gltf::from_slice(&gltf_bytes).with_context(|| format!("parsing {file_name}"))?;

    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name}: binary chunk missing"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                let data = load_uri(root, uri)
                    .await
                    .with_context(|| format!("{file_name}: buffer {}", buffer.index()))?;
                buffer_data.push(data);
            }
        }
    }

    let mut meshes = Vec::new();
    let mut textures = Vec::new();
    for gltf_mesh in gltf.meshes() {
        let mesh_name = gltf_mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", gltf_mesh.index()));
        for primitive in gltf_mesh.primitives() {
            let name = format!("{mesh_name}/{}", primitive.index());
            let Some(mesh) = mesh::from_gltf_primitive(&primitive, name, &buffer_data, file_name)
            else {
                continue;
            };
            meshes.push(mesh);
            textures.push(base_colour_source(&primitive, &buffer_data, file_name));
        }
    }

    Ok(LoadedModel { meshes, textures }.trim_textures())
}

fn base_colour_source(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    file_name: &str,
) -> Option<TextureSource> {
    let info = primitive
        .material()
        .pbr_metallic_roughness()
        .base_color_texture()?;
    match info.texture().source().source() {
        gltf::image::Source::Uri { uri, mime_type } if uri.starts_with("data:") => {
            let (embedded_type, data) = decode_data_uri(uri)
                .inspect_err(|e| log::warn!("{file_name}: embedded image unreadable: {e:#}"))
                .ok()?;
            let tag = mime_type.unwrap_or(embedded_type);
            let Some(kind) = ImageKind::from_tag(tag) else {
                log::warn!("{file_name}: embedded image type {tag} is not supported");
                return None;
            };
            Some(TextureSource::Embedded { data, kind })
        }
        gltf::image::Source::Uri { uri, .. } => Some(TextureSource::File(uri.to_string())),
        gltf::image::Source::View { view, mime_type } => {
            let Some(kind) = ImageKind::from_tag(mime_type) else {
                log::warn!("{file_name}: embedded image type {mime_type} is not supported");
                return None;
            };
            let start = view.offset();
            let end = start + view.length();
            let data = buffers
                .get(view.buffer().index())
                .and_then(|b| b.get(start..end))?;
            Some(TextureSource::Embedded {
                data: data.to_vec(),
                kind,
            })
        }
    }
}
