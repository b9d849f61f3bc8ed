//! Conversion from parsed model files to [`MeshComponent`]s.

use crate::data_structures::mesh::{MeshComponent, SimpleVertex};

/// One mesh per obj object, `None` when it is broken.
/// Texture coordinates are flipped to a top-left origin.
pub fn from_obj_model(m: &tobj::Model, index: usize, file_name: &str) -> Option<MeshComponent> {
    let vertices = (0..m.mesh.positions.len() / 3)
        .map(|v| SimpleVertex {
            position: [
                m.mesh.positions[v * 3],
                m.mesh.positions[v * 3 + 1],
                m.mesh.positions[v * 3 + 2],
            ],
            tex_coords: [
                m.mesh.texcoords.get(v * 2).map_or(0.0, |f| *f),
                1.0 - m.mesh.texcoords.get(v * 2 + 1).map_or(0.0, |f| *f),
            ],
        })
        .collect::<Vec<_>>();
    let name = if m.name.is_empty() {
        format!("{file_name}#{index}")
    } else {
        m.name.clone()
    };
    validated(MeshComponent::new(name, vertices, m.mesh.indices.clone()), file_name)
}

/// One mesh per glTF primitive, in document order.
pub fn from_gltf_primitive(
    primitive: &gltf::Primitive,
    name: String,
    buffers: &[Vec<u8>],
    file_name: &str,
) -> Option<MeshComponent> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("{file_name}: {name} is not a triangle list, skipped");
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<SimpleVertex> = match reader.read_positions() {
        Some(positions) => positions
            .map(|position| SimpleVertex {
                position,
                tex_coords: Default::default(),
            })
            .collect(),
        None => {
            log::warn!("{file_name}: {name} has no positions, skipped");
            return None;
        }
    };
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(vertex, uv)| vertex.tex_coords = uv);
    }
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    validated(MeshComponent::new(name, vertices, indices), file_name)
}

/// Drops meshes that would index past their vertices or draw nothing.
fn validated(mesh: MeshComponent, file_name: &str) -> Option<MeshComponent> {
    if mesh.num_index() == 0 || mesh.num_vertex() == 0 {
        log::warn!("{file_name}: mesh '{}' is empty, skipped", mesh.name);
        return None;
    }
    if let Some(bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.num_vertex()) {
        log::warn!(
            "{file_name}: mesh '{}' references vertex {bad} of {}, skipped",
            mesh.name,
            mesh.num_vertex()
        );
        return None;
    }
    Some(mesh)
}
