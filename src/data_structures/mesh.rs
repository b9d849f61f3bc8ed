//! CPU-side mesh data: vertices and indices as produced by the loaders.

/// Describes how a vertex type is laid out in a GPU vertex buffer.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Position plus texture coordinate, the only vertex format the scene shader reads.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimpleVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl SimpleVertex {
    pub const fn new(position: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            tex_coords,
        }
    }
}

impl Vertex for SimpleVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<SimpleVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// One loaded mesh. Immutable once handed to an actor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshComponent {
    pub name: String,
    pub vertices: Vec<SimpleVertex>,
    pub indices: Vec<u32>,
}

impl MeshComponent {
    pub fn new(name: impl Into<String>, vertices: Vec<SimpleVertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
        }
    }

    pub fn num_vertex(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_index(&self) -> usize {
        self.indices.len()
    }

    /// A 2x2x2 cube centred on the origin, one textured quad per face.
    pub fn cube() -> Self {
        const V: [SimpleVertex; 24] = [
            // top
            SimpleVertex::new([-1.0, 1.0, -1.0], [0.0, 0.0]),
            SimpleVertex::new([1.0, 1.0, -1.0], [1.0, 0.0]),
            SimpleVertex::new([1.0, 1.0, 1.0], [1.0, 1.0]),
            SimpleVertex::new([-1.0, 1.0, 1.0], [0.0, 1.0]),
            // bottom
            SimpleVertex::new([-1.0, -1.0, -1.0], [0.0, 0.0]),
            SimpleVertex::new([1.0, -1.0, -1.0], [1.0, 0.0]),
            SimpleVertex::new([1.0, -1.0, 1.0], [1.0, 1.0]),
            SimpleVertex::new([-1.0, -1.0, 1.0], [0.0, 1.0]),
            // left
            SimpleVertex::new([-1.0, -1.0, 1.0], [0.0, 0.0]),
            SimpleVertex::new([-1.0, -1.0, -1.0], [1.0, 0.0]),
            SimpleVertex::new([-1.0, 1.0, -1.0], [1.0, 1.0]),
            SimpleVertex::new([-1.0, 1.0, 1.0], [0.0, 1.0]),
            // right
            SimpleVertex::new([1.0, -1.0, 1.0], [0.0, 0.0]),
            SimpleVertex::new([1.0, -1.0, -1.0], [1.0, 0.0]),
            SimpleVertex::new([1.0, 1.0, -1.0], [1.0, 1.0]),
            SimpleVertex::new([1.0, 1.0, 1.0], [0.0, 1.0]),
            // front
            SimpleVertex::new([-1.0, -1.0, -1.0], [0.0, 0.0]),
            SimpleVertex::new([1.0, -1.0, -1.0], [1.0, 0.0]),
            SimpleVertex::new([1.0, 1.0, -1.0], [1.0, 1.0]),
            SimpleVertex::new([-1.0, 1.0, -1.0], [0.0, 1.0]),
            // back
            SimpleVertex::new([-1.0, -1.0, 1.0], [0.0, 0.0]),
            SimpleVertex::new([1.0, -1.0, 1.0], [1.0, 0.0]),
            SimpleVertex::new([1.0, 1.0, 1.0], [1.0, 1.0]),
            SimpleVertex::new([-1.0, 1.0, 1.0], [0.0, 1.0]),
        ];
        const I: [u32; 36] = [
            3, 1, 0, 2, 1, 3, //
            6, 4, 5, 7, 4, 6, //
            11, 9, 8, 10, 9, 11, //
            14, 12, 13, 15, 12, 14, //
            19, 17, 16, 18, 17, 19, //
            22, 20, 21, 23, 20, 22,
        ];
        Self::new("cube", V.to_vec(), I.to_vec())
    }
}
