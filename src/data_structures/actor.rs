//! The drawable entity: meshes, textures and a transform.

use cgmath::{Matrix4, SquareMatrix};

use crate::gpu::{DrawContext, GfxError, GraphicsDevice, PrimitiveTopology, ShaderStages};

use super::{
    component::{Components, Material, Spin},
    entity::Entity,
    mesh::MeshComponent,
    transform::Transform,
};

pub const MODEL_SLOT: u32 = 2;
pub const SAMPLER_SLOT: u32 = 0;
pub const TEXTURE_SLOT: u32 = 0;

/// Per-actor constant block, slot 2 in the scene shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub world: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

impl ModelUniform {
    pub fn new(world: Matrix4<f32>, tint: [f32; 4]) -> Self {
        Self {
            world: world.into(),
            tint,
        }
    }
}

/// One mesh and the two buffers holding it on the GPU.
pub struct MeshSlot<D: GraphicsDevice> {
    pub mesh: MeshComponent,
    vertex: D::Buffer,
    index: D::Buffer,
}

impl<D: GraphicsDevice> MeshSlot<D> {
    fn create(device: &D, actor: &str, mesh: MeshComponent) -> Result<Self, GfxError> {
        let vertex =
            device.create_vertex_buffer(&format!("{actor}/{}/vertices", mesh.name), &mesh.vertices)?;
        let index =
            device.create_index_buffer(&format!("{actor}/{}/indices", mesh.name), &mesh.indices)?;
        Ok(Self { mesh, vertex, index })
    }

    pub fn vertex_buffer(&self) -> &D::Buffer {
        &self.vertex
    }

    pub fn index_buffer(&self) -> &D::Buffer {
        &self.index
    }
}

/// An entity that draws a list of meshes with one transform and tint.
///
/// Mesh `i` is drawn with texture `i`. Meshes past the end of the texture list
/// are drawn with the backend's default texture.
pub struct Actor<D: GraphicsDevice> {
    name: String,
    components: Components,
    slots: Vec<MeshSlot<D>>,
    textures: Vec<D::Texture>,
    sampler: Option<D::Sampler>,
    model_buffer: Option<D::Buffer>,
}

impl<D: GraphicsDevice> Actor<D> {
    pub fn new(device: &D, name: impl Into<String>) -> Result<Self, GfxError> {
        let name = name.into();
        let model_buffer = device
            .create_constant_buffer(
                &format!("{name}/model"),
                std::mem::size_of::<ModelUniform>() as u64,
            )
            .inspect_err(|e| log::error!("Actor '{name}': constant buffer: {e}"))?;
        let sampler = device
            .create_sampler(&format!("{name}/sampler"))
            .inspect_err(|e| log::error!("Actor '{name}': sampler: {e}"))?;

        let mut components = Components::new();
        components.insert(Transform::new());
        components.insert(Material::default());

        Ok(Self {
            name,
            components,
            slots: Vec::new(),
            textures: Vec::new(),
            sampler: Some(sampler),
            model_buffer: Some(model_buffer),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replaces all meshes. Either every mesh gets its buffers or nothing changes.
    pub fn set_mesh(&mut self, device: &D, meshes: Vec<MeshComponent>) -> Result<(), GfxError> {
        let mut slots = Vec::with_capacity(meshes.len());
        for (i, mesh) in meshes.into_iter().enumerate() {
            match MeshSlot::create(device, &self.name, mesh) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    log::error!(
                        "Actor '{}': mesh {i} could not be uploaded, keeping {} previous meshes: {e}",
                        self.name,
                        self.slots.len()
                    );
                    return Err(e);
                }
            }
        }
        self.slots = slots;
        Ok(())
    }

    pub fn set_textures(&mut self, textures: Vec<D::Texture>) {
        self.textures = textures;
    }

    pub fn meshes(&self) -> impl Iterator<Item = &MeshComponent> {
        self.slots.iter().map(|s| &s.mesh)
    }

    pub fn slots(&self) -> &[MeshSlot<D>] {
        &self.slots
    }

    pub fn textures(&self) -> &[D::Texture] {
        &self.textures
    }

    pub fn sampler(&self) -> Option<&D::Sampler> {
        self.sampler.as_ref()
    }

    pub fn model_buffer(&self) -> Option<&D::Buffer> {
        self.model_buffer.as_ref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.components.get::<Transform>()
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.components.get_mut::<Transform>()
    }

    pub fn is_destroyed(&self) -> bool {
        self.model_buffer.is_none() && self.sampler.is_none()
    }

    /// Releases vertex buffers, index buffers, textures, the constant buffer
    /// and the sampler, in that order. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.is_destroyed() && self.slots.is_empty() && self.textures.is_empty() {
            return;
        }
        let slots = std::mem::take(&mut self.slots);
        let mut indices = Vec::with_capacity(slots.len());
        for slot in slots {
            let MeshSlot { vertex, index, .. } = slot;
            drop(vertex);
            indices.push(index);
        }
        drop(indices);
        self.textures.clear();
        self.model_buffer = None;
        self.sampler = None;
        log::debug!("Actor '{}' destroyed", self.name);
    }

    fn upload(&self, device: &D) -> Result<(), GfxError> {
        let buffer = self
            .model_buffer
            .as_ref()
            .ok_or(GfxError::Released("model constant buffer"))?;
        let world = self
            .components
            .get::<Transform>()
            .map(Transform::matrix)
            .unwrap_or_else(Matrix4::identity);
        let tint = self
            .components
            .get::<Material>()
            .map(|m| m.tint)
            .unwrap_or_else(|| Material::default().tint);
        device.write_buffer(buffer, bytemuck::cast_slice(&[ModelUniform::new(world, tint)]))
    }
}

impl<D: GraphicsDevice> Entity<D> for Actor<D> {
    fn update(&mut self, delta_time: f32, device: &D) {
        if let Some(velocity) = self.components.get::<Spin>().map(|s| s.velocity) {
            if let Some(t) = self.components.get_mut::<Transform>() {
                t.rotation += velocity * delta_time;
            }
        }
        if let Some(t) = self.components.get_mut::<Transform>() {
            t.update(delta_time);
        }
        if let Err(e) = self.upload(device) {
            log::warn!("Actor '{}': skipping model upload: {e}", self.name);
        }
    }

    fn render(&self, ctx: &mut dyn DrawContext<D>) -> usize {
        let (Some(sampler), Some(model_buffer)) = (&self.sampler, &self.model_buffer) else {
            log::warn!("Actor '{}' was destroyed, skipping its draws", self.name);
            return 0;
        };
        ctx.set_sampler(SAMPLER_SLOT, sampler);
        for (i, slot) in self.slots.iter().enumerate() {
            ctx.set_vertex_buffer(0, &slot.vertex);
            ctx.set_index_buffer(&slot.index);
            match self.textures.get(i) {
                Some(texture) => ctx.set_texture(TEXTURE_SLOT, texture),
                None => ctx.set_default_texture(TEXTURE_SLOT),
            }
            ctx.set_constant_buffer(
                MODEL_SLOT,
                model_buffer,
                ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            );
            ctx.set_topology(PrimitiveTopology::TriangleList);
            ctx.draw_indexed(slot.mesh.num_index() as u32);
        }
        self.slots.len()
    }

    fn components(&self) -> &Components {
        &self.components
    }

    fn components_mut(&mut self) -> &mut Components {
        &mut self.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::mesh::SimpleVertex;
    use crate::gpu::headless::{Command, HeadlessDevice, ResourceKind};
    use cgmath::Vector3;

    fn triangle(name: &str) -> MeshComponent {
        MeshComponent::new(
            name,
            vec![
                SimpleVertex::new([0.0, 0.0, 0.0], [0.0, 0.0]),
                SimpleVertex::new([1.0, 0.0, 0.0], [1.0, 0.0]),
                SimpleVertex::new([0.0, 1.0, 0.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn new_actor_has_transform_and_material() {
        let device = HeadlessDevice::new(8, 8);
        let actor = Actor::new(&device, "a").unwrap();
        assert_eq!(actor.get_component::<Transform>(), Some(&Transform::new()));
        assert_eq!(actor.get_component::<Material>(), Some(&Material::default()));
        assert!(actor.get_component::<Spin>().is_none());
        assert_eq!(device.created(ResourceKind::ConstantBuffer), 1);
        assert_eq!(device.created(ResourceKind::Sampler), 1);
    }

    #[test]
    fn new_actor_propagates_creation_failure() {
        let device = HeadlessDevice::new(8, 8);
        device.fail_creation_after(1);
        assert!(Actor::new(&device, "a").is_err());
        assert_eq!(device.live(), 0);
    }

    #[test]
    fn update_uploads_world_and_tint() {
        let device = HeadlessDevice::new(8, 8);
        let mut actor = Actor::new(&device, "a").unwrap();
        actor.transform_mut().unwrap().position = Vector3::new(1.0, 2.0, 3.0);
        actor.update(0.016, &device);
        let bytes = device.buffer_contents(actor.model_buffer().unwrap()).unwrap();
        let uniform: ModelUniform = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(uniform.world[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.tint, [0.7, 0.7, 0.7, 1.0]);
    }

    #[test]
    fn spin_advances_rotation() {
        let device = HeadlessDevice::new(8, 8);
        let mut actor = Actor::new(&device, "a").unwrap();
        actor.add_component(Spin::new(Vector3::new(0.0, 2.0, 0.0)));
        actor.update(0.5, &device);
        assert!((actor.transform().unwrap().rotation.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn failed_set_mesh_keeps_previous_meshes() {
        let device = HeadlessDevice::new(8, 8);
        let mut actor = Actor::new(&device, "a").unwrap();
        actor.set_mesh(&device, vec![triangle("old")]).unwrap();
        let live_before = device.live();

        // Mesh 0 gets both buffers, mesh 1 gets its vertex buffer, then the index buffer fails.
        device.fail_creation_after(3);
        let err = actor.set_mesh(&device, vec![triangle("n0"), triangle("n1"), triangle("n2")]);
        assert!(matches!(err, Err(GfxError::Native { .. })));
        assert_eq!(device.live(), live_before);
        assert_eq!(actor.meshes().map(|m| m.name.as_str()).collect::<Vec<_>>(), ["old"]);
        assert!(device.no_double_release());
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let device = HeadlessDevice::new(8, 8);
        let mut actor = Actor::new(&device, "a").unwrap();
        let empty = MeshComponent::new("empty", Vec::new(), Vec::new());
        assert!(matches!(
            actor.set_mesh(&device, vec![empty]),
            Err(GfxError::InvalidArgument(_))
        ));
        assert_eq!(actor.slots().len(), 0);
    }

    #[test]
    fn destroy_twice_releases_each_handle_once() {
        let device = HeadlessDevice::new(8, 8);
        let mut actor = Actor::new(&device, "a").unwrap();
        actor.set_mesh(&device, vec![triangle("t"), MeshComponent::cube()]).unwrap();
        let image = image::DynamicImage::new_rgba8(1, 1);
        actor.set_textures(vec![device.create_texture("tex", &image).unwrap()]);

        actor.destroy();
        assert_eq!(device.live(), 0);
        actor.destroy();
        drop(actor);
        assert!(device.no_double_release());
    }

    #[test]
    fn destroy_releases_in_order() {
        let device = HeadlessDevice::new(8, 8);
        let mut actor = Actor::new(&device, "a").unwrap();
        actor.set_mesh(&device, vec![triangle("t0"), triangle("t1")]).unwrap();
        let image = image::DynamicImage::new_rgba8(1, 1);
        actor.set_textures(vec![device.create_texture("tex", &image).unwrap()]);
        actor.destroy();
        assert_eq!(device.release_order(), [
            ResourceKind::VertexBuffer,
            ResourceKind::VertexBuffer,
            ResourceKind::IndexBuffer,
            ResourceKind::IndexBuffer,
            ResourceKind::Texture,
            ResourceKind::ConstantBuffer,
            ResourceKind::Sampler,
        ]);
    }

    #[test]
    fn destroyed_actor_skips_draws_and_upload() {
        let device = HeadlessDevice::new(8, 8);
        let depth = device.create_depth_target(8, 8).unwrap();
        let mut actor = Actor::new(&device, "a").unwrap();
        actor.set_mesh(&device, vec![triangle("t")]).unwrap();
        actor.destroy();
        actor.update(0.016, &device);

        let viewport = crate::gpu::Viewport::new(8, 8).unwrap();
        let mut frame = device.begin_frame(&depth, viewport, wgpu::Color::BLACK).unwrap();
        assert_eq!(actor.render(&mut frame), 0);
        frame.present().unwrap();
        assert!(device.draws().is_empty());
        assert!(!device
            .commands()
            .iter()
            .any(|c| matches!(c, Command::WriteBuffer { .. })));
    }
}
