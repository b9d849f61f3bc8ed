use izzy_ngin::{
    data_structures::{actor::Actor, entity::Entity},
    gpu::{
        GraphicsDevice,
        headless::{Command, HeadlessDevice, ResourceKind},
    },
};

use crate::common::test_utils::{pixel, quad, triangle};

mod common;

/// Four vertices drawn through four indices.
fn four_index_mesh() -> izzy_ngin::data_structures::mesh::MeshComponent {
    let mut mesh = quad("four");
    mesh.indices = vec![0, 1, 2, 3];
    mesh
}

#[test]
fn should_draw_each_mesh_with_its_texture_or_the_default() {
    let device = HeadlessDevice::new(64, 64);
    let mut actor = Actor::new(&device, "pair").unwrap();
    actor.set_mesh(&device, vec![quad("replaced")]).unwrap();
    actor
        .set_mesh(&device, vec![four_index_mesh(), quad("quad")])
        .unwrap();
    let texture = device.create_texture("red", &pixel([255, 0, 0, 255])).unwrap();
    let texture_id = texture.handle.id();
    actor.set_textures(vec![texture]);

    actor.update(0.016, &device);
    device.clear_commands();

    let viewport = izzy_ngin::gpu::Viewport::new(64, 64).unwrap();
    let depth = device.create_depth_target(64, 64).unwrap();
    let mut frame = device
        .begin_frame(&depth, viewport, wgpu::Color::BLACK)
        .unwrap();
    assert_eq!(actor.render(&mut frame), 2);
    izzy_ngin::gpu::DrawContext::present(frame).unwrap();

    assert_eq!(device.draws(), vec![4, 6]);

    let commands = device.commands();
    let draws: Vec<usize> = commands
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Command::DrawIndexed { .. }))
        .map(|(i, _)| i)
        .collect();
    let first = &commands[..draws[0]];
    let second = &commands[draws[0]..draws[1]];
    assert!(first.contains(&Command::SetTexture {
        slot: 0,
        texture: texture_id
    }));
    assert!(!first.contains(&Command::SetDefaultTexture { slot: 0 }));
    assert!(second.contains(&Command::SetDefaultTexture { slot: 0 }));
    assert!(
        !second
            .iter()
            .any(|c| matches!(c, Command::SetTexture { .. }))
    );
}

#[test]
fn should_release_everything_on_destroy() {
    let device = HeadlessDevice::new(64, 64);
    let mut actor = Actor::new(&device, "pair").unwrap();
    actor
        .set_mesh(&device, vec![triangle("tri"), quad("quad")])
        .unwrap();
    actor.set_textures(vec![device.create_texture("t", &pixel([0; 4])).unwrap()]);
    assert_eq!(device.live(), 7);

    actor.destroy();
    actor.destroy();
    assert_eq!(device.live(), 0);
    assert!(device.no_double_release());
    assert_eq!(
        device.release_order(),
        vec![
            ResourceKind::VertexBuffer,
            ResourceKind::VertexBuffer,
            ResourceKind::IndexBuffer,
            ResourceKind::IndexBuffer,
            ResourceKind::Texture,
            ResourceKind::ConstantBuffer,
            ResourceKind::Sampler,
        ]
    );
}

#[test]
fn should_replace_meshes_and_free_the_old_buffers() {
    let device = HeadlessDevice::new(64, 64);
    let mut actor = Actor::new(&device, "swap").unwrap();
    actor.set_mesh(&device, vec![quad("old")]).unwrap();
    actor.set_mesh(&device, vec![triangle("new")]).unwrap();

    let names: Vec<_> = actor.meshes().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["new"]);
    // Constant buffer, sampler and the new vertex/index pair.
    assert_eq!(device.live(), 4);
}
