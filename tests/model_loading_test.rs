use base64::Engine;
use izzy_ngin::{
    gpu::headless::{HeadlessDevice, ResourceKind},
    resources::{TextureSource, load_model, load_textures},
};

use crate::common::test_utils::AssetDir;

mod common;

const TWO_OBJECTS: &str = "mtllib pair.mtl
o plain
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
o textured
usemtl wood
v 0 0 1
v 1 0 1
v 0 1 1
vt 0 0
vt 1 0
vt 0 1
f 4/4 5/5 6/6
";

const WOOD_MTL: &str = "newmtl wood
Kd 1 1 1
map_Kd wood.png
";

#[tokio::test]
async fn should_align_obj_textures_with_meshes() {
    let assets = AssetDir::new("obj-pair");
    assets.write("pair.obj", TWO_OBJECTS);
    assets.write("pair.mtl", WOOD_MTL);
    assets.write_png("wood.png", [120, 80, 40, 255]);

    let model = load_model(assets.path(), "pair.obj").await.unwrap();
    let names: Vec<_> = model.meshes.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["plain", "textured"]);
    assert_eq!(
        model.textures,
        vec![None, Some(TextureSource::File("wood.png".to_string()))]
    );

    let device = HeadlessDevice::new(8, 8);
    let textures = load_textures(&device, assets.path(), "pair", &model.textures)
        .await
        .unwrap();
    assert_eq!(textures.len(), 2);
    assert_eq!(device.created(ResourceKind::Texture), 2);
}

#[tokio::test]
async fn should_load_obj_without_material_library() {
    let assets = AssetDir::new("obj-bare");
    assets.write("bare.obj", TWO_OBJECTS);

    let model = load_model(assets.path(), "bare.obj").await.unwrap();
    assert_eq!(model.meshes.len(), 2);
    assert!(model.textures.is_empty());
}

#[tokio::test]
async fn should_fail_on_a_missing_texture_file() {
    let assets = AssetDir::new("missing-texture");
    let device = HeadlessDevice::new(8, 8);
    let sources = [Some(TextureSource::File("nope.png".to_string()))];
    assert!(
        load_textures(&device, assets.path(), "x", &sources)
            .await
            .is_err()
    );
    assert_eq!(device.created(ResourceKind::Texture), 0);
}

fn triangle_bin() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 4] = [0, 1, 2, 0];
    let mut bytes = Vec::new();
    positions
        .iter()
        .for_each(|p| bytes.extend_from_slice(&p.to_le_bytes()));
    indices
        .iter()
        .for_each(|i| bytes.extend_from_slice(&i.to_le_bytes()));
    bytes
}

const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "buffers": [{ "uri": "tri.bin", "byteLength": 44 }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ],
  "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }]
}"#;

#[tokio::test]
async fn should_load_gltf_primitives_with_external_buffers() {
    let assets = AssetDir::new("gltf-tri");
    assets.write("tri.gltf", TRIANGLE_GLTF);
    assets.write("tri.bin", triangle_bin());

    let model = load_model(assets.path(), "tri.gltf").await.unwrap();
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].name, "tri/0");
    assert_eq!(model.meshes[0].indices, vec![0, 1, 2]);
    assert_eq!(model.meshes[0].vertices[1].position, [1.0, 0.0, 0.0]);
    assert!(model.textures.is_empty());
}

fn embedded_triangle_gltf(buffer_uri: &str) -> String {
    TRIANGLE_GLTF.replace(r#""uri": "tri.bin""#, &format!(r#""uri": "{buffer_uri}""#))
}

#[tokio::test]
async fn should_load_gltf_buffers_embedded_as_data_uris() {
    let assets = AssetDir::new("gltf-embedded");
    let payload = base64::engine::general_purpose::STANDARD.encode(triangle_bin());
    let uri = format!("data:application/octet-stream;base64,{payload}");
    assets.write("tri.gltf", embedded_triangle_gltf(&uri));

    let model = load_model(assets.path(), "tri.gltf").await.unwrap();
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].indices, vec![0, 1, 2]);
    assert_eq!(model.meshes[0].vertices[2].position, [0.0, 1.0, 0.0]);
}

#[tokio::test]
async fn should_reject_data_uris_that_are_not_base64() {
    let assets = AssetDir::new("gltf-plain-data");
    assets.write(
        "tri.gltf",
        embedded_triangle_gltf("data:application/octet-stream,raw"),
    );

    let err = load_model(assets.path(), "tri.gltf").await.unwrap_err();
    assert!(format!("{err:#}").contains("not base64"));
}

#[tokio::test]
async fn should_reject_unknown_formats_and_missing_files() {
    let assets = AssetDir::new("bad-models");
    assert!(load_model(assets.path(), "scene.fbx").await.is_err());
    assert!(load_model(assets.path(), "absent.obj").await.is_err());
}
