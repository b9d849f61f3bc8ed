use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use izzy_ngin::{
    config::SceneConfig,
    data_structures::mesh::{MeshComponent, SimpleVertex},
    gpu::headless::HeadlessDevice,
    scene::Scene,
};

pub fn vertex(x: f32, y: f32, u: f32, v: f32) -> SimpleVertex {
    SimpleVertex {
        position: [x, y, 0.0],
        tex_coords: [u, v],
    }
}

pub fn triangle(name: &str) -> MeshComponent {
    MeshComponent::new(
        name,
        vec![
            vertex(0.0, 0.0, 0.0, 1.0),
            vertex(1.0, 0.0, 1.0, 1.0),
            vertex(0.0, 1.0, 0.0, 0.0),
        ],
        vec![0, 1, 2],
    )
}

pub fn quad(name: &str) -> MeshComponent {
    MeshComponent::new(
        name,
        vec![
            vertex(0.0, 0.0, 0.0, 1.0),
            vertex(1.0, 0.0, 1.0, 1.0),
            vertex(1.0, 1.0, 1.0, 0.0),
            vertex(0.0, 1.0, 0.0, 0.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
}

pub fn pixel(colour: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba(colour)))
}

pub fn headless_scene(width: u32, height: u32) -> Scene<HeadlessDevice> {
    headless_scene_with(width, height, SceneConfig::default())
}

pub fn headless_scene_with(width: u32, height: u32, config: SceneConfig) -> Scene<HeadlessDevice> {
    Scene::new(HeadlessDevice::new(width, height), width, height, config)
        .expect("headless scene creation failed")
}

/// A scratch asset root under the system temp dir, removed on drop.
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("izzy-ngin-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).expect("failed to create asset dir");
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, file_name: &str, contents: impl AsRef<[u8]>) {
        std::fs::write(self.root.join(file_name), contents).expect("failed to write asset");
    }

    pub fn write_png(&self, file_name: &str, colour: [u8; 4]) {
        pixel(colour)
            .save_with_format(self.root.join(file_name), image::ImageFormat::Png)
            .expect("failed to write png");
    }
}

impl Drop for AssetDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
