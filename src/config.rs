//! Start-up settings for the viewer.

use std::path::PathBuf;

use cgmath::{Deg, Rad, Vector3};

/// One model to load at start-up and where to put it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    /// Relative to [`SceneConfig::assets`]. `.obj`, `.gltf` and `.glb` are understood.
    pub path: String,
    /// Replaces the texture list the model file names, mesh `i` gets entry `i`.
    pub textures: Option<Vec<String>>,
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    /// Radians per second around each axis.
    pub spin: Option<Vector3<f32>>,
}

impl ModelSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            textures: None,
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            spin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_colour: wgpu::Color,
    pub camera_position: (f32, f32, f32),
    pub camera_yaw: Rad<f32>,
    pub camera_pitch: Rad<f32>,
    /// Units per second.
    pub camera_speed: f32,
    /// Radians per pixel of drag.
    pub mouse_sensitivity: f32,
    /// Units per second for the arrow/page keys moving the selected actor.
    pub nudge_speed: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub tint: [f32; 4],
    pub assets: PathBuf,
    /// Empty means the built-in spinning cube.
    pub models: Vec<ModelSource>,
    /// Close the window after this many frames. Used by smoke tests.
    pub exit_after_frames: Option<u32>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            title: "izzy-ngin".to_string(),
            width: 1280,
            height: 720,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 0.2,
                b: 0.4,
                a: 1.0,
            },
            camera_position: (0.0, 3.0, -6.0),
            camera_yaw: Deg(90.0).into(),
            camera_pitch: Rad(-0.4),
            camera_speed: 4.0,
            mouse_sensitivity: 0.005,
            nudge_speed: 2.0,
            fovy: Rad(std::f32::consts::FRAC_PI_4),
            znear: 0.01,
            zfar: 100.0,
            tint: [0.7, 0.7, 0.7, 1.0],
            assets: PathBuf::from("./assets"),
            models: Vec::new(),
            exit_after_frames: None,
        }
    }
}

impl SceneConfig {
    pub const ASSETS_VAR: &'static str = "IZZY_ASSETS";
    pub const MODELS_VAR: &'static str = "IZZY_MODELS";

    /// Defaults overridden by `IZZY_ASSETS` (asset root) and `IZZY_MODELS`
    /// (comma separated model paths).
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var(Self::ASSETS_VAR).ok(),
            std::env::var(Self::MODELS_VAR).ok(),
        )
    }

    pub fn with_overrides(mut self, assets: Option<String>, models: Option<String>) -> Self {
        if let Some(assets) = assets.filter(|a| !a.trim().is_empty()) {
            self.assets = PathBuf::from(assets.trim());
        }
        if let Some(models) = models {
            let count = self.models.len();
            self.models.extend(
                models
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(ModelSource::new),
            );
            log::debug!("{} models added from the environment", self.models.len() - count);
        }
        self
    }
}
