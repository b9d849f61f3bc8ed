//! izzy-ngin
//!
//! A small real-time 3D rendering harness. Actors carry meshes, textures and a
//! transform, a fly-around camera looks at them and a [`scene::Scene`] drives
//! one frame at a time against a [`gpu::GraphicsDevice`].
//!
//! High-level modules
//! - `gpu`: the device and draw-context traits, plus a headless backend for tests
//! - `context`: the wgpu backend that owns the window surface, device and queue
//! - `data_structures`: transforms, meshes, components and actors
//! - `camera`: camera, projection and the mouse/keyboard controller
//! - `scene`: per-frame update, render and resize
//! - `resources`: loading models (obj, glTF) and textures (dds, png, jpg)
//! - `overlay`: the editing hook run once per frame
//! - `app`: the winit event loop around a scene
//!

pub mod app;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod gpu;
pub mod input;
pub mod overlay;
pub mod pipelines;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::event::WindowEvent;
