//! Engine data structures: transforms, meshes, components and actors.
//!
//! - `transform` holds position, rotation and scale and the cached world matrix
//! - `mesh` contains the vertex layout and CPU-side mesh data
//! - `component` is the fixed set of attachable components and their storage
//! - `entity` is the update/render interface every drawable implements
//! - `actor` is the entity owning GPU buffers, textures and a sampler
//! - `texture` contains the wgpu texture and sampler wrappers

pub mod actor;
pub mod component;
pub mod entity;
pub mod mesh;
pub mod texture;
pub mod transform;
