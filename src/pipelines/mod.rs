//! Render pipelines.
//!
//! - `basic`: the textured, tinted scene pipeline and its bind group layouts

pub mod basic;
