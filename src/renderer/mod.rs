//! WebGPU rendering module
//!
//! One lit, textured, instanced mesh pipeline draws the whole scene.

pub mod pipeline;
pub mod vertex;

pub use pipeline::RenderState;
