//! Frame orchestration for the Prism renderer.
//!
//! This crate provides:
//! - GPU mirrors of scene resources (meshes, materials, textures)
//! - Forward and deferred render paths with a shared frame protocol
//! - GBuffer attachments and the geometry/lighting pass pair
//! - Frames-in-flight tracking and swapchain recreation
//! - Renderer configuration loading

pub mod config;
pub mod deferred_path;
pub mod error;
pub mod forward_pass;
pub mod forward_path;
pub mod frame;
pub mod gbuffer;
pub mod geometry_pass;
pub mod gpu_data;
pub mod gpu_material;
pub mod gpu_mesh;
pub mod gpu_texture;
pub mod lighting_pass;
pub mod render_path;
pub mod render_scene;
pub mod renderer;

pub use config::{PathKind, RendererConfig, ShaderConfig, ShaderTable};
pub use deferred_path::DeferredPath;
pub use error::{RenderError, Result};
pub use forward_pass::ForwardPass;
pub use forward_path::ForwardPath;
pub use frame::{Frame, FramePlan, FrameRing, MAX_FRAMES_IN_FLIGHT};
pub use gbuffer::{GBuffer, GBufferAttachment, GBUFFER_ATTACHMENT_COUNT, GBUFFER_COLOR_COUNT};
pub use geometry_pass::GeometryPass;
pub use gpu_data::{
    GpuLightData, GpuMaterialData, GpuObjectData, GpuSceneData, GpuVertex, MAX_LIGHTS,
};
pub use gpu_material::{GpuMaterial, MaterialImages};
pub use gpu_mesh::GpuMesh;
pub use gpu_texture::GpuTexture;
pub use lighting_pass::LightingPass;
pub use render_path::RenderPath;
pub use render_scene::RenderScene;
pub use renderer::Renderer;
