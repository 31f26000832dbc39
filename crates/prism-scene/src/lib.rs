//! Scene graph and resources for the Prism renderer.
//!
//! Scenes own their nodes and resources; the renderer reads them through
//! the active scene of a [`World`] and mirrors what it needs onto the GPU.

pub mod camera;
pub mod light;
pub mod node;
pub mod resources;
pub mod transform;
pub mod world;

pub use camera::Camera;
pub use light::Light;
pub use node::{Node, NodeId};
pub use resources::{Material, MaterialId, SubMesh, SubMeshId, Texture, TextureId};
pub use transform::Transform;
pub use world::{Scene, SceneId, World};
