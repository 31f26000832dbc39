//! Scene graph nodes.

use crate::camera::Camera;
use crate::light::Light;
use crate::resources::SubMeshId;
use crate::transform::Transform;

/// Handle to a [`Node`] in its owning scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Index into the scene's node list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in the scene tree.
///
/// Attachments are optional; a bare node only contributes its transform
/// to the world matrices of its children.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Submeshes rendered with this node's world matrix.
    pub mesh: Option<Vec<SubMeshId>>,
    pub light: Option<Light>,
    pub camera: Option<Camera>,
}

impl Node {
    /// Create a named node with an identity transform.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attach submeshes.
    pub fn with_mesh(mut self, submeshes: Vec<SubMeshId>) -> Self {
        self.mesh = Some(submeshes);
        self
    }

    /// Attach a light.
    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    /// Attach a camera.
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Parent node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}
