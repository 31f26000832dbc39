//! Scenes and the world that owns them.

use crate::node::{Node, NodeId};
use crate::resources::{Material, MaterialId, SubMesh, SubMeshId, Texture, TextureId};
use glam::Mat4;

/// Handle to a [`Scene`] in its owning world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(pub(crate) u32);

/// A node tree plus the resources its nodes reference.
#[derive(Debug, Default)]
pub struct Scene {
    name: String,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    textures: Vec<Texture>,
    materials: Vec<Material>,
    submeshes: Vec<SubMesh>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a root node.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.roots.push(id);
        id
    }

    /// Add a node as a child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        self.nodes.push(node);
        if let Some(parent_node) = self.nodes.get_mut(parent.index()) {
            parent_node.children.push(id);
        }
        id
    }

    /// Get a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Root nodes in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// All nodes with their ids.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    /// World matrix of a node, accumulated through its parent chain.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else {
                break;
            };
            matrix = node.transform.local_matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// Walk the tree depth-first, passing each node with its world matrix.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(NodeId, &Node, Mat4),
    {
        for &root in &self.roots {
            self.visit_node(root, Mat4::IDENTITY, f);
        }
    }

    fn visit_node<F>(&self, id: NodeId, parent_matrix: Mat4, f: &mut F)
    where
        F: FnMut(NodeId, &Node, Mat4),
    {
        let Some(node) = self.node(id) else {
            return;
        };
        let world = parent_matrix * node.transform.local_matrix();
        f(id, node, world);
        for &child in &node.children {
            self.visit_node(child, world, f);
        }
    }

    /// Add a texture.
    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(texture);
        id
    }

    /// Get a texture.
    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.index())
    }

    /// All textures with their ids.
    pub fn textures(&self) -> impl Iterator<Item = (TextureId, &Texture)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, texture)| (TextureId(i as u32), texture))
    }

    /// Number of textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Add a material.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    /// Get a material.
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    /// All materials with their ids.
    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, material)| (MaterialId(i as u32), material))
    }

    /// Number of materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Add a submesh.
    pub fn add_submesh(&mut self, submesh: SubMesh) -> SubMeshId {
        let id = SubMeshId(self.submeshes.len() as u32);
        self.submeshes.push(submesh);
        id
    }

    /// Get a submesh.
    pub fn submesh(&self, id: SubMeshId) -> Option<&SubMesh> {
        self.submeshes.get(id.index())
    }

    /// All submeshes with their ids.
    pub fn submeshes(&self) -> impl Iterator<Item = (SubMeshId, &SubMesh)> {
        self.submeshes
            .iter()
            .enumerate()
            .map(|(i, submesh)| (SubMeshId(i as u32), submesh))
    }

    /// Number of submeshes.
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }
}

/// All loaded scenes plus the active scene and camera selection.
#[derive(Debug, Default)]
pub struct World {
    scenes: Vec<Scene>,
    active_scene: Option<SceneId>,
    active_camera: Option<NodeId>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene. The first scene added becomes active.
    pub fn add_scene(&mut self, scene: Scene) -> SceneId {
        let id = SceneId(self.scenes.len() as u32);
        self.scenes.push(scene);
        if self.active_scene.is_none() {
            self.active_scene = Some(id);
        }
        id
    }

    /// Get a scene.
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(id.0 as usize)
    }

    /// Get a scene mutably.
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.get_mut(id.0 as usize)
    }

    /// Make a scene active.
    pub fn set_active_scene(&mut self, id: SceneId) {
        if (id.0 as usize) < self.scenes.len() {
            self.active_scene = Some(id);
        }
    }

    /// The active scene, if any.
    pub fn active_scene(&self) -> Option<&Scene> {
        self.active_scene.and_then(|id| self.scene(id))
    }

    /// The active scene, mutably.
    pub fn active_scene_mut(&mut self) -> Option<&mut Scene> {
        self.active_scene.and_then(|id| self.scenes.get_mut(id.0 as usize))
    }

    /// Select the node whose camera drives rendering.
    pub fn set_active_camera(&mut self, node: NodeId) {
        self.active_camera = Some(node);
    }

    /// The active camera node, if any.
    pub fn active_camera(&self) -> Option<NodeId> {
        self.active_camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;
    use approx::assert_relative_eq;
    use glam::Vec3;

    #[test]
    fn child_world_matrix_accumulates_parent_chain() {
        let mut scene = Scene::new("test");
        let parent = scene.add_node(
            Node::new("parent").with_transform(Transform::from_translation(Vec3::X)),
        );
        let child = scene.add_child(
            parent,
            Node::new("child")
                .with_transform(Transform::from_translation(Vec3::new(2.0, 0.0, 0.0))),
        );

        let world = scene.world_matrix(child);
        let origin = world.transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, 3.0);
    }

    #[test]
    fn visit_passes_accumulated_matrices_depth_first() {
        let mut scene = Scene::new("test");
        let root = scene.add_node(
            Node::new("root").with_transform(Transform::from_translation(Vec3::Y)),
        );
        scene.add_child(
            root,
            Node::new("leaf").with_transform(Transform::from_translation(Vec3::Y)),
        );
        scene.add_node(Node::new("second root"));

        let mut visited = Vec::new();
        scene.visit(&mut |_, node, world| {
            visited.push((node.name.clone(), world.transform_point3(Vec3::ZERO).y));
        });

        assert_eq!(visited.len(), 3);
        assert_eq!(visited[0].0, "root");
        assert_relative_eq!(visited[0].1, 1.0);
        assert_eq!(visited[1].0, "leaf");
        assert_relative_eq!(visited[1].1, 2.0);
        assert_eq!(visited[2].0, "second root");
        assert_relative_eq!(visited[2].1, 0.0);
    }

    #[test]
    fn visit_matches_world_matrix() {
        let mut scene = Scene::new("test");
        let root = scene.add_node(
            Node::new("root").with_transform(Transform::from_translation(Vec3::Z)),
        );
        let leaf = scene.add_child(
            root,
            Node::new("leaf").with_transform(Transform::from_translation(Vec3::X)),
        );

        let mut from_visit = None;
        scene.visit(&mut |id, _, world| {
            if id == leaf {
                from_visit = Some(world);
            }
        });

        let direct = scene.world_matrix(leaf);
        assert_eq!(from_visit.unwrap().to_cols_array(), direct.to_cols_array());
    }

    #[test]
    fn first_scene_becomes_active() {
        let mut world = World::new();
        assert!(world.active_scene().is_none());

        world.add_scene(Scene::new("a"));
        let b = world.add_scene(Scene::new("b"));
        assert_eq!(world.active_scene().unwrap().name(), "a");

        world.set_active_scene(b);
        assert_eq!(world.active_scene().unwrap().name(), "b");
    }

    #[test]
    fn resource_ids_are_stable_indices() {
        let mut scene = Scene::new("test");
        let a = scene.add_material(Material::default());
        let b = scene.add_material(Material::default());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(scene.material_count(), 2);
        assert!(scene.material(a).is_some());
    }
}
