//! Scene-owned resources: textures, materials, and submeshes.

use glam::{Vec2, Vec3, Vec4};

/// Handle to a [`Texture`] in its owning scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

/// Handle to a [`Material`] in its owning scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) u32);

/// Handle to a [`SubMesh`] in its owning scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubMeshId(pub(crate) u32);

impl TextureId {
    /// Index into the scene's texture list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl MaterialId {
    /// Index into the scene's material list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SubMeshId {
    /// Index into the scene's submesh list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// RGBA8 pixel data.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from RGBA8 pixels.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Whether the pixel data is present and matches the dimensions.
    pub fn valid(&self) -> bool {
        !self.pixels.is_empty()
            && self.pixels.len() as u64 == u64::from(self.width) * u64::from(self.height) * 4
    }
}

/// Surface material parameters.
#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub base_color_texture: Option<TextureId>,
    pub metallic_roughness_texture: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 1.0,
            base_color_texture: None,
            metallic_roughness_texture: None,
        }
    }
}

/// Geometry with per-vertex attribute streams.
///
/// Normals, uvs, and colors may be shorter than positions; missing
/// entries take defaults at GPU upload time.
#[derive(Debug, Clone, Default)]
pub struct SubMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub material: Option<MaterialId>,
    pub visible: bool,
}

impl SubMesh {
    /// Create a visible submesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            visible: true,
            ..Self::default()
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_validity_checks_dimensions() {
        assert!(Texture::new(vec![0; 16], 2, 2).valid());
        assert!(!Texture::new(vec![0; 15], 2, 2).valid());
        assert!(!Texture::new(Vec::new(), 0, 0).valid());
    }

    #[test]
    fn material_defaults() {
        let material = Material::default();
        assert_eq!(material.base_color, Vec4::ONE);
        assert_eq!(material.metallic, 0.0);
        assert_eq!(material.roughness, 1.0);
        assert!(material.base_color_texture.is_none());
    }
}
