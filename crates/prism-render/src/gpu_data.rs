//! GPU-side data layouts.
//!
//! Byte layouts are part of the shader contract; the tests below pin
//! sizes and offsets so a refactor cannot silently shift them.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Upper bound on lights uploaded per scene.
pub const MAX_LIGHTS: usize = 16;

/// Interleaved vertex as the vertex shader consumes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub color: Vec4,
}

impl Default for GpuVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            uv: Vec2::ZERO,
            color: Vec4::ONE,
        }
    }
}

impl GpuVertex {
    /// Per-vertex input binding.
    pub fn binding_description(binding: u32) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(binding)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Attribute descriptions for locations 0-3.
    pub fn attribute_descriptions(binding: u32) -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(binding)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(core::mem::offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(binding)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(core::mem::offset_of!(Self, normal) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(2)
                .binding(binding)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(core::mem::offset_of!(Self, uv) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(3)
                .binding(binding)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(core::mem::offset_of!(Self, color) as u32),
        ]
    }
}

/// Per-object uniform block (set 2, vertex stage).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuObjectData {
    pub model: Mat4,
}

impl Default for GpuObjectData {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
        }
    }
}

/// One packed light in the scene uniform.
///
/// `color.w` carries intensity; `params.w` is the kind tag (0
/// directional, 1 point, 2 spot).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuLightData {
    pub position: Vec4,
    pub direction: Vec4,
    pub color: Vec4,
    pub params: Vec4,
}

/// Per-material uniform block (set 1 binding 0, fragment stage).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterialData {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub _padding: [f32; 2],
}

impl Default for GpuMaterialData {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 1.0,
            _padding: [0.0; 2],
        }
    }
}

/// Per-scene uniform block (set 0, vertex and fragment stages).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSceneData {
    pub view: Mat4,
    pub projection: Mat4,
    pub ambient_color: Vec4,
    pub camera_position: Vec4,
    pub light_count: u32,
    pub _padding: [u32; 3],
    pub lights: [GpuLightData; MAX_LIGHTS],
}

impl Default for GpuSceneData {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            ambient_color: Vec4::new(0.1, 0.1, 0.1, 1.0),
            camera_position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            light_count: 0,
            _padding: [0; 3],
            lights: [GpuLightData::default(); MAX_LIGHTS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{offset_of, size_of};

    #[test]
    fn vertex_layout() {
        assert_eq!(size_of::<GpuVertex>(), 48);
        assert_eq!(offset_of!(GpuVertex, position), 0);
        assert_eq!(offset_of!(GpuVertex, normal), 12);
        assert_eq!(offset_of!(GpuVertex, uv), 24);
        assert_eq!(offset_of!(GpuVertex, color), 32);
    }

    #[test]
    fn vertex_attributes_cover_locations_zero_to_three() {
        let binding = GpuVertex::binding_description(0);
        assert_eq!(binding.stride, 48);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let attributes = GpuVertex::attribute_descriptions(0);
        let locations: Vec<u32> = attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, [0, 1, 2, 3]);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[2].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attributes[3].format, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(attributes[3].offset, 32);
    }

    #[test]
    fn vertex_defaults() {
        let vertex = GpuVertex::default();
        assert_eq!(vertex.normal, Vec3::Z);
        assert_eq!(vertex.color, Vec4::ONE);
    }

    #[test]
    fn object_data_layout() {
        assert_eq!(size_of::<GpuObjectData>(), 64);
        assert_eq!(GpuObjectData::default().model, Mat4::IDENTITY);
    }

    #[test]
    fn light_data_layout() {
        assert_eq!(size_of::<GpuLightData>(), 64);
        assert_eq!(offset_of!(GpuLightData, direction), 16);
        assert_eq!(offset_of!(GpuLightData, params), 48);
    }

    #[test]
    fn material_data_layout() {
        assert_eq!(size_of::<GpuMaterialData>(), 32);
        assert_eq!(offset_of!(GpuMaterialData, metallic), 16);
        assert_eq!(offset_of!(GpuMaterialData, roughness), 20);

        let material = GpuMaterialData::default();
        assert_eq!(material.base_color, Vec4::ONE);
        assert_eq!(material.roughness, 1.0);
    }

    #[test]
    fn scene_data_layout() {
        assert_eq!(size_of::<GpuSceneData>(), 1200);
        assert_eq!(offset_of!(GpuSceneData, projection), 64);
        assert_eq!(offset_of!(GpuSceneData, ambient_color), 128);
        assert_eq!(offset_of!(GpuSceneData, camera_position), 144);
        assert_eq!(offset_of!(GpuSceneData, light_count), 160);
        assert_eq!(offset_of!(GpuSceneData, lights), 176);

        let scene = GpuSceneData::default();
        assert_eq!(scene.ambient_color, Vec4::new(0.1, 0.1, 0.1, 1.0));
        assert_eq!(scene.camera_position.w, 1.0);
        assert_eq!(scene.light_count, 0);
    }
}
